//! C ABI between the host and format plugins built as shared libraries.
//!
//! A plugin library exports one symbol, [`FACTORY_SYMBOL`], with the signature
//! `extern "C" fn() -> *const PluginVTable`. The returned table lives in a
//! process-lifetime static inside the library; the host never frees it.
//!
//! Nodes cross the boundary as a JSON-encoded [`NodeBundle`], and generated
//! code (or an error message) comes back in a [`PluginBuffer`] that the host
//! hands back to the library through `free_buffer`, so each side only frees
//! memory it allocated. Rust types never cross the boundary.
//!
//! Plugin crates do not use these types directly; they call
//! [`declare_format_plugin!`](crate::declare_format_plugin):
//!
//! ```ignore
//! genserialize_codegen::declare_format_plugin!(MyPlugin::new());
//! ```

use crate::error::GenerateError;
use crate::traits::FormatPlugin;
use genserialize_sast::NodeBundle;
use std::mem::ManuallyDrop;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Bumped whenever [`PluginVTable`] or the request encoding changes.
pub const ABI_VERSION: u32 = 2;

/// Name of the exported factory function.
pub const FACTORY_SYMBOL: &[u8] = b"CreatePlugin";

pub const STATUS_OK: i32 = 0;
pub const STATUS_ERROR: i32 = 1;
pub const STATUS_PANIC: i32 = 2;

/// Signature of [`FACTORY_SYMBOL`].
pub type PluginFactory = unsafe extern "C" fn() -> *const PluginVTable;

/// Borrowed UTF-8 string owned by the library.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PluginStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl PluginStr {
    pub fn borrowed(text: &str) -> Self {
        Self {
            ptr: text.as_ptr(),
            len: text.len(),
        }
    }

    /// Copy the string out. `None` if it is not valid UTF-8.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to `len` readable bytes.
    pub unsafe fn to_owned_string(&self) -> Option<String> {
        if self.ptr.is_null() {
            return Some(String::new());
        }
        // SAFETY: guaranteed by the caller.
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr, self.len) };
        std::str::from_utf8(bytes).ok().map(str::to_string)
    }
}

/// Heap text allocated by the library and released by `free_buffer`.
#[repr(C)]
#[derive(Debug)]
pub struct PluginBuffer {
    pub ptr: *mut u8,
    pub len: usize,
    pub cap: usize,
}

impl PluginBuffer {
    pub fn empty() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            len: 0,
            cap: 0,
        }
    }

    fn from_string(text: String) -> Self {
        let mut text = ManuallyDrop::new(text);
        Self {
            ptr: text.as_mut_ptr(),
            len: text.len(),
            cap: text.capacity(),
        }
    }

    /// Copy the contents out as text.
    ///
    /// # Safety
    ///
    /// The buffer must be empty or filled by a plugin's `generate_code`.
    pub unsafe fn to_string_lossy(&self) -> String {
        if self.ptr.is_null() {
            return String::new();
        }
        // SAFETY: guaranteed by the caller.
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr, self.len) };
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Function table returned by a plugin's factory.
#[repr(C)]
pub struct PluginVTable {
    pub abi_version: u32,
    pub priority: u8,
    pub format_name: PluginStr,
    /// Required includes, newline-separated.
    pub includes: PluginStr,
    /// Generate code for a JSON-encoded [`NodeBundle`].
    ///
    /// Always fills `out` when it is non-null: code on [`STATUS_OK`], an
    /// error message otherwise.
    pub generate_code: unsafe extern "C" fn(
        this: *const PluginVTable,
        request: *const u8,
        request_len: usize,
        out: *mut PluginBuffer,
    ) -> i32,
    pub free_buffer: unsafe extern "C" fn(buffer: PluginBuffer),
}

/// Library-side wrapper that exposes a [`FormatPlugin`] through a [`PluginVTable`].
///
/// The table is the first field, so a pointer to it is a pointer to the whole
/// wrapper.
#[repr(C)]
pub struct ExportedPlugin {
    vtable: PluginVTable,
    name: String,
    includes: String,
    plugin: Box<dyn FormatPlugin>,
}

// SAFETY: the raw pointers in `vtable` point into `name` and `includes`,
// which are never mutated after construction; `plugin` is Send + Sync.
unsafe impl Send for ExportedPlugin {}
unsafe impl Sync for ExportedPlugin {}

impl ExportedPlugin {
    pub fn new(plugin: impl FormatPlugin + 'static) -> Self {
        let name = plugin.format_name().to_string();
        let includes = plugin.required_includes().join("\n");
        // Moving a String does not move its heap buffer, so the borrowed
        // pointers stay valid once the wrapper is built.
        let vtable = PluginVTable {
            abi_version: ABI_VERSION,
            priority: plugin.priority(),
            format_name: PluginStr::borrowed(&name),
            includes: PluginStr::borrowed(&includes),
            generate_code: generate_code_trampoline,
            free_buffer: free_buffer_trampoline,
        };
        Self {
            vtable,
            name,
            includes,
            plugin: Box::new(plugin),
        }
    }

    /// Pointer handed to the host by the factory.
    pub fn vtable(&self) -> *const PluginVTable {
        &self.vtable
    }

    pub fn format_name(&self) -> &str {
        &self.name
    }

    pub fn includes(&self) -> &str {
        &self.includes
    }

    fn generate(&self, request: &[u8]) -> Result<String, GenerateError> {
        let bundle: NodeBundle = serde_json::from_slice(request)?;
        let node = bundle.restore()?;
        self.plugin.generate_code(&node)
    }
}

unsafe extern "C" fn generate_code_trampoline(
    this: *const PluginVTable,
    request: *const u8,
    request_len: usize,
    out: *mut PluginBuffer,
) -> i32 {
    if this.is_null() || out.is_null() {
        return STATUS_ERROR;
    }
    // SAFETY: every table handed out by `ExportedPlugin::vtable` is the first
    // field of a #[repr(C)] ExportedPlugin.
    let exported = unsafe { &*this.cast::<ExportedPlugin>() };
    let bytes: &[u8] = if request.is_null() || request_len == 0 {
        &[]
    } else {
        // SAFETY: the host passes a buffer it owns for the duration of the call.
        unsafe { std::slice::from_raw_parts(request, request_len) }
    };

    let (status, text) = match catch_unwind(AssertUnwindSafe(|| exported.generate(bytes))) {
        Ok(Ok(code)) => (STATUS_OK, code),
        Ok(Err(err)) => (STATUS_ERROR, err.to_string()),
        Err(_) => (
            STATUS_PANIC,
            format!("plugin `{}` panicked while generating code", exported.name),
        ),
    };
    // SAFETY: `out` is non-null and points to a host-owned PluginBuffer.
    unsafe { out.write(PluginBuffer::from_string(text)) };
    status
}

unsafe extern "C" fn free_buffer_trampoline(buffer: PluginBuffer) {
    if buffer.ptr.is_null() {
        return;
    }
    // SAFETY: non-null buffers only come from `PluginBuffer::from_string` in
    // this library, so the allocation matches.
    drop(unsafe { String::from_raw_parts(buffer.ptr, buffer.len, buffer.cap) });
}

/// Export a [`FormatPlugin`] from a `cdylib` crate.
///
/// Expands to the `CreatePlugin` factory. The expression is evaluated once,
/// on the first call.
///
/// ```ignore
/// use genserialize_codegen::output::JsonFormatPlugin;
///
/// genserialize_codegen::declare_format_plugin!(JsonFormatPlugin::with_priority(1));
/// ```
#[macro_export]
macro_rules! declare_format_plugin {
    ($plugin:expr) => {
        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub extern "C" fn CreatePlugin() -> *const $crate::abi::PluginVTable {
            static PLUGIN: ::std::sync::LazyLock<$crate::abi::ExportedPlugin> =
                ::std::sync::LazyLock::new(|| $crate::abi::ExportedPlugin::new($plugin));
            PLUGIN.vtable()
        }
    };
}
