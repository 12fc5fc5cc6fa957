//! Dynamic format plugin loading.
//!
//! Loads format plugins from shared libraries (.so/.dylib/.dll) that export
//! the factory described in [`abi`](crate::abi). Plugin libraries are built
//! with `cargo xtask build-plugins`.
//!
//! # Lifetime
//!
//! Every [`DynamicPlugin`] holds a reference to the library it came from, so
//! the library stays mapped as long as either the loader or any plugin handle
//! from it is alive. Dropping the loader first is fine.

use crate::abi::{
    ABI_VERSION, FACTORY_SYMBOL, PluginBuffer, PluginFactory, PluginVTable, STATUS_OK,
};
use crate::error::GenerateError;
use crate::registry::PluginRegistry;
use crate::traits::FormatPlugin;
use genserialize_sast::{NodeBundle, SastNode};
use libloading::{Library, Symbol};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to open plugin library {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("{path} does not export `CreatePlugin`: {source}")]
    MissingFactory {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("`CreatePlugin` in {0} returned a null plugin")]
    NullPlugin(PathBuf),
    #[error("{path} was built for plugin ABI {found}, expected {expected}")]
    AbiMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
    #[error("plugin in {0} reports a format name that is not valid UTF-8")]
    InvalidName(PathBuf),
}

/// A format plugin living in a loaded shared library.
pub struct DynamicPlugin {
    vtable: *const PluginVTable,
    format_name: String,
    includes: Vec<String>,
    priority: u8,
    path: PathBuf,
    /// Keeps the code behind `vtable` mapped.
    _library: Arc<Library>,
}

// SAFETY: the vtable is an immutable static of the library, and plugins are
// required to be usable from any thread (`FormatPlugin: Send + Sync` on the
// library side).
unsafe impl Send for DynamicPlugin {}
unsafe impl Sync for DynamicPlugin {}

impl DynamicPlugin {
    /// Wrap a table returned by a plugin factory.
    ///
    /// # Safety
    ///
    /// `vtable` must be null or the result of calling the factory of `library`.
    unsafe fn from_vtable(
        vtable: *const PluginVTable,
        library: Arc<Library>,
        path: &Path,
    ) -> Result<Self, LoadError> {
        if vtable.is_null() {
            return Err(LoadError::NullPlugin(path.to_path_buf()));
        }
        // SAFETY: non-null and owned by `library`, which we keep alive.
        let table = unsafe { &*vtable };
        if table.abi_version != ABI_VERSION {
            return Err(LoadError::AbiMismatch {
                path: path.to_path_buf(),
                found: table.abi_version,
                expected: ABI_VERSION,
            });
        }
        // SAFETY: the ABI version matches, so both fields are PluginStrs
        // pointing into the plugin's static.
        let format_name = unsafe { table.format_name.to_owned_string() }
            .filter(|name| !name.is_empty())
            .ok_or_else(|| LoadError::InvalidName(path.to_path_buf()))?;
        let includes = unsafe { table.includes.to_owned_string() }
            .unwrap_or_default()
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            vtable,
            format_name,
            includes,
            priority: table.priority,
            path: path.to_path_buf(),
            _library: library,
        })
    }

    /// Library the plugin was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FormatPlugin for DynamicPlugin {
    fn format_name(&self) -> &str {
        &self.format_name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn required_includes(&self) -> Vec<String> {
        self.includes.clone()
    }

    fn generate_code(&self, node: &SastNode) -> Result<String, GenerateError> {
        let request = serde_json::to_vec(&NodeBundle::capture(node))?;
        let mut out = PluginBuffer::empty();
        // SAFETY: the table was validated on load and `_library` keeps it
        // mapped; `request` and `out` outlive the call.
        let (status, text) = unsafe {
            let table = &*self.vtable;
            let status = (table.generate_code)(self.vtable, request.as_ptr(), request.len(), &mut out);
            let text = out.to_string_lossy();
            (table.free_buffer)(out);
            (status, text)
        };

        if status == STATUS_OK {
            Ok(text)
        } else {
            Err(GenerateError::Plugin {
                status,
                message: text,
            })
        }
    }
}

impl std::fmt::Debug for DynamicPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicPlugin")
            .field("format_name", &self.format_name)
            .field("priority", &self.priority)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Loads plugin libraries and registers what they export.
#[derive(Debug, Default)]
pub struct PluginLoader {
    libraries: Vec<Arc<Library>>,
}

impl PluginLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every plugin library directly inside `dir` (not recursive).
    ///
    /// Files that fail to load are skipped with a warning. Returns the number
    /// of plugins loaded.
    pub fn load_directory(&mut self, dir: &Path, registry: &mut PluginRegistry) -> usize {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(dir = %dir.display(), error = %err, "cannot read plugin directory");
                return 0;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_plugin_library(path))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            match self.load_file(&path, registry) {
                Ok(()) => loaded += 1,
                Err(err) => tracing::warn!(error = %err, "skipping plugin library"),
            }
        }
        loaded
    }

    /// Load one plugin library and register its plugin with the priority it
    /// reports.
    pub fn load_file(&mut self, path: &Path, registry: &mut PluginRegistry) -> Result<(), LoadError> {
        // SAFETY: loading a library runs its initializers. Plugin paths come
        // from the command line or configuration, so they are trusted as much
        // as the generator itself.
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let library = Arc::new(library);

        // SAFETY: `CreatePlugin` is declared by `declare_format_plugin!` with
        // the `PluginFactory` signature; the ABI version is checked before the
        // table is otherwise used.
        let vtable = unsafe {
            let factory: Symbol<PluginFactory> =
                library
                    .get(FACTORY_SYMBOL)
                    .map_err(|source| LoadError::MissingFactory {
                        path: path.to_path_buf(),
                        source,
                    })?;
            factory()
        };

        // SAFETY: `vtable` came from this library's factory.
        let plugin = unsafe { DynamicPlugin::from_vtable(vtable, Arc::clone(&library), path) }?;
        tracing::info!(
            format = %plugin.format_name,
            priority = plugin.priority,
            path = %path.display(),
            "loaded format plugin"
        );
        registry.register_plugin(Arc::new(plugin));
        self.libraries.push(library);
        Ok(())
    }

    /// Number of libraries kept loaded.
    pub fn library_count(&self) -> usize {
        self.libraries.len()
    }
}

/// Whether `path` has the shared library extension of the current platform.
pub fn is_plugin_library(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    plugin_extensions().contains(&ext)
}

/// Shared library extensions for the current platform.
fn plugin_extensions() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &["dll"]
    } else {
        &["so", "dylib"]
    }
}

/// File name cargo gives a cdylib crate on the current platform.
pub fn plugin_file_name(crate_name: &str) -> String {
    let stem = crate_name.replace('-', "_");
    if cfg!(target_os = "windows") {
        format!("{stem}.dll")
    } else if cfg!(target_os = "macos") {
        format!("lib{stem}.dylib")
    } else {
        format!("lib{stem}.so")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_library_extension() {
        let name = plugin_file_name("genserialize-plugin-json");
        assert!(is_plugin_library(Path::new(&name)));
        assert!(!is_plugin_library(Path::new("README.md")));
        assert!(!is_plugin_library(Path::new("noext")));
    }

    #[test]
    fn test_missing_directory_loads_nothing() {
        let mut loader = PluginLoader::new();
        let mut registry = PluginRegistry::new();
        assert_eq!(loader.load_directory(Path::new("/no/such/plugin/dir"), &mut registry), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_library_is_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let fake = dir.path().join(plugin_file_name("not-a-plugin"));
        std::fs::write(&fake, b"definitely not a shared library").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut loader = PluginLoader::new();
        let mut registry = PluginRegistry::new();
        assert_eq!(loader.load_directory(dir.path(), &mut registry), 0);
        assert_eq!(loader.library_count(), 0);

        let err = loader.load_file(&fake, &mut registry).unwrap_err();
        assert!(matches!(err, LoadError::Open { .. }));
    }
}
