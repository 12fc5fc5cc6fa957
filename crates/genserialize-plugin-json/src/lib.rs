//! JSON format plugin as a shared library.
//!
//! Exports `CreatePlugin` with priority 1, so loading it (for example from
//! `target/plugins/` after `cargo xtask build-plugins`) replaces the built-in
//! JSON plugin, which registers at priority 0.

use genserialize_codegen::output::JsonFormatPlugin;

/// Priority the exported plugin registers with.
pub const PRIORITY: u8 = 1;

genserialize_codegen::declare_format_plugin!(JsonFormatPlugin::with_priority(PRIORITY));

#[cfg(test)]
mod tests {
    use super::*;
    use genserialize_codegen::abi::ABI_VERSION;

    #[test]
    fn test_factory_reports_json() {
        let table = unsafe { &*CreatePlugin() };
        assert_eq!(table.abi_version, ABI_VERSION);
        assert_eq!(table.priority, PRIORITY);
        assert_eq!(unsafe { table.format_name.to_owned_string() }.unwrap(), "JSON");
        // Same static on every call.
        assert!(std::ptr::eq(CreatePlugin(), CreatePlugin()));
    }
}
