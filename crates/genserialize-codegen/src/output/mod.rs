//! Built-in format plugins.
//!
//! Each plugin implements [`FormatPlugin`](crate::traits::FormatPlugin) and is
//! registered by [`PluginRegistry::with_builtin`](crate::PluginRegistry::with_builtin)
//! when its feature is enabled.

// JSON
#[cfg(feature = "plugin-json")]
pub mod json;

#[cfg(feature = "plugin-json")]
pub use json::JsonFormatPlugin;
