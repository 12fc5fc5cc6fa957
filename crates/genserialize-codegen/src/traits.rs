//! Traits for format plugins.

use crate::error::GenerateError;
use genserialize_sast::SastNode;

/// A code generator for one named wire format.
///
/// Plugins turn a linked [`SastNode`] into serialization and deserialization
/// routines for the host type. Output must depend only on the node: the same
/// node always yields the same text, and generating has no side effects.
///
/// # Implementing Custom Plugins
///
/// ```ignore
/// use genserialize_codegen::{FormatPlugin, GenerateError, PluginRegistry};
/// use genserialize_sast::SastNode;
/// use std::sync::Arc;
///
/// struct XmlPlugin;
///
/// impl FormatPlugin for XmlPlugin {
///     fn format_name(&self) -> &str { "XML" }
///     fn generate_code(&self, node: &SastNode) -> Result<String, GenerateError> { /* ... */ }
/// }
///
/// let mut registry = PluginRegistry::with_builtin();
/// registry.register_plugin(Arc::new(XmlPlugin));
/// ```
///
/// To ship a plugin as a shared library, wrap it with
/// [`declare_format_plugin!`](crate::declare_format_plugin).
pub trait FormatPlugin: Send + Sync {
    /// Format identifier requested by annotated types (e.g., "JSON").
    fn format_name(&self) -> &str;

    /// Registration priority; a higher value replaces a plugin for the same format.
    fn priority(&self) -> u8 {
        0
    }

    /// Headers the generated code needs, written once per generated file.
    fn required_includes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Generate the routines for `node`.
    ///
    /// The text is spliced into a multi-line macro. `//` comments outside
    /// literals are rewritten to `/* */` comments on the way in.
    fn generate_code(&self, node: &SastNode) -> Result<String, GenerateError>;
}
