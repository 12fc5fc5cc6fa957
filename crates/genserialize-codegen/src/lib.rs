//! Serialization code generation from a linked schema.
//!
//! `genserialize-codegen` turns [`SastNode`](genserialize_sast::SastNode)s into
//! serialization routines through pluggable, per-format code generators.
//!
//! # Architecture
//!
//! ```text
//! Linked schema        Generation                      Output
//! ─────────────     ──────────────────────────     ───────────────────
//! SastNode ───────> CodeGenerator ─> PluginRegistry ─> GeneratedCode ─> OutputSink
//! (per file)        (generator.rs)    ├─ built-in JSON  (type -> format)   (writer.rs)
//!                                     └─ DynamicPlugin (loader.rs, abi.rs)
//! ```
//!
//! # Example
//!
//! ```
//! use genserialize_codegen::{CodeGenerator, PluginRegistry};
//! use genserialize_sast::{SastField, SastNode, SastType};
//! use std::sync::Arc;
//!
//! let registry = PluginRegistry::with_builtin();
//! let node = Arc::new(
//!     SastNode::new("Config")
//!         .with_format("JSON")
//!         .with_field(SastField::new("retries", SastType::Int).with_type_name("int")),
//! );
//!
//! let code = CodeGenerator::new(&registry).generate(&[node]);
//! assert!(code.issues.is_empty());
//! assert!(code.code("Config", "JSON").unwrap().contains("JSONSerialize"));
//! ```
//!
//! # Loading Plugins
//!
//! ```ignore
//! use genserialize_codegen::{PluginLoader, PluginRegistry};
//!
//! let mut registry = PluginRegistry::with_builtin();
//! let mut loader = PluginLoader::new();
//! loader.load_directory("target/plugins".as_ref(), &mut registry);
//! ```
//!
//! # Feature Flags
//!
//! - `plugin-json` (default) - built-in JSON plugin

pub mod abi;
pub mod emit;
pub mod error;
pub mod generator;
pub mod loader;
pub mod output;
pub mod registry;
pub mod traits;
pub mod writer;

pub use genserialize_sast;

pub use error::GenerateError;
pub use generator::{
    CodeGenerator, GeneratedCode, GenerationIssue, TypeCode, escape_line_continuations,
};
pub use loader::{DynamicPlugin, LoadError, PluginLoader};
pub use registry::PluginRegistry;
pub use traits::FormatPlugin;
pub use writer::{GeneratedFileWriter, OutputSink, WriteError};

#[cfg(feature = "plugin-json")]
pub use output::JsonFormatPlugin;
