//! Serialization schema (SAST) for `genserialize`.
//!
//! `genserialize-sast` holds the passive description of which types are
//! serialized and how, plus the pieces that assemble it across files:
//!
//! ```text
//! schema files ─> Frontend ─> SastResult (per file) ─> SchemaStore ─> link ─> read-only schema
//! (input/)                    (store.rs)               (merge)        (link.rs)
//! ```
//!
//! # Example
//!
//! ```
//! use genserialize_sast::{SastField, SastNode, SastResult, SastType, SchemaStore};
//! use std::sync::Arc;
//!
//! let inner = Arc::new(SastNode::new("Inner").with_format("JSON"));
//! let outer = Arc::new(
//!     SastNode::new("Outer")
//!         .with_format("JSON")
//!         .with_field(SastField::new("inner", SastType::Object).with_type_name("Inner")),
//! );
//!
//! let mut store = SchemaStore::new();
//! store.merge(SastResult::new("Inner.h", vec![inner]));
//! store.merge(SastResult::new("Outer.h", vec![Arc::clone(&outer)]));
//!
//! let report = store.link();
//! assert_eq!(report.resolved, 1);
//! assert!(outer.fields[0].is_resolved());
//! ```

pub mod bundle;
pub mod input;
pub mod link;
pub mod sast;
pub mod store;

pub use bundle::{BundleError, BundleLink, LinkSite, NodeBundle};
pub use input::{AnalysisSession, AnalyzeError, Frontend, SchemaFileFrontend};
pub use link::{LinkReport, NodeMap, UnresolvedRef, link};
pub use sast::{Access, BaseRef, NodeLink, SastField, SastNode, SastType, SerializationPolicy};
pub use store::{SastResult, SchemaStore};
