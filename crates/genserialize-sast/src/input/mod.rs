//! Front ends: producers of [`SastResult`](crate::SastResult)s.
//!
//! The pipeline only depends on the [`Frontend`] trait. Anything that can
//! describe the serializable types of a source file can feed it: a compiler
//! plugin, a hand-written parser, or the schema files read by
//! [`SchemaFileFrontend`].

mod schema_file;

pub use schema_file::{FieldMark, SchemaFile, SchemaFileFrontend};

use crate::store::SastResult;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("input not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON schema file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[cfg(feature = "input-toml")]
    #[error("invalid TOML schema file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("type `{name}` declared twice in {path}")]
    DuplicateType { name: String, path: PathBuf },
    #[error("unsupported input {0}: expected a .sast.json or .sast.toml file")]
    UnsupportedExtension(PathBuf),
}

impl AnalyzeError {
    /// Whether the input could not be read at all, as opposed to being read
    /// and rejected.
    pub fn is_unreadable(&self) -> bool {
        matches!(self, AnalyzeError::NotFound(_) | AnalyzeError::Io { .. })
    }
}

/// One worker's private analysis state.
pub trait AnalysisSession {
    /// Describe the serializable types declared in `path`.
    fn analyze(&mut self, path: &Path) -> Result<SastResult, AnalyzeError>;
}

/// A source of schema descriptions.
///
/// Each parallel worker opens its own [`AnalysisSession`], so sessions never
/// share mutable state.
pub trait Frontend: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    fn session(&self) -> Box<dyn AnalysisSession + '_>;
}
