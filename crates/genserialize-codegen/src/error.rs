//! Error types for code generation.

/// Failure to generate code for one (node, format) pair.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("field `{field}`: {reason}")]
    UnsupportedField { field: String, reason: String },
    #[error("POD field `{field}` refers to unresolved type `{type_name}`")]
    UnresolvedPod { field: String, type_name: String },
    #[error("POD type `{0}` contains itself")]
    RecursivePod(String),
    #[error("type `{0}` uses the POD policy and is only emitted inline")]
    PodNode(String),
    #[error("malformed plugin request: {0}")]
    Wire(#[from] serde_json::Error),
    #[error(transparent)]
    Bundle(#[from] genserialize_sast::BundleError),
    #[error("plugin failed (status {status}): {message}")]
    Plugin { status: i32, message: String },
}

impl GenerateError {
    pub(crate) fn unsupported(field: impl Into<String>, reason: impl Into<String>) -> Self {
        GenerateError::UnsupportedField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
