//! Generated header files.
//!
//! Each annotated source file gets one header next to it, in a `generated/`
//! directory (or in a configured output directory):
//!
//! ```text
//! // Generated by genserialize from Player.h. Do not edit.
//! #pragma once
//!
//! #include <JSONStructure.h>
//!
//! #define game_Player_SERIALIZATION_BODY() \
//! /* Format: JSON */ \
//! static void JSONSerialize(JSONObject& jsonReceiver, const game::Player& objSource) \
//! ...
//!
//! #define GENERATED_SERIALIZATION_BODY() game_Player_SERIALIZATION_BODY()
//! ```
//!
//! The annotated type expands its `<Type>_SERIALIZATION_BODY()` inside its
//! definition. The `GENERATED_SERIALIZATION_BODY()` alias only exists when the
//! file declares a single type.

use crate::generator::GeneratedCode;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("cannot derive an output name from {0}")]
    InvalidSource(PathBuf),
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for generated code, shared by all generation workers.
pub trait OutputSink: Sync {
    /// Store the code generated for `source`; returns where it went.
    fn write(&self, source: &Path, code: &GeneratedCode) -> Result<PathBuf, WriteError>;
}

/// Writes `<stem>.generated.h` files to disk.
#[derive(Debug, Clone, Default)]
pub struct GeneratedFileWriter {
    output_dir: Option<PathBuf>,
}

impl GeneratedFileWriter {
    /// Write next to each source, in a `generated/` subdirectory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write every header into `dir`.
    pub fn with_output_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: Some(dir.into()),
        }
    }

    /// Path of the header generated for `source`.
    pub fn output_path(&self, source: &Path) -> Result<PathBuf, WriteError> {
        let stem = source
            .file_stem()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| WriteError::InvalidSource(source.to_path_buf()))?;
        let file_name = format!("{}.generated.h", stem.to_string_lossy());
        let dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => source
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join("generated"),
        };
        Ok(dir.join(file_name))
    }
}

impl OutputSink for GeneratedFileWriter {
    fn write(&self, source: &Path, code: &GeneratedCode) -> Result<PathBuf, WriteError> {
        let path = self.output_path(source)?;
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(|source| WriteError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, render(source, code)).map_err(|source| WriteError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), types = code.types.len(), "wrote generated header");
        Ok(path)
    }
}

/// Render the header text for `source`.
pub fn render(source: &Path, code: &GeneratedCode) -> String {
    let mut out = String::new();
    let source_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string());

    let _ = writeln!(out, "// Generated by genserialize from {source_name}. Do not edit.");
    out.push_str("#pragma once\n");

    if !code.includes.is_empty() {
        out.push('\n');
        for include in &code.includes {
            let _ = writeln!(out, "#include {include}");
        }
    }

    for type_code in &code.types {
        out.push('\n');
        let _ = writeln!(out, "#define {}() \\", body_macro(&type_code.type_name));
        for (format, text) in &type_code.formats {
            let _ = writeln!(out, "/* Format: {format} */ \\");
            out.push_str(text);
        }
    }

    if let [only] = code.types.as_slice() {
        out.push('\n');
        let _ = writeln!(
            out,
            "#define GENERATED_SERIALIZATION_BODY() {}()",
            body_macro(&only.type_name)
        );
    }

    out
}

/// `game::Player` becomes `game_Player_SERIALIZATION_BODY`.
pub fn body_macro(type_name: &str) -> String {
    let ident: String = type_name
        .replace("::", "_")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("{ident}_SERIALIZATION_BODY")
}
