//! Per-file code generation: every (type, format) pair of a tree.

use crate::error::GenerateError;
use crate::registry::PluginRegistry;
use genserialize_sast::SastNode;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A (type, format) pair that produced no code.
#[derive(Debug, thiserror::Error)]
pub enum GenerationIssue {
    #[error("no plugin registered for format `{format}` requested by `{type_name}`")]
    MissingPlugin { type_name: String, format: String },
    #[error("{format} generation failed for `{type_name}`: {error}")]
    Failed {
        type_name: String,
        format: String,
        #[source]
        error: GenerateError,
    },
}

/// Line-continued code for one type, one entry per format in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCode {
    pub type_name: String,
    pub formats: Vec<(String, String)>,
}

/// Code generated for one source file.
#[derive(Debug, Default)]
pub struct GeneratedCode {
    /// Types that produced code, in declaration order.
    pub types: Vec<TypeCode>,
    /// Includes required by the plugins that produced code.
    pub includes: BTreeSet<String>,
    pub issues: Vec<GenerationIssue>,
}

impl GeneratedCode {
    /// Whether no code was produced at all.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Code generated for `type_name` in `format`.
    pub fn code(&self, type_name: &str, format: &str) -> Option<&str> {
        self.types
            .iter()
            .find(|t| t.type_name == type_name)?
            .formats
            .iter()
            .find(|(f, _)| f == format)
            .map(|(_, text)| text.as_str())
    }
}

/// Runs the registered plugins over a file's nodes.
#[derive(Debug, Clone, Copy)]
pub struct CodeGenerator<'r> {
    registry: &'r PluginRegistry,
}

impl<'r> CodeGenerator<'r> {
    pub fn new(registry: &'r PluginRegistry) -> Self {
        Self { registry }
    }

    /// Generate every requested format for every node.
    ///
    /// A missing plugin or a failing (node, format) pair is recorded in
    /// [`GeneratedCode::issues`] and skipped; the rest still generate.
    pub fn generate(&self, nodes: &[Arc<SastNode>]) -> GeneratedCode {
        let mut code = GeneratedCode::default();

        for node in nodes {
            if node.is_pod() {
                tracing::debug!(type_name = %node.name, "skipping POD type");
                continue;
            }
            let mut formats = Vec::new();
            for format in &node.formats {
                let Some(plugin) = self.registry.get(format) else {
                    let issue = GenerationIssue::MissingPlugin {
                        type_name: node.name.clone(),
                        format: format.clone(),
                    };
                    tracing::error!("{issue}");
                    code.issues.push(issue);
                    continue;
                };

                match plugin.generate_code(node) {
                    Ok(text) => {
                        code.includes.extend(plugin.required_includes());
                        formats.push((format.clone(), escape_line_continuations(&text)));
                    }
                    Err(error) => {
                        let issue = GenerationIssue::Failed {
                            type_name: node.name.clone(),
                            format: format.clone(),
                            error,
                        };
                        tracing::error!("{issue}");
                        code.issues.push(issue);
                    }
                }
            }
            if !formats.is_empty() {
                code.types.push(TypeCode {
                    type_name: node.name.clone(),
                    formats,
                });
            }
        }

        code
    }
}

/// Append ` \` to every line so the text can sit inside a macro body.
///
/// A `//` comment would swallow the continuation and every line after it
/// once the preprocessor splices the macro, so line comments outside
/// string and character literals become `/* ... */` comments.
pub fn escape_line_continuations(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 16);
    let mut in_block_comment = false;
    for line in text.lines() {
        push_without_line_comment(&mut out, line, &mut in_block_comment);
        out.push_str(" \\\n");
    }
    out
}

fn push_without_line_comment(out: &mut String, line: &str, in_block_comment: &mut bool) {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        if *in_block_comment {
            if b == b'*' && next == Some(b'/') {
                *in_block_comment = false;
                i += 1;
            }
        } else if let Some(q) = quote {
            if b == b'\\' {
                i += 1;
            } else if b == q {
                quote = None;
            }
        } else {
            match (b, next) {
                (b'"' | b'\'', _) => quote = Some(b),
                (b'/', Some(b'*')) => {
                    *in_block_comment = true;
                    i += 1;
                }
                (b'/', Some(b'/')) => {
                    let comment = line[i + 2..].trim_end().replace("*/", "* /");
                    out.push_str(&line[..i]);
                    out.push_str("/*");
                    out.push_str(&comment);
                    out.push_str(" */");
                    return;
                }
                _ => {}
            }
        }
        i += 1;
    }
    out.push_str(line);
}
