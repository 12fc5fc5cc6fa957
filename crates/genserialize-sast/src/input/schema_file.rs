//! Schema-file front end.
//!
//! Reads one schema description per annotated source file, in JSON or TOML:
//!
//! ```json
//! {
//!   "source": "Player.h",
//!   "types": [
//!     {
//!       "name": "Player",
//!       "formats": ["JSON"],
//!       "bases": ["Entity"],
//!       "fields": [
//!         { "name": "score", "type": { "kind": "int" }, "original_type_name": "int" },
//!         { "name": "secret", "type": { "kind": "string" }, "access": "private", "mark": "exclude" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Unmarked fields are selected by the type's policy (`all` when omitted):
//! `all`/`pod` take every field, `public`/`protected`/`private` take fields of
//! that access, `custom` takes none. `"mark": "serialize"` or `"exclude"`
//! overrides the policy for one field.

use super::{AnalysisSession, AnalyzeError, Frontend};
use crate::link::{NodeMap, link};
use crate::sast::{Access, BaseRef, SastField, SastNode, SerializationPolicy};
use crate::store::SastResult;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-field override of the type's policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMark {
    Serialize,
    Exclude,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldEntry {
    #[serde(flatten)]
    field: SastField,
    #[serde(default)]
    mark: Option<FieldMark>,
}

#[derive(Debug, Clone, Deserialize)]
struct TypeEntry {
    name: String,
    #[serde(default)]
    policy: Option<SerializationPolicy>,
    #[serde(default)]
    formats: Vec<String>,
    #[serde(default)]
    bases: Vec<String>,
    #[serde(default)]
    fields: Vec<FieldEntry>,
}

/// Contents of one schema file.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaFile {
    /// Annotated source file, relative to the schema file.
    #[serde(default)]
    source: Option<PathBuf>,
    #[serde(default)]
    types: Vec<TypeEntry>,
}

impl SchemaFile {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    #[cfg(feature = "input-toml")]
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Build the nodes, linking references between types of this file.
    pub fn into_result(self, schema_path: &Path) -> Result<SastResult, AnalyzeError> {
        let file_path = match &self.source {
            Some(source) => schema_path
                .parent()
                .map(|dir| dir.join(source))
                .unwrap_or_else(|| source.clone()),
            None => default_source_path(schema_path),
        };

        let mut nodes = Vec::with_capacity(self.types.len());
        let mut by_name = NodeMap::new();
        for entry in self.types {
            let node = Arc::new(entry.into_node());
            if by_name
                .insert(node.name.clone(), Arc::clone(&node))
                .is_some()
            {
                return Err(AnalyzeError::DuplicateType {
                    name: node.name.clone(),
                    path: schema_path.to_path_buf(),
                });
            }
            nodes.push(node);
        }

        link(&nodes, &by_name);

        Ok(SastResult {
            nodes,
            by_name,
            file_path,
        })
    }
}

impl TypeEntry {
    fn into_node(self) -> SastNode {
        let policy = self.policy.unwrap_or(SerializationPolicy::All);
        let mut node = SastNode::new(self.name).with_policy(policy);
        node.formats = self.formats;
        node.bases = self.bases.into_iter().map(BaseRef::new).collect();
        node.fields = self
            .fields
            .into_iter()
            .filter(|entry| selected(policy, entry))
            .map(|entry| entry.field)
            .collect();
        node.normalize_names();
        node
    }
}

fn selected(policy: SerializationPolicy, entry: &FieldEntry) -> bool {
    match entry.mark {
        Some(FieldMark::Serialize) => true,
        Some(FieldMark::Exclude) => false,
        None => match policy {
            SerializationPolicy::All | SerializationPolicy::Pod => true,
            SerializationPolicy::Public => entry.field.access == Access::Public,
            SerializationPolicy::Protected => entry.field.access == Access::Protected,
            SerializationPolicy::Private => entry.field.access == Access::Private,
            SerializationPolicy::Custom => false,
        },
    }
}

/// `dir/Player.sast.json` describes `dir/Player.h`.
fn default_source_path(schema_path: &Path) -> PathBuf {
    let file_name = schema_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name
        .strip_suffix(".sast.json")
        .or_else(|| file_name.strip_suffix(".sast.toml"))
        .or_else(|| file_name.rsplit_once('.').map(|(stem, _)| stem))
        .unwrap_or(&file_name);
    schema_path.with_file_name(format!("{stem}.h"))
}

/// Front end reading `.sast.json` / `.sast.toml` schema files.
#[derive(Debug, Clone, Default)]
pub struct SchemaFileFrontend {
    include_paths: Vec<PathBuf>,
}

impl SchemaFileFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories searched for relative inputs that do not exist as given.
    pub fn with_include_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            include_paths: paths,
        }
    }

    fn locate(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        if path.is_absolute() {
            return None;
        }
        self.include_paths
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.is_file())
    }
}

impl Frontend for SchemaFileFrontend {
    fn name(&self) -> &'static str {
        "schema-file"
    }

    fn session(&self) -> Box<dyn AnalysisSession + '_> {
        Box::new(SchemaFileSession {
            frontend: self,
            buffer: String::new(),
        })
    }
}

struct SchemaFileSession<'a> {
    frontend: &'a SchemaFileFrontend,
    /// Reused read buffer.
    buffer: String,
}

impl AnalysisSession for SchemaFileSession<'_> {
    fn analyze(&mut self, path: &Path) -> Result<SastResult, AnalyzeError> {
        use std::io::Read;

        let resolved = self
            .frontend
            .locate(path)
            .ok_or_else(|| AnalyzeError::NotFound(path.to_path_buf()))?;

        self.buffer.clear();
        std::fs::File::open(&resolved)
            .and_then(|mut file| file.read_to_string(&mut self.buffer))
            .map_err(|source| AnalyzeError::Io {
                path: resolved.clone(),
                source,
            })?;

        let extension = resolved
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let schema = match extension {
            "json" => SchemaFile::from_json(&self.buffer).map_err(|source| AnalyzeError::Json {
                path: resolved.clone(),
                source,
            })?,
            #[cfg(feature = "input-toml")]
            "toml" => SchemaFile::from_toml(&self.buffer).map_err(|source| AnalyzeError::Toml {
                path: resolved.clone(),
                source,
            })?,
            _ => return Err(AnalyzeError::UnsupportedExtension(resolved)),
        };

        schema.into_result(&resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sast::SastType;

    #[test]
    fn test_policy_selects_fields() {
        let schema = SchemaFile::from_json(
            r#"{
                "types": [{
                    "name": "Account",
                    "policy": "public",
                    "formats": ["JSON"],
                    "fields": [
                        { "name": "id", "type": { "kind": "int" } },
                        { "name": "hash", "type": { "kind": "string" }, "access": "private" },
                        { "name": "salt", "type": { "kind": "string" }, "access": "private", "mark": "serialize" },
                        { "name": "cache", "type": { "kind": "string" }, "mark": "exclude" }
                    ]
                }]
            }"#,
        )
        .unwrap();
        let result = schema.into_result(Path::new("dir/Account.sast.json")).unwrap();
        let names: Vec<_> = result.nodes[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "salt"]);
        assert_eq!(result.file_path, Path::new("dir/Account.h"));
    }

    #[test]
    fn test_same_file_references_are_linked() {
        let schema = SchemaFile::from_json(
            r#"{
                "source": "Shapes.hpp",
                "types": [
                    { "name": "Point", "policy": "pod", "fields": [
                        { "name": "x", "type": { "kind": "double" } },
                        { "name": "y", "type": { "kind": "double" } }
                    ] },
                    { "name": "Polygon", "formats": ["JSON"], "fields": [
                        { "name": "points", "type": { "kind": "vector",
                            "element": { "type": { "kind": "pod" }, "original_type_name": "Point" } } }
                    ] }
                ]
            }"#,
        )
        .unwrap();
        let result = schema.into_result(Path::new("shapes/Shapes.sast.json")).unwrap();
        assert_eq!(result.file_path, Path::new("shapes/Shapes.hpp"));
        assert_eq!(result.nodes.len(), 2);
        let SastType::Vector { element } = &result.nodes[1].fields[0].ty else {
            panic!("expected vector");
        };
        assert!(Arc::ptr_eq(
            element.object_node.get().unwrap(),
            &result.by_name["Point"]
        ));
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let schema = SchemaFile::from_json(r#"{ "types": [{ "name": "A" }, { "name": "A" }] }"#)
            .unwrap();
        let err = schema.into_result(Path::new("A.sast.json")).unwrap_err();
        assert!(matches!(err, AnalyzeError::DuplicateType { .. }));
    }

    #[cfg(feature = "input-toml")]
    #[test]
    fn test_toml_schema() {
        let schema = SchemaFile::from_toml(
            r#"
source = "Config.h"

[[types]]
name = "Config"
formats = ["JSON"]

[[types.fields]]
name = "retries"
type = { kind = "int" }
original_type_name = "int"
"#,
        )
        .unwrap();
        let result = schema.into_result(Path::new("Config.sast.toml")).unwrap();
        assert_eq!(result.nodes[0].fields[0].serialized_name(), "retries");
    }

    #[test]
    fn test_missing_input_is_unreadable() {
        let frontend = SchemaFileFrontend::new();
        let err = frontend
            .session()
            .analyze(Path::new("does/not/exist.sast.json"))
            .unwrap_err();
        assert!(err.is_unreadable());
    }

    #[test]
    fn test_include_paths_are_searched() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("Found.sast.json"),
            r#"{ "types": [{ "name": "Found", "formats": ["JSON"] }] }"#,
        )
        .unwrap();
        let frontend = SchemaFileFrontend::with_include_paths(vec![dir.path().to_path_buf()]);
        let result = frontend
            .session()
            .analyze(Path::new("Found.sast.json"))
            .unwrap();
        assert_eq!(result.nodes[0].name, "Found");
        assert_eq!(result.file_path, dir.path().join("Found.h"));
    }
}
