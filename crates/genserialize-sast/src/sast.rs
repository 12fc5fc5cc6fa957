//! Serialization schema (SAST) types.
//!
//! A [`SastNode`] describes one type marked for serialization: which formats
//! were requested, which fields take part, and which serializable bases it
//! inherits from. Fields carry a [`SastType`] tag; container tags carry the
//! description of their element (or key and value) as a nested [`SastField`],
//! which is what makes multi-dimensional and nested containers expressible.
//!
//! References to other types (object fields, POD fields, base classes) are
//! held in a [`NodeLink`]. Links are filled either by the front end (same-file
//! references) or by the [linker](crate::link) once every file is merged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Field visibility in the host type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    #[default]
    Public,
    Protected,
    Private,
}

/// Which fields of a type are serialized when not individually marked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationPolicy {
    /// Inlined into referencing types, never emitted on its own.
    Pod,
    All,
    Public,
    Protected,
    Private,
    /// Only explicitly marked fields.
    #[default]
    Custom,
}

/// Type tag of a serialized field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SastType {
    Int,
    Float,
    Double,
    Bool,
    String,
    /// A serializable record, delegated to its own routines.
    Object,
    /// A plain-data record whose fields are inlined into the parent.
    Pod,
    /// Fixed-size array with a compile-time bound.
    StaticArray { element: Box<SastField> },
    /// Heap array whose length lives in the sibling field `length_var`.
    DynamicArray {
        element: Box<SastField>,
        length_var: String,
    },
    Vector { element: Box<SastField> },
    Set { element: Box<SastField> },
    UnorderedSet { element: Box<SastField> },
    Map {
        key: Box<SastField>,
        value: Box<SastField>,
    },
    UnorderedMap {
        key: Box<SastField>,
        value: Box<SastField>,
    },
}

impl SastType {
    /// Short lowercase name of the tag, as used in schema files.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SastType::Int => "int",
            SastType::Float => "float",
            SastType::Double => "double",
            SastType::Bool => "bool",
            SastType::String => "string",
            SastType::Object => "object",
            SastType::Pod => "pod",
            SastType::StaticArray { .. } => "static_array",
            SastType::DynamicArray { .. } => "dynamic_array",
            SastType::Vector { .. } => "vector",
            SastType::Set { .. } => "set",
            SastType::UnorderedSet { .. } => "unordered_set",
            SastType::Map { .. } => "map",
            SastType::UnorderedMap { .. } => "unordered_map",
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            SastType::Int | SastType::Float | SastType::Double | SastType::Bool | SastType::String
        )
    }

    /// Whether the tag refers to another node through [`SastField::object_node`].
    pub fn is_record(&self) -> bool {
        matches!(self, SastType::Object | SastType::Pod)
    }

    /// Nested field descriptions, in key-then-value order for maps.
    pub fn children(&self) -> Vec<&SastField> {
        match self {
            SastType::StaticArray { element }
            | SastType::DynamicArray { element, .. }
            | SastType::Vector { element }
            | SastType::Set { element }
            | SastType::UnorderedSet { element } => vec![element.as_ref()],
            SastType::Map { key, value } | SastType::UnorderedMap { key, value } => {
                vec![key.as_ref(), value.as_ref()]
            }
            _ => Vec::new(),
        }
    }
}

/// A shared, set-once reference to another node.
///
/// Linking goes through `&self`, so nodes already shared between a file's
/// tree and the global map can be resolved in place. A link that is already
/// set is never overwritten.
#[derive(Clone, Default)]
pub struct NodeLink(OnceLock<Arc<SastNode>>);

impl NodeLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A link that is resolved from the start.
    pub fn resolved(node: Arc<SastNode>) -> Self {
        let link = Self::default();
        let _ = link.0.set(node);
        link
    }

    pub fn get(&self) -> Option<&Arc<SastNode>> {
        self.0.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.0.get().is_some()
    }

    /// Point the link at `node`. Returns false if it was already resolved.
    pub fn resolve(&self, node: Arc<SastNode>) -> bool {
        self.0.set(node).is_ok()
    }
}

// Only the target name is printed: links may form cycles.
impl fmt::Debug for NodeLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(node) => write!(f, "NodeLink({})", node.name),
            None => f.write_str("NodeLink(<unresolved>)"),
        }
    }
}

/// One serialized field, or the element/key/value description of a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SastField {
    /// Member name in the host type. Empty for container element descriptions.
    #[serde(default)]
    pub name: String,
    /// Serialized name. Empty means "same as `name`".
    #[serde(default)]
    pub formatted_name: String,
    #[serde(rename = "type")]
    pub ty: SastType,
    /// Type as spelled in source; the key used for cross-file linking.
    #[serde(default)]
    pub original_type_name: String,
    #[serde(default)]
    pub access: Access,
    #[serde(skip)]
    pub object_node: NodeLink,
}

impl SastField {
    pub fn new(name: impl Into<String>, ty: SastType) -> Self {
        let name = name.into();
        Self {
            formatted_name: name.clone(),
            name,
            ty,
            original_type_name: String::new(),
            access: Access::Public,
            object_node: NodeLink::new(),
        }
    }

    /// An unnamed element description for a container.
    pub fn element(ty: SastType, original_type_name: impl Into<String>) -> Self {
        Self::new("", ty).with_type_name(original_type_name)
    }

    pub fn with_type_name(mut self, original_type_name: impl Into<String>) -> Self {
        self.original_type_name = original_type_name.into();
        self
    }

    pub fn with_formatted_name(mut self, formatted_name: impl Into<String>) -> Self {
        self.formatted_name = formatted_name.into();
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_object_node(self, node: Arc<SastNode>) -> Self {
        self.object_node.resolve(node);
        self
    }

    /// The name this field is written under.
    pub fn serialized_name(&self) -> &str {
        if self.formatted_name.is_empty() {
            &self.name
        } else {
            &self.formatted_name
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.object_node.is_resolved()
    }
}

/// A named, linkable reference to a serializable base type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseRef {
    pub name: String,
    #[serde(skip)]
    pub node: NodeLink,
}

impl BaseRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node: NodeLink::new(),
        }
    }

    pub fn resolved(node: Arc<SastNode>) -> Self {
        Self {
            name: node.name.clone(),
            node: NodeLink::resolved(node),
        }
    }
}

/// A type marked for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SastNode {
    /// Fully qualified type name, unique across the schema.
    pub name: String,
    #[serde(default)]
    pub policy: SerializationPolicy,
    /// Requested output formats, in request order.
    #[serde(default)]
    pub formats: Vec<String>,
    /// Serialized fields in serialization order.
    #[serde(default)]
    pub fields: Vec<SastField>,
    /// Serializable base types in declaration order.
    #[serde(default)]
    pub bases: Vec<BaseRef>,
}

impl SastNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: SerializationPolicy::Custom,
            formats: Vec::new(),
            fields: Vec::new(),
            bases: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: SerializationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.formats.push(format.into());
        self
    }

    pub fn with_field(mut self, field: SastField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_base(mut self, base: BaseRef) -> Self {
        self.bases.push(base);
        self
    }

    pub fn is_pod(&self) -> bool {
        self.policy == SerializationPolicy::Pod
    }

    /// Fill in empty `formatted_name`s (recursively) from `name`.
    pub fn normalize_names(&mut self) {
        fn normalize(field: &mut SastField) {
            if field.formatted_name.is_empty() {
                field.formatted_name = field.name.clone();
            }
            match &mut field.ty {
                SastType::StaticArray { element }
                | SastType::DynamicArray { element, .. }
                | SastType::Vector { element }
                | SastType::Set { element }
                | SastType::UnorderedSet { element } => normalize(element),
                SastType::Map { key, value } | SastType::UnorderedMap { key, value } => {
                    normalize(key);
                    normalize(value);
                }
                _ => {}
            }
        }
        self.fields.iter_mut().for_each(normalize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_is_set_once() {
        let a = Arc::new(SastNode::new("A"));
        let b = Arc::new(SastNode::new("B"));
        let link = NodeLink::new();
        assert!(link.resolve(a));
        assert!(!link.resolve(b));
        assert_eq!(link.get().unwrap().name, "A");
    }

    #[test]
    fn test_link_debug_prints_name_only() {
        let link = NodeLink::resolved(Arc::new(SastNode::new("ns::Thing")));
        assert_eq!(format!("{link:?}"), "NodeLink(ns::Thing)");
        assert_eq!(format!("{:?}", NodeLink::new()), "NodeLink(<unresolved>)");
    }

    #[test]
    fn test_serialized_name_falls_back_to_name() {
        let mut field = SastField::new("count", SastType::Int);
        assert_eq!(field.serialized_name(), "count");
        field.formatted_name.clear();
        assert_eq!(field.serialized_name(), "count");
        let field = field.with_formatted_name("n");
        assert_eq!(field.serialized_name(), "n");
    }

    #[test]
    fn test_schema_json_shape() {
        let json = serde_json::json!({
            "name": "Inventory",
            "formats": ["JSON"],
            "fields": [
                { "name": "ids", "type": { "kind": "vector", "element": { "type": { "kind": "int" }, "original_type_name": "int" } } },
                { "name": "lookup", "type": {
                    "kind": "unordered_map",
                    "key": { "type": { "kind": "string" } },
                    "value": { "type": { "kind": "pod" }, "original_type_name": "Slot" }
                } }
            ]
        });
        let mut node: SastNode = serde_json::from_value(json).unwrap();
        node.normalize_names();
        assert_eq!(node.policy, SerializationPolicy::Custom);
        assert_eq!(node.fields.len(), 2);
        assert_eq!(node.fields[0].serialized_name(), "ids");
        match &node.fields[1].ty {
            SastType::UnorderedMap { key, value } => {
                assert!(key.ty.is_scalar());
                assert_eq!(value.original_type_name, "Slot");
                assert!(!value.is_resolved());
            }
            other => panic!("unexpected tag {}", other.kind_name()),
        }
    }
}
