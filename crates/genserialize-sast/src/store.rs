//! Per-file analysis results and the merged global schema.

use crate::link::{LinkReport, NodeMap, link};
use crate::sast::SastNode;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Output of analyzing one source file.
#[derive(Debug, Clone, Default)]
pub struct SastResult {
    /// Marked types in declaration order.
    pub nodes: Vec<Arc<SastNode>>,
    /// Every node this file knows about by name, including POD helpers.
    pub by_name: NodeMap,
    /// Source file the nodes were declared in.
    pub file_path: PathBuf,
}

impl SastResult {
    /// Build a result whose lookup map holds exactly `nodes`.
    pub fn new(file_path: impl Into<PathBuf>, nodes: Vec<Arc<SastNode>>) -> Self {
        let by_name = nodes
            .iter()
            .map(|n| (n.name.clone(), Arc::clone(n)))
            .collect();
        Self {
            nodes,
            by_name,
            file_path: file_path.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// The merged schema of a whole run.
///
/// Filled by [`SchemaStore::merge`] after analysis and linked once with
/// [`SchemaStore::link`]; read-only afterwards.
#[derive(Debug, Default)]
pub struct SchemaStore {
    trees: BTreeMap<PathBuf, Vec<Arc<SastNode>>>,
    nodes: NodeMap,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one file's result. A type name seen before is replaced by the
    /// newer definition. A second result for a source path already merged is
    /// appended to that path's tree.
    pub fn merge(&mut self, result: SastResult) {
        for (name, node) in result.by_name {
            if let Some(previous) = self.nodes.insert(name, node)
                && !result.nodes.iter().any(|n| Arc::ptr_eq(n, &previous))
            {
                tracing::warn!(
                    type_name = %previous.name,
                    file = %result.file_path.display(),
                    "type defined more than once; keeping the later definition"
                );
            }
        }
        match self.trees.entry(result.file_path) {
            Entry::Vacant(entry) => {
                entry.insert(result.nodes);
            }
            Entry::Occupied(mut entry) => {
                tracing::warn!(
                    file = %entry.key().display(),
                    "source described by more than one schema; appending its types"
                );
                entry.get_mut().extend(result.nodes);
            }
        }
    }

    /// Resolve cross-file references in every tree.
    pub fn link(&self) -> LinkReport {
        let mut report = LinkReport::default();
        for tree in self.trees.values() {
            report.merge(link(tree, &self.nodes));
        }
        report
    }

    pub fn trees(&self) -> &BTreeMap<PathBuf, Vec<Arc<SastNode>>> {
        &self.trees
    }

    pub fn tree(&self, path: &Path) -> Option<&[Arc<SastNode>]> {
        self.trees.get(path).map(Vec::as_slice)
    }

    pub fn node(&self, name: &str) -> Option<&Arc<SastNode>> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    /// Number of files merged.
    pub fn file_count(&self) -> usize {
        self.trees.len()
    }

    /// Number of distinct type names.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sast::{SastField, SastType};

    #[test]
    fn test_merge_then_link_across_files() {
        let inner = Arc::new(SastNode::new("Inner").with_format("JSON"));
        let outer = Arc::new(
            SastNode::new("Outer")
                .with_format("JSON")
                .with_field(SastField::new("inner", SastType::Object).with_type_name("Inner")),
        );

        let mut store = SchemaStore::new();
        store.merge(SastResult::new("a/Inner.h", vec![Arc::clone(&inner)]));
        store.merge(SastResult::new("b/Outer.h", vec![Arc::clone(&outer)]));
        assert_eq!(store.file_count(), 2);
        assert_eq!(store.node_count(), 2);

        let report = store.link();
        assert_eq!(report.resolved, 1);
        assert!(Arc::ptr_eq(
            outer.fields[0].object_node.get().unwrap(),
            &inner
        ));
    }

    #[test]
    fn test_later_definition_wins() {
        let first = Arc::new(SastNode::new("Dup").with_format("JSON"));
        let second = Arc::new(SastNode::new("Dup").with_format("XML"));
        let mut store = SchemaStore::new();
        store.merge(SastResult::new("one.h", vec![first]));
        store.merge(SastResult::new("two.h", vec![second]));
        assert_eq!(store.node("Dup").unwrap().formats, vec!["XML"]);
        assert_eq!(store.tree(Path::new("one.h")).unwrap().len(), 1);
    }

    #[test]
    fn test_same_source_path_appends() {
        let mut store = SchemaStore::new();
        store.merge(SastResult::new("Foo.h", vec![Arc::new(SastNode::new("A"))]));
        store.merge(SastResult::new("Foo.h", vec![Arc::new(SastNode::new("B"))]));
        assert_eq!(store.file_count(), 1);
        assert_eq!(store.node_count(), 2);
        let names: Vec<_> = store
            .tree(Path::new("Foo.h"))
            .unwrap()
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, ["A", "B"]);
    }
}
