//! Cross-file reference linking.
//!
//! The front end can only resolve references to types declared in the file it
//! is analyzing. Once every file's nodes are merged into one map, [`link`]
//! fills the remaining [`NodeLink`](crate::NodeLink)s by looking up each
//! reference's type name. A name with no match is left unresolved and
//! reported, never treated as an error.

use crate::sast::{SastField, SastNode};
use std::collections::HashMap;
use std::sync::Arc;

/// Global type-name lookup used while linking.
pub type NodeMap = HashMap<String, Arc<SastNode>>;

/// A reference that had no matching node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRef {
    /// Node that holds the reference.
    pub owner: String,
    /// Field name, or `<base>` for a base-class reference.
    pub field: String,
    pub type_name: String,
}

/// Outcome of a linking pass.
#[derive(Debug, Clone, Default)]
pub struct LinkReport {
    /// Links set by this pass.
    pub resolved: usize,
    pub unresolved: Vec<UnresolvedRef>,
}

impl LinkReport {
    pub fn merge(&mut self, other: LinkReport) {
        self.resolved += other.resolved;
        self.unresolved.extend(other.unresolved);
    }
}

/// Resolve every unset reference in `tree` against `global`.
///
/// Descends into container element/key/value descriptions and base-class
/// references. Links that are already set are left alone, so running this
/// twice is harmless.
pub fn link(tree: &[Arc<SastNode>], global: &NodeMap) -> LinkReport {
    let mut report = LinkReport::default();

    for node in tree {
        for base in &node.bases {
            if base.node.is_resolved() {
                continue;
            }
            match lookup(global, &base.name) {
                Some(target) => {
                    base.node.resolve(Arc::clone(target));
                    report.resolved += 1;
                }
                None => {
                    tracing::debug!(owner = %node.name, base = %base.name, "unresolved base type");
                    report.unresolved.push(UnresolvedRef {
                        owner: node.name.clone(),
                        field: "<base>".to_string(),
                        type_name: base.name.clone(),
                    });
                }
            }
        }

        for field in &node.fields {
            link_field(&node.name, field, field.name.as_str(), global, &mut report);
        }
    }

    report
}

fn link_field(
    owner: &str,
    field: &SastField,
    field_name: &str,
    global: &NodeMap,
    report: &mut LinkReport,
) {
    if field.ty.is_record() && !field.is_resolved() {
        match lookup(global, &field.original_type_name) {
            Some(target) => {
                field.object_node.resolve(Arc::clone(target));
                report.resolved += 1;
            }
            None => {
                tracing::debug!(
                    owner,
                    field = field_name,
                    type_name = %field.original_type_name,
                    "unresolved field type"
                );
                report.unresolved.push(UnresolvedRef {
                    owner: owner.to_string(),
                    field: field_name.to_string(),
                    type_name: field.original_type_name.clone(),
                });
            }
        }
    }

    // Element descriptions are unnamed; report them under the owning field.
    for child in field.ty.children() {
        link_field(owner, child, field_name, global, report);
    }
}

/// Exact match first, then without a leading global-namespace qualifier.
fn lookup<'a>(global: &'a NodeMap, type_name: &str) -> Option<&'a Arc<SastNode>> {
    if type_name.is_empty() {
        return None;
    }
    global
        .get(type_name)
        .or_else(|| type_name.strip_prefix("::").and_then(|n| global.get(n)))
}
