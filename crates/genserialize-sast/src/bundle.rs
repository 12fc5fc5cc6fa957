//! Self-contained, serializable snapshot of one node and everything it links to.
//!
//! Links are not serialized with the nodes, so a node cannot be handed to
//! another binary on its own. A [`NodeBundle`] carries the node, every node
//! reachable through its links, and a table saying which reference points to
//! which bundled node. The far side restores exactly those links; nothing is
//! re-resolved by name, so two references spelled alike keep their own
//! targets and links set without a type name survive.

use crate::sast::{SastField, SastNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("bundle holds no nodes")]
    Empty,
    #[error("bundle link {from} -> {to} does not name a bundled reference")]
    InvalidLink { from: usize, to: usize },
}

/// Where a reference sits inside its node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkSite {
    /// `bases[index]`.
    Base { index: usize },
    /// `path[0]` indexes the node's fields, later entries index
    /// [`SastType::children`](crate::SastType::children) of the field before.
    Field { path: Vec<usize> },
}

/// One resolved reference, by node index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleLink {
    pub from: usize,
    pub site: LinkSite,
    pub to: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeBundle {
    /// The root first, then every linked node, each once.
    pub nodes: Vec<SastNode>,
    pub links: Vec<BundleLink>,
}

#[derive(Default)]
struct Capture<'a> {
    order: Vec<&'a SastNode>,
    /// Nodes are identified by address, not name.
    index: HashMap<*const SastNode, usize>,
    links: Vec<BundleLink>,
}

impl<'a> Capture<'a> {
    fn index_of(&mut self, node: &'a SastNode) -> usize {
        *self.index.entry(std::ptr::from_ref(node)).or_insert_with(|| {
            self.order.push(node);
            self.order.len() - 1
        })
    }

    fn visit_field(&mut self, from: usize, field: &'a SastField, path: &mut Vec<usize>) {
        if let Some(target) = field.object_node.get() {
            let to = self.index_of(target);
            self.links.push(BundleLink {
                from,
                site: LinkSite::Field { path: path.clone() },
                to,
            });
        }
        for (i, child) in field.ty.children().into_iter().enumerate() {
            path.push(i);
            self.visit_field(from, child, path);
            path.pop();
        }
    }
}

impl NodeBundle {
    /// Snapshot `node` and its transitive links.
    pub fn capture(node: &SastNode) -> Self {
        let mut capture = Capture::default();
        capture.index_of(node);

        let mut next = 0;
        while let Some(&current) = capture.order.get(next) {
            for (index, base) in current.bases.iter().enumerate() {
                if let Some(target) = base.node.get() {
                    let to = capture.index_of(target);
                    capture.links.push(BundleLink {
                        from: next,
                        site: LinkSite::Base { index },
                        to,
                    });
                }
            }
            let mut path = Vec::new();
            for (i, field) in current.fields.iter().enumerate() {
                path.push(i);
                capture.visit_field(next, field, &mut path);
                path.pop();
            }
            next += 1;
        }

        Self {
            nodes: capture.order.into_iter().cloned().collect(),
            links: capture.links,
        }
    }

    /// Rebuild the linked graph and return the root node.
    ///
    /// Links already carried over in memory are kept as they are.
    pub fn restore(self) -> Result<Arc<SastNode>, BundleError> {
        let nodes: Vec<Arc<SastNode>> = self.nodes.into_iter().map(Arc::new).collect();
        let root = nodes.first().cloned().ok_or(BundleError::Empty)?;

        for link in &self.links {
            let invalid = || BundleError::InvalidLink {
                from: link.from,
                to: link.to,
            };
            let target = nodes.get(link.to).ok_or_else(invalid)?;
            let holder = nodes.get(link.from).ok_or_else(invalid)?;
            let slot = match &link.site {
                LinkSite::Base { index } => holder.bases.get(*index).map(|base| &base.node),
                LinkSite::Field { path } => field_at(holder, path).map(|field| &field.object_node),
            }
            .ok_or_else(invalid)?;
            slot.resolve(Arc::clone(target));
        }

        Ok(root)
    }
}

fn field_at<'a>(node: &'a SastNode, path: &[usize]) -> Option<&'a SastField> {
    let (first, rest) = path.split_first()?;
    let mut field = node.fields.get(*first)?;
    for &i in rest {
        field = field.ty.children().get(i).copied()?;
    }
    Some(field)
}
