//! Provider-agnostic remote file hierarchy.
//!
//! A `HierarchyModel` is built from one whole-tree snapshot and replaced
//! atomically on every refresh; there is no incremental patching, so a stale
//! view is resolved by refetching, never by merging.

pub mod navigation;
pub mod providers;

pub use navigation::{Breadcrumb, NavigationState};
pub use providers::{AdapterRegistry, DriveAdapter, OneDriveAdapter, Provider, ProviderAdapter};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type NodeId = String;

/// Synthetic root id shared by every snapshot.
pub const ROOT_ID: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

/// One node of the normalized tree. Folders may carry a (possibly empty)
/// `children` list; files never do.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    /// Provider-issued direct download URL (OneDrive); fetching it bypasses
    /// the authenticated transport by design.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

impl FileNode {
    pub fn folder(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: NodeKind::Folder,
            mime_type: None,
            modified_at: None,
            parent_id: None,
            download_url: None,
            children: Some(Vec::new()),
        }
    }

    pub fn file(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: NodeKind::File,
            mime_type: None,
            modified_at: None,
            parent_id: None,
            download_url: None,
            children: None,
        }
    }

    pub fn with_child(mut self, child: FileNode) -> Self {
        self.children.get_or_insert_with(Vec::new).push(child);
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    fn child(&self, id: &str) -> Option<&FileNode> {
        self.children.as_ref()?.iter().find(|c| c.id == id)
    }
}

/// Navigable view over one snapshot, rooted at the synthetic root node.
#[derive(Debug, Clone)]
pub struct HierarchyModel {
    root: FileNode,
}

impl HierarchyModel {
    /// Replace the entire tree with a fresh snapshot.
    ///
    /// The snapshot is server-trusted but not server-verified: a file node
    /// carrying children violates the tree invariant and is repaired with a
    /// warning rather than rejected.
    pub fn load(mut root: FileNode) -> Self {
        sanitize(&mut root);
        Self { root }
    }

    pub fn empty() -> Self {
        Self {
            root: FileNode::folder(ROOT_ID, ""),
        }
    }

    pub fn root(&self) -> &FileNode {
        &self.root
    }

    /// Walk from the root following `children` lookups. Returns `None` on
    /// the first unresolvable segment so callers reset to root instead of
    /// crashing on a reshaped snapshot.
    pub fn resolve(&self, path: &[NodeId]) -> Option<&FileNode> {
        let mut current = &self.root;
        for segment in path {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Id-to-node index over the whole tree. Duplicate ids are logged and
    /// skipped, first occurrence wins.
    pub fn flatten(&self) -> HashMap<NodeId, &FileNode> {
        let mut index = HashMap::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if index.contains_key(&node.id) {
                tracing::warn!(node_id = %node.id, "Duplicate node id in snapshot, skipping subtree");
                continue;
            }
            index.insert(node.id.clone(), node);
            if let Some(children) = &node.children {
                stack.extend(children.iter());
            }
        }
        index
    }

    /// Case-insensitive substring match over node names, in pre-order.
    /// Deterministic for an unchanged tree.
    pub fn search(&self, term: &str) -> Vec<&FileNode> {
        let needle = term.to_lowercase();
        let mut matches = Vec::new();
        preorder(&self.root, &mut |node| {
            if node.name.to_lowercase().contains(&needle) {
                matches.push(node);
            }
        });
        matches
    }
}

fn preorder<'a>(node: &'a FileNode, visit: &mut impl FnMut(&'a FileNode)) {
    visit(node);
    if let Some(children) = &node.children {
        for child in children {
            preorder(child, visit);
        }
    }
}

fn sanitize(node: &mut FileNode) {
    if node.kind == NodeKind::File && node.children.is_some() {
        tracing::warn!(node_id = %node.id, "File node carried children, dropping them");
        node.children = None;
    }
    if let Some(children) = &mut node.children {
        for child in children {
            sanitize(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HierarchyModel {
        let root = FileNode::folder(ROOT_ID, "My Drive").with_child(
            FileNode::folder("f1", "F1").with_child(FileNode::file("a1", "a.txt")),
        );
        HierarchyModel::load(root)
    }

    #[test]
    fn resolve_follows_prefix_paths() {
        let model = sample();

        let f1 = model.resolve(&["f1".into()]).unwrap();
        assert_eq!(f1.name, "F1");
        assert_eq!(f1.children.as_ref().unwrap().len(), 1);

        let a1 = model.resolve(&["f1".into(), "a1".into()]).unwrap();
        assert_eq!(a1.name, "a.txt");
    }

    #[test]
    fn resolve_short_circuits_on_missing_segment() {
        let model = sample();
        assert!(model.resolve(&["f1".into(), "bad".into()]).is_none());
        assert!(model.resolve(&["gone".into()]).is_none());
    }

    #[test]
    fn empty_path_resolves_to_root() {
        let model = sample();
        assert_eq!(model.resolve(&[]).unwrap().id, ROOT_ID);
    }

    #[test]
    fn search_is_case_insensitive_and_idempotent() {
        let model = sample();

        let first: Vec<&str> = model.search("A.TXT").iter().map(|n| n.id.as_str()).collect();
        assert_eq!(first, vec!["a1"]);

        let second: Vec<&str> = model.search("A.TXT").iter().map(|n| n.id.as_str()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn flatten_skips_duplicate_ids() {
        let root = FileNode::folder(ROOT_ID, "root")
            .with_child(FileNode::file("dup", "first.txt"))
            .with_child(FileNode::file("dup", "second.txt"));
        let model = HierarchyModel::load(root);

        let index = model.flatten();
        assert_eq!(index.len(), 2);
        assert!(index.contains_key("dup"));
    }

    #[test]
    fn load_strips_children_from_file_nodes() {
        let mut bad_file = FileNode::file("x", "x.bin");
        bad_file.children = Some(vec![FileNode::file("y", "y.bin")]);
        let model = HierarchyModel::load(FileNode::folder(ROOT_ID, "root").with_child(bad_file));

        assert!(model.resolve(&["x".into()]).unwrap().children.is_none());
    }
}
