//! Folder navigation over one hierarchy snapshot.

use serde::{Deserialize, Serialize};

use crate::hierarchy::{FileNode, HierarchyModel, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub id: NodeId,
    pub name: String,
}

/// Current position in the tree.
///
/// Invariant: `breadcrumbs[0]` is always the synthetic root and
/// `path.len() == breadcrumbs.len() - 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    path: Vec<NodeId>,
    breadcrumbs: Vec<Breadcrumb>,
}

impl NavigationState {
    pub fn at_root(model: &HierarchyModel) -> Self {
        Self {
            path: Vec::new(),
            breadcrumbs: vec![Breadcrumb {
                id: model.root().id.clone(),
                name: model.root().name.clone(),
            }],
        }
    }

    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    pub fn breadcrumbs(&self) -> &[Breadcrumb] {
        &self.breadcrumbs
    }

    pub fn is_at_root(&self) -> bool {
        self.path.is_empty()
    }

    /// The folder the state currently points at, `None` when the snapshot no
    /// longer contains the path.
    pub fn current<'a>(&self, model: &'a HierarchyModel) -> Option<&'a FileNode> {
        model.resolve(&self.path)
    }

    /// Descend into a child folder of the current node. Fails quietly when
    /// the id does not resolve to a child folder in this snapshot.
    pub fn enter(&mut self, model: &HierarchyModel, folder_id: &str) -> bool {
        let Some(current) = self.current(model) else {
            return false;
        };
        let Some(child) = current
            .children
            .as_ref()
            .and_then(|c| c.iter().find(|n| n.id == folder_id))
        else {
            return false;
        };
        if !child.is_folder() {
            return false;
        }

        self.path.push(child.id.clone());
        self.breadcrumbs.push(Breadcrumb {
            id: child.id.clone(),
            name: child.name.clone(),
        });
        true
    }

    /// Go up one level; no-op at root.
    pub fn up(&mut self) {
        if self.path.pop().is_some() {
            self.breadcrumbs.pop();
        }
    }

    /// Jump to the position of a breadcrumb (truncates everything after it).
    pub fn jump_to_crumb(&mut self, index: usize) {
        if index < self.breadcrumbs.len() {
            self.breadcrumbs.truncate(index + 1);
            self.path.truncate(index);
        }
    }

    /// Re-validate the path against a freshly loaded snapshot. When any
    /// segment no longer resolves (folder deleted or renamed upstream), the
    /// state resets to root and `true` is returned.
    pub fn rebase(&mut self, model: &HierarchyModel) -> bool {
        if model.resolve(&self.path).is_some() {
            // Names may have changed even when ids still resolve.
            self.refresh_crumb_names(model);
            return false;
        }
        tracing::debug!(
            depth = self.path.len(),
            "Navigation path no longer resolves, resetting to root"
        );
        *self = Self::at_root(model);
        true
    }

    fn refresh_crumb_names(&mut self, model: &HierarchyModel) {
        self.breadcrumbs[0].name = model.root().name.clone();
        for depth in 0..self.path.len() {
            if let Some(node) = model.resolve(&self.path[..=depth]) {
                self.breadcrumbs[depth + 1].name = node.name.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{FileNode, ROOT_ID};

    fn model() -> HierarchyModel {
        HierarchyModel::load(
            FileNode::folder(ROOT_ID, "My Drive").with_child(
                FileNode::folder("f1", "F1")
                    .with_child(FileNode::folder("f2", "F2"))
                    .with_child(FileNode::file("a1", "a.txt")),
            ),
        )
    }

    #[test]
    fn breadcrumbs_track_path_depth() {
        let model = model();
        let mut nav = NavigationState::at_root(&model);
        assert_eq!(nav.breadcrumbs().len(), nav.path().len() + 1);

        assert!(nav.enter(&model, "f1"));
        assert!(nav.enter(&model, "f2"));
        assert_eq!(nav.path(), ["f1", "f2"]);
        assert_eq!(nav.breadcrumbs().len(), 3);
        assert_eq!(nav.breadcrumbs()[0].id, ROOT_ID);
    }

    #[test]
    fn entering_a_file_is_rejected() {
        let model = model();
        let mut nav = NavigationState::at_root(&model);
        nav.enter(&model, "f1");
        assert!(!nav.enter(&model, "a1"));
        assert_eq!(nav.path(), ["f1"]);
    }

    #[test]
    fn up_stops_at_root() {
        let model = model();
        let mut nav = NavigationState::at_root(&model);
        nav.enter(&model, "f1");
        nav.up();
        nav.up();
        assert!(nav.is_at_root());
        assert_eq!(nav.breadcrumbs().len(), 1);
    }

    #[test]
    fn rebase_resets_when_folder_disappears() {
        let model = model();
        let mut nav = NavigationState::at_root(&model);
        nav.enter(&model, "f1");
        nav.enter(&model, "f2");

        // New snapshot without f2.
        let reloaded = HierarchyModel::load(
            FileNode::folder(ROOT_ID, "My Drive").with_child(FileNode::folder("f1", "F1")),
        );

        assert!(nav.rebase(&reloaded));
        assert!(nav.is_at_root());
    }

    #[test]
    fn rebase_keeps_valid_path_and_updates_names() {
        let model = model();
        let mut nav = NavigationState::at_root(&model);
        nav.enter(&model, "f1");

        let reloaded = HierarchyModel::load(
            FileNode::folder(ROOT_ID, "My Drive").with_child(FileNode::folder("f1", "Renamed")),
        );

        assert!(!nav.rebase(&reloaded));
        assert_eq!(nav.path(), ["f1"]);
        assert_eq!(nav.breadcrumbs()[1].name, "Renamed");
    }

    #[test]
    fn jump_to_crumb_truncates() {
        let model = model();
        let mut nav = NavigationState::at_root(&model);
        nav.enter(&model, "f1");
        nav.enter(&model, "f2");

        nav.jump_to_crumb(1);
        assert_eq!(nav.path(), ["f1"]);

        nav.jump_to_crumb(0);
        assert!(nav.is_at_root());
    }
}
