//! Selection tracking over hierarchy nodes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::hierarchy::{NodeId, Provider};

/// Composite key: the two providers' native id spaces may collide, so a node
/// is identified by provider plus id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionKey {
    pub provider: Provider,
    pub id: NodeId,
}

impl SelectionKey {
    pub fn new(provider: Provider, id: impl Into<NodeId>) -> Self {
        Self {
            provider,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Toggling a new key replaces the whole set.
    Single,
    /// Toggling adds or removes; cross-folder multi-select is supported.
    Multiple,
}

/// Marked nodes for the current navigation session. Cleared when the
/// navigation root (the class) changes, preserved across folder navigation.
#[derive(Debug, Clone)]
pub struct SelectionSet {
    mode: SelectionMode,
    selected: HashSet<SelectionKey>,
}

impl SelectionSet {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            selected: HashSet::new(),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Toggling an already-selected key always removes it, regardless of
    /// mode.
    pub fn toggle(&mut self, key: SelectionKey) {
        if self.selected.contains(&key) {
            self.selected.remove(&key);
            return;
        }
        if self.mode == SelectionMode::Single {
            self.selected.clear();
        }
        self.selected.insert(key);
    }

    pub fn is_selected(&self, key: &SelectionKey) -> bool {
        self.selected.contains(key)
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectionKey> {
        self.selected.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> SelectionKey {
        SelectionKey::new(Provider::Drive, id)
    }

    #[test]
    fn single_mode_replaces_previous_selection() {
        let mut set = SelectionSet::new(SelectionMode::Single);
        set.toggle(key("a"));
        set.toggle(key("b"));

        assert!(!set.is_selected(&key("a")));
        assert!(set.is_selected(&key("b")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn multiple_mode_accumulates() {
        let mut set = SelectionSet::new(SelectionMode::Multiple);
        set.toggle(key("a"));
        set.toggle(key("b"));

        assert!(set.is_selected(&key("a")));
        assert!(set.is_selected(&key("b")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn toggling_selected_key_removes_in_any_mode() {
        for mode in [SelectionMode::Single, SelectionMode::Multiple] {
            let mut set = SelectionSet::new(mode);
            set.toggle(key("a"));
            set.toggle(key("a"));
            assert!(set.is_empty());
        }
    }

    #[test]
    fn same_id_across_providers_does_not_collide() {
        let mut set = SelectionSet::new(SelectionMode::Multiple);
        set.toggle(SelectionKey::new(Provider::Drive, "x"));
        set.toggle(SelectionKey::new(Provider::OneDrive, "x"));
        assert_eq!(set.len(), 2);
    }
}
