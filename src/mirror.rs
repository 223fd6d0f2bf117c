//! Structural mirror
//!
//! Identifier-only copy of an outline that applies edit scripts one edit at
//! a time, the way a consumer's own item storage would. Every edit is
//! checked against the mirror's state, so a script computed against the
//! wrong version is reported instead of silently corrupting the tree.
//!
//! Author: Moroya Sakamoto

#[cfg(not(feature = "std"))]
use alloc::collections::BTreeMap as HashMap;
#[cfg(not(feature = "std"))]
use alloc::collections::BTreeSet as HashSet;
#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};
#[cfg(feature = "std")]
use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::diff::EditOp;
use crate::error::MirrorError;
use crate::snapshot::{flatten_forest, Identifiable, Identifier, IndexedIdentifier, Position, Snapshot};

/// Anything that can take an edit script and apply it to its own storage.
pub trait EditTarget<Id> {
    type Error;

    /// Apply a whole script, in order.
    fn apply_edits(&mut self, edits: &[EditOp<Id>]) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone)]
struct Node<Id> {
    parent: Option<Id>,
    children: Vec<Id>,
}

/// Identifier tree mirroring a snapshot's structure.
#[derive(Debug, Clone)]
pub struct OutlineMirror<Id: Identifier> {
    nodes: HashMap<Id, Node<Id>>,
    roots: Vec<Id>,
    /// Subtrees taken out by a move source and not yet reattached
    detached: HashSet<Id>,
}

impl<Id: Identifier> Default for OutlineMirror<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Identifier> OutlineMirror<Id> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            detached: HashSet::new(),
        }
    }

    /// Mirror the structure of `snapshot`.
    pub fn from_snapshot<I>(snapshot: &Snapshot<I>) -> Self
    where
        I: Identifiable<Id = Id>,
    {
        let mut mirror = Self::new();
        for entry in snapshot.flattened() {
            let node = Node {
                parent: entry.parent.clone(),
                children: snapshot.child_ids(Some(&entry.id)).to_vec(),
            };
            mirror.nodes.insert(entry.id, node);
        }
        mirror.roots = snapshot.root_ids().to_vec();
        mirror
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn child_ids(&self, parent: Option<&Id>) -> &[Id] {
        match parent {
            None => &self.roots,
            Some(id) => self
                .nodes
                .get(id)
                .map(|n| n.children.as_slice())
                .unwrap_or(&[]),
        }
    }

    pub fn parent(&self, id: &Id) -> Option<&Id> {
        self.nodes.get(id).and_then(|n| n.parent.as_ref())
    }

    /// Same flattening a snapshot with this structure would produce.
    pub fn flattened(&self) -> Vec<IndexedIdentifier<Id>> {
        flatten_forest(&self.roots, |id| self.child_ids(Some(id)))
    }

    /// Apply a script in order, stopping at the first edit that does not fit.
    ///
    /// On error the mirror is left partially updated; rebuild it from the
    /// snapshot it should reflect.
    pub fn apply(&mut self, edits: &[EditOp<Id>]) -> Result<(), MirrorError<Id>> {
        for edit in edits {
            self.apply_edit(edit)?;
        }
        if !self.detached.is_empty() {
            return Err(MirrorError::DanglingMoves(self.detached.len()));
        }
        Ok(())
    }

    /// Apply a single edit.
    pub fn apply_edit(&mut self, edit: &EditOp<Id>) -> Result<(), MirrorError<Id>> {
        trace!(?edit, "mirror edit");
        match edit {
            EditOp::Remove { id, from, moved_to } => {
                self.unlink(id, from)?;
                if moved_to.is_some() {
                    self.detached.insert(id.clone());
                } else {
                    self.drop_subtree(id);
                }
            }
            EditOp::Insert { id, to, moved_from } => {
                if moved_from.is_some() {
                    if !self.detached.remove(id) {
                        return Err(MirrorError::NotDetached(id.clone()));
                    }
                } else {
                    if self.nodes.contains_key(id) {
                        return Err(MirrorError::AlreadyPresent(id.clone()));
                    }
                    self.nodes.insert(
                        id.clone(),
                        Node {
                            parent: None,
                            children: Vec::new(),
                        },
                    );
                }
                self.link(id, to)?;
            }
        }
        Ok(())
    }

    fn siblings_mut(&mut self, parent: Option<&Id>) -> Result<&mut Vec<Id>, MirrorError<Id>> {
        match parent {
            None => Ok(&mut self.roots),
            Some(pid) => self
                .nodes
                .get_mut(pid)
                .map(|n| &mut n.children)
                .ok_or_else(|| MirrorError::UnknownParent(pid.clone())),
        }
    }

    fn unlink(&mut self, id: &Id, from: &Position<Id>) -> Result<(), MirrorError<Id>> {
        let siblings = self.siblings_mut(from.parent.as_ref())?;
        if siblings.get(from.index) == Some(id) {
            siblings.remove(from.index);
            return Ok(());
        }
        Err(MirrorError::Mismatch {
            expected: id.clone(),
            parent: from.parent.clone(),
            index: from.index,
            found: siblings.get(from.index).cloned(),
        })
    }

    fn link(&mut self, id: &Id, to: &Position<Id>) -> Result<(), MirrorError<Id>> {
        let siblings = self.siblings_mut(to.parent.as_ref())?;
        if to.index > siblings.len() {
            return Err(MirrorError::IndexOutOfBounds {
                parent: to.parent.clone(),
                index: to.index,
                len: siblings.len(),
            });
        }
        siblings.insert(to.index, id.clone());
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = to.parent.clone();
        }
        Ok(())
    }

    fn drop_subtree(&mut self, id: &Id) {
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }
    }
}

impl<Id: Identifier> EditTarget<Id> for OutlineMirror<Id> {
    type Error = MirrorError<Id>;

    fn apply_edits(&mut self, edits: &[EditOp<Id>]) -> Result<(), Self::Error> {
        self.apply(edits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute_edits;

    fn sample() -> Snapshot<&'static str> {
        let mut s = Snapshot::new();
        s.append_items(["A", "B"], None);
        s.append_items(["A1", "A2"], Some(&"A"));
        s
    }

    #[test]
    fn test_from_snapshot_matches_structure() {
        let s = sample();
        let m = OutlineMirror::from_snapshot(&s);
        assert_eq!(m.len(), 4);
        assert_eq!(m.flattened(), s.flattened());
        assert_eq!(m.parent(&"A2"), Some(&"A"));
        assert_eq!(m.child_ids(None), &["A", "B"]);
    }

    #[test]
    fn test_pure_insert_creates_leaf() {
        let mut m = OutlineMirror::from_snapshot(&sample());
        m.apply(&[EditOp::Insert {
            id: "N",
            to: Position::new(Some("B"), 0),
            moved_from: None,
        }])
        .expect("insert applies");
        assert_eq!(m.child_ids(Some(&"B")), &["N"]);
        assert_eq!(m.parent(&"N"), Some(&"B"));
    }

    #[test]
    fn test_pure_remove_drops_subtree() {
        let mut m = OutlineMirror::from_snapshot(&sample());
        m.apply(&[EditOp::Remove {
            id: "A",
            from: Position::root(0),
            moved_to: None,
        }])
        .expect("remove applies");
        assert_eq!(m.len(), 1);
        assert!(!m.contains(&"A1"));
    }

    #[test]
    fn test_move_keeps_subtree() {
        let mut m = OutlineMirror::from_snapshot(&sample());
        m.apply(&[
            EditOp::Remove {
                id: "A",
                from: Position::root(0),
                moved_to: Some(Position::new(Some("B"), 0)),
            },
            EditOp::Insert {
                id: "A",
                to: Position::new(Some("B"), 0),
                moved_from: Some(Position::root(0)),
            },
        ])
        .expect("move applies");
        assert_eq!(m.child_ids(None), &["B"]);
        assert_eq!(m.child_ids(Some(&"A")), &["A1", "A2"]);
        assert_eq!(m.parent(&"A"), Some(&"B"));
    }

    #[test]
    fn test_stale_remove_is_mismatch() {
        let mut m = OutlineMirror::from_snapshot(&sample());
        let err = m
            .apply(&[EditOp::Remove {
                id: "B",
                from: Position::root(0),
                moved_to: None,
            }])
            .unwrap_err();
        assert_eq!(
            err,
            MirrorError::Mismatch {
                expected: "B",
                parent: None,
                index: 0,
                found: Some("A"),
            }
        );
    }

    #[test]
    fn test_insert_out_of_bounds() {
        let mut m = OutlineMirror::from_snapshot(&sample());
        let err = m
            .apply(&[EditOp::Insert {
                id: "N",
                to: Position::root(5),
                moved_from: None,
            }])
            .unwrap_err();
        assert!(matches!(err, MirrorError::IndexOutOfBounds { len: 2, .. }));
    }

    #[test]
    fn test_insert_existing_is_rejected() {
        let mut m = OutlineMirror::from_snapshot(&sample());
        let err = m
            .apply(&[EditOp::Insert {
                id: "B",
                to: Position::root(0),
                moved_from: None,
            }])
            .unwrap_err();
        assert_eq!(err, MirrorError::AlreadyPresent("B"));
    }

    #[test]
    fn test_unknown_parent() {
        let mut m = OutlineMirror::from_snapshot(&sample());
        let err = m
            .apply(&[EditOp::Insert {
                id: "N",
                to: Position::new(Some("ghost"), 0),
                moved_from: None,
            }])
            .unwrap_err();
        assert_eq!(err, MirrorError::UnknownParent("ghost"));
    }

    #[test]
    fn test_half_a_move_is_reported() {
        let mut m = OutlineMirror::from_snapshot(&sample());
        let err = m
            .apply(&[EditOp::Remove {
                id: "B",
                from: Position::root(1),
                moved_to: Some(Position::root(0)),
            }])
            .unwrap_err();
        assert_eq!(err, MirrorError::DanglingMoves(1));

        let mut m = OutlineMirror::from_snapshot(&sample());
        let err = m
            .apply(&[EditOp::Insert {
                id: "B",
                to: Position::root(0),
                moved_from: Some(Position::root(1)),
            }])
            .unwrap_err();
        assert_eq!(err, MirrorError::NotDetached("B"));
    }

    #[test]
    fn test_script_against_wrong_version_fails() {
        let old = sample();
        let mut new = old.clone();
        new.remove_item(&"A1");
        let ops = compute_edits(&old, &new);

        // mirror already at `new`: the removal no longer lines up
        let mut m = OutlineMirror::from_snapshot(&new);
        assert!(m.apply(&ops).is_err());
    }

    #[test]
    fn test_edit_target_impl() {
        let old = sample();
        let mut new = old.clone();
        new.move_item(&"A2", None, 0);
        let mut m = OutlineMirror::from_snapshot(&old);
        EditTarget::apply_edits(&mut m, &compute_edits(&old, &new)).expect("applies");
        assert_eq!(m.flattened(), new.flattened());
    }
}
