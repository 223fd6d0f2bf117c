//! Outline snapshot
//!
//! A forest of identified items: ordered roots, each the head of a subtree.
//! Storage is flat (one entry per identifier, holding the item, its parent
//! link and its ordered child identifiers) with O(1) lookup by identifier.
//!
//! Author: Moroya Sakamoto

#[cfg(not(feature = "std"))]
use alloc::collections::BTreeMap as HashMap;
#[cfg(not(feature = "std"))]
use alloc::collections::BTreeSet as HashSet;
#[cfg(not(feature = "std"))]
use alloc::{string::String, vec, vec::Vec};
#[cfg(feature = "std")]
use std::collections::{HashMap, HashSet};

use core::fmt::Debug;
use core::hash::Hash;

use crate::error::SnapshotError;

/// Stable identifier of an item, unique within one snapshot.
///
/// `Ord` is required so that `no_std` builds can fall back to ordered maps.
pub trait Identifier: Clone + Eq + Hash + Ord + Debug {}

impl<T: Clone + Eq + Hash + Ord + Debug> Identifier for T {}

/// An item that can live in a [`Snapshot`].
pub trait Identifiable {
    type Id: Identifier;

    fn id(&self) -> Self::Id;
}

macro_rules! self_identified {
    ($($t:ty),* $(,)?) => {
        $(
            impl Identifiable for $t {
                type Id = $t;

                #[inline]
                fn id(&self) -> $t {
                    self.clone()
                }
            }
        )*
    };
}

self_identified!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, char, String);

impl<'a> Identifiable for &'a str {
    type Id = &'a str;

    #[inline]
    fn id(&self) -> &'a str {
        self
    }
}

/// Where an item sits: its parent (`None` for roots) and sibling index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position<Id> {
    pub parent: Option<Id>,
    pub index: usize,
}

impl<Id> Position<Id> {
    pub fn new(parent: Option<Id>, index: usize) -> Self {
        Self { parent, index }
    }

    /// Position in the root forest
    pub fn root(index: usize) -> Self {
        Self {
            parent: None,
            index,
        }
    }
}

/// One entry of a snapshot's flattening.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexedIdentifier<Id> {
    pub id: Id,
    pub parent: Option<Id>,
    /// Sibling indices from a root down to this item. Never empty.
    pub path: Vec<usize>,
}

impl<Id: Clone> IndexedIdentifier<Id> {
    /// Index among siblings
    pub fn index(&self) -> usize {
        self.path.last().copied().unwrap_or(0)
    }

    /// Depth below the root forest (roots are depth 0)
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn position(&self) -> Position<Id> {
        Position::new(self.parent.clone(), self.index())
    }
}

/// Depth-first pre-order flattening of a forest.
///
/// `children` returns the ordered child list of an identifier.
pub(crate) fn flatten_forest<'a, Id, F>(roots: &'a [Id], children: F) -> Vec<IndexedIdentifier<Id>>
where
    Id: Clone + 'a,
    F: Fn(&Id) -> &'a [Id],
{
    let mut out = Vec::new();
    let mut stack: Vec<(&'a Id, Option<&'a Id>, Vec<usize>)> = roots
        .iter()
        .enumerate()
        .rev()
        .map(|(i, id)| (id, None, vec![i]))
        .collect();

    while let Some((id, parent, path)) = stack.pop() {
        for (i, child) in children(id).iter().enumerate().rev() {
            let mut child_path = path.clone();
            child_path.push(i);
            stack.push((child, Some(id), child_path));
        }
        out.push(IndexedIdentifier {
            id: id.clone(),
            parent: parent.cloned(),
            path,
        });
    }
    out
}

#[derive(Debug, Clone)]
struct Entry<I: Identifiable> {
    item: I,
    parent: Option<I::Id>,
    children: Vec<I::Id>,
}

/// Outline snapshot
///
/// Items are stored flat, with O(1) lookup by identifier.
///
/// Structural mutators treat a duplicate identifier, an unknown parent or a
/// cyclic move as a programmer error and panic. Queries never panic: an
/// unknown identifier simply has no item, no parent and no children.
#[derive(Debug, Clone)]
pub struct Snapshot<I: Identifiable> {
    entries: HashMap<I::Id, Entry<I>>,
    roots: Vec<I::Id>,
}

impl<I: Identifiable> Default for Snapshot<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Identifiable> Snapshot<I> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            roots: Vec::new(),
        }
    }

    /// Build a snapshot from `(item, parent)` pairs.
    ///
    /// Pairs are appended in order, so every parent must precede its children.
    pub fn from_forest<T>(forest: T) -> Self
    where
        T: IntoIterator<Item = (I, Option<I::Id>)>,
    {
        let mut snapshot = Self::new();
        for (item, parent) in forest {
            snapshot.append_items([item], parent.as_ref());
        }
        snapshot
    }

    /// Total item count across the forest
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of direct children of `parent`, or of the root forest for `None`.
    pub fn number_of_items(&self, parent: Option<&I::Id>) -> usize {
        self.child_ids(parent).len()
    }

    /// Direct child identifiers in stored order
    pub fn child_ids(&self, parent: Option<&I::Id>) -> &[I::Id] {
        match parent {
            None => &self.roots,
            Some(id) => self
                .entries
                .get(id)
                .map(|e| e.children.as_slice())
                .unwrap_or(&[]),
        }
    }

    /// Direct children in stored order
    pub fn children(&self, parent: Option<&I::Id>) -> Vec<&I> {
        self.child_ids(parent)
            .iter()
            .filter_map(|id| self.item(id))
            .collect()
    }

    pub fn root_ids(&self) -> &[I::Id] {
        &self.roots
    }

    /// Look up an item in O(1). Absent identifiers return `None`.
    pub fn item(&self, id: &I::Id) -> Option<&I> {
        self.entries.get(id).map(|e| &e.item)
    }

    /// Parent of an item; `None` for roots and for unknown identifiers.
    pub fn parent(&self, id: &I::Id) -> Option<&I::Id> {
        self.entries.get(id).and_then(|e| e.parent.as_ref())
    }

    pub fn contains(&self, id: &I::Id) -> bool {
        self.entries.contains_key(id)
    }

    /// Index of an item among its siblings
    pub fn index_of(&self, id: &I::Id) -> Option<usize> {
        let entry = self.entries.get(id)?;
        self.child_ids(entry.parent.as_ref())
            .iter()
            .position(|c| c == id)
    }

    /// All identifiers in depth-first pre-order
    pub fn identifiers(&self) -> Vec<I::Id> {
        self.flattened().into_iter().map(|e| e.id).collect()
    }

    /// All items in depth-first pre-order
    pub fn items(&self) -> Vec<&I> {
        self.flattened()
            .iter()
            .filter_map(|e| self.item(&e.id))
            .collect()
    }

    /// Depth-first pre-order flattening with structural paths.
    ///
    /// Recomputed on every call; this is the diff engine's input.
    pub fn flattened(&self) -> Vec<IndexedIdentifier<I::Id>> {
        flatten_forest(&self.roots, |id| self.child_ids(Some(id)))
    }

    // ── Mutators ──────────────────────────────────────────────────────

    /// Append items as the last children of `parent` (or as last roots).
    pub fn append_items<T>(&mut self, items: T, parent: Option<&I::Id>)
    where
        T: IntoIterator<Item = I>,
    {
        let at = self.number_of_items(parent);
        self.insert_items(items, parent, at);
    }

    /// Insert items under `parent` starting at sibling `index`.
    pub fn insert_items<T>(&mut self, items: T, parent: Option<&I::Id>, index: usize)
    where
        T: IntoIterator<Item = I>,
    {
        self.assert_known_parent(parent);
        let len = self.number_of_items(parent);
        assert!(
            index <= len,
            "insert index {index} out of bounds under {parent:?} ({len} children)"
        );

        let mut ids = Vec::new();
        for item in items {
            let id = item.id();
            assert!(
                !self.entries.contains_key(&id) && !ids.contains(&id),
                "duplicate identifier {id:?}"
            );
            self.entries.insert(
                id.clone(),
                Entry {
                    item,
                    parent: parent.cloned(),
                    children: Vec::new(),
                },
            );
            ids.push(id);
        }

        let siblings = self.siblings_mut(parent);
        siblings.splice(index..index, ids);
    }

    /// Insert items as siblings directly before `before`.
    pub fn insert_items_before<T>(&mut self, items: T, before: &I::Id)
    where
        T: IntoIterator<Item = I>,
    {
        let (parent, index) = self.require_position(before);
        self.insert_items(items, parent.as_ref(), index);
    }

    /// Insert items as siblings directly after `after`.
    pub fn insert_items_after<T>(&mut self, items: T, after: &I::Id)
    where
        T: IntoIterator<Item = I>,
    {
        let (parent, index) = self.require_position(after);
        self.insert_items(items, parent.as_ref(), index + 1);
    }

    /// Remove an item and all its descendants. Unknown identifiers are ignored.
    pub fn remove_item(&mut self, id: &I::Id) {
        let Some(parent) = self.entries.get(id).map(|e| e.parent.clone()) else {
            return;
        };
        self.siblings_mut(parent.as_ref()).retain(|c| c != id);

        let mut to_remove = Vec::new();
        self.collect_subtree(id, &mut to_remove);
        for rid in &to_remove {
            self.entries.remove(rid);
        }
    }

    /// Remove several items (and their descendants).
    pub fn remove_items(&mut self, ids: &[I::Id]) {
        for id in ids {
            self.remove_item(id);
        }
    }

    pub fn remove_all_items(&mut self) {
        self.entries.clear();
        self.roots.clear();
    }

    /// Move an item (with its subtree) under `parent` at sibling `index`.
    ///
    /// `index` is interpreted after the item has been detached from its
    /// current position, so it also covers reordering within one parent.
    pub fn move_item(&mut self, id: &I::Id, parent: Option<&I::Id>, index: usize) {
        self.assert_movable(id, parent);
        self.detach(id);
        self.attach(id, parent, index);
    }

    /// Move an item so it becomes the sibling directly before `before`.
    pub fn move_item_before(&mut self, id: &I::Id, before: &I::Id) {
        if id == before {
            return;
        }
        self.assert_movable(id, self.parent(before));
        self.detach(id);
        let (parent, index) = self.require_position(before);
        self.attach(id, parent.as_ref(), index);
    }

    /// Move an item so it becomes the sibling directly after `after`.
    pub fn move_item_after(&mut self, id: &I::Id, after: &I::Id) {
        if id == after {
            return;
        }
        self.assert_movable(id, self.parent(after));
        self.detach(id);
        let (parent, index) = self.require_position(after);
        self.attach(id, parent.as_ref(), index + 1);
    }

    /// Replace every child of `parent` (subtrees included) with `items`.
    pub fn replace_children<T>(&mut self, items: T, parent: Option<&I::Id>)
    where
        T: IntoIterator<Item = I>,
    {
        self.assert_known_parent(parent);
        let old: Vec<I::Id> = self.child_ids(parent).to_vec();
        self.remove_items(&old);
        self.append_items(items, parent);
    }

    /// Re-check every structural invariant.
    ///
    /// Mutators maintain these on their own; this is for snapshots whose
    /// construction is not trusted and for tests.
    pub fn validate(&self) -> Result<(), SnapshotError<I::Id>> {
        let mut seen: HashSet<I::Id> = HashSet::new();
        let mut stack: Vec<(I::Id, Option<I::Id>)> =
            self.roots.iter().rev().map(|id| (id.clone(), None)).collect();

        while let Some((id, listed_under)) = stack.pop() {
            if !seen.insert(id.clone()) {
                return Err(SnapshotError::Duplicate(id));
            }
            let entry = self
                .entries
                .get(&id)
                .ok_or_else(|| SnapshotError::Dangling(id.clone()))?;
            if entry.parent != listed_under {
                return Err(SnapshotError::ParentMismatch {
                    id,
                    recorded: entry.parent.clone(),
                    actual: listed_under,
                });
            }
            for child in entry.children.iter().rev() {
                stack.push((child.clone(), Some(id.clone())));
            }
        }

        match self.entries.keys().find(|id| !seen.contains(*id)) {
            Some(orphan) => Err(SnapshotError::Unreachable(orphan.clone())),
            None => Ok(()),
        }
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn siblings_mut(&mut self, parent: Option<&I::Id>) -> &mut Vec<I::Id> {
        match parent {
            None => &mut self.roots,
            Some(id) => match self.entries.get_mut(id) {
                Some(entry) => &mut entry.children,
                None => panic!("unknown parent {id:?}"),
            },
        }
    }

    fn assert_known_parent(&self, parent: Option<&I::Id>) {
        if let Some(id) = parent {
            assert!(self.entries.contains_key(id), "unknown parent {id:?}");
        }
    }

    fn require_position(&self, id: &I::Id) -> (Option<I::Id>, usize) {
        match (self.entries.get(id), self.index_of(id)) {
            (Some(entry), Some(index)) => (entry.parent.clone(), index),
            _ => panic!("unknown sibling {id:?}"),
        }
    }

    fn assert_movable(&self, id: &I::Id, parent: Option<&I::Id>) {
        assert!(self.entries.contains_key(id), "cannot move unknown identifier {id:?}");
        self.assert_known_parent(parent);
        if let Some(target) = parent {
            assert!(
                !self.is_in_subtree(target, id),
                "cannot move {id:?} into its own subtree ({target:?})"
            );
        }
    }

    /// Unlink `id` from its sibling list; its entry and subtree stay stored.
    fn detach(&mut self, id: &I::Id) {
        let parent = self.entries.get(id).and_then(|e| e.parent.clone());
        self.siblings_mut(parent.as_ref()).retain(|c| c != id);
    }

    fn attach(&mut self, id: &I::Id, parent: Option<&I::Id>, index: usize) {
        let len = self.number_of_items(parent);
        assert!(
            index <= len,
            "move index {index} out of bounds under {parent:?} ({len} children)"
        );
        self.siblings_mut(parent).insert(index, id.clone());
        if let Some(entry) = self.entries.get_mut(id) {
            entry.parent = parent.cloned();
        }
    }

    /// True if `id` is `ancestor` or lies below it.
    fn is_in_subtree(&self, id: &I::Id, ancestor: &I::Id) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    fn collect_subtree(&self, id: &I::Id, result: &mut Vec<I::Id>) {
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            stack.extend(self.child_ids(Some(&current)).iter().cloned());
            result.push(current);
        }
    }
}
