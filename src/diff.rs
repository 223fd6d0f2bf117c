//! Outline diff engine
//!
//! Computes the edit script turning one snapshot into another.
//! Both snapshots are flattened (depth-first pre-order), the longest common
//! subsequence of identifiers is kept in place, and everything else becomes
//! an insertion or a removal. An identifier that is both removed and inserted
//! is a move; both halves carry each other's position.
//!
//! Author: Moroya Sakamoto

#[cfg(not(feature = "std"))]
use alloc::collections::BTreeMap as HashMap;
#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};
#[cfg(feature = "std")]
use std::collections::HashMap;

use core::cmp::max;

use tracing::{debug, trace};

use crate::snapshot::{Identifiable, Identifier, IndexedIdentifier, Position, Snapshot};

/// One structural edit.
///
/// Scripts list every `Remove` (in reverse old pre-order) before every
/// `Insert` (in new pre-order), so each edit can be applied sequentially:
/// `from` positions resolve against the old structure, `to` positions
/// against the structure being built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EditOp<Id> {
    /// Take an item out of `from`.
    ///
    /// A pure removal drops the whole subtree. With `moved_to` set the
    /// subtree is only detached; the matching `Insert` puts it back.
    Remove {
        id: Id,
        from: Position<Id>,
        moved_to: Option<Position<Id>>,
    },
    /// Put an item at `to`.
    ///
    /// A pure insertion creates a childless item (new children follow as
    /// their own inserts). With `moved_from` set the detached subtree is
    /// reattached.
    Insert {
        id: Id,
        to: Position<Id>,
        moved_from: Option<Position<Id>>,
    },
}

impl<Id> EditOp<Id> {
    pub fn id(&self) -> &Id {
        match self {
            EditOp::Remove { id, .. } | EditOp::Insert { id, .. } => id,
        }
    }

    /// True if this is one half of a move
    pub fn is_move(&self) -> bool {
        matches!(
            self,
            EditOp::Remove { moved_to: Some(_), .. } | EditOp::Insert { moved_from: Some(_), .. }
        )
    }

    /// Position this edit acts on: `from` for removals, `to` for inserts
    pub fn position(&self) -> &Position<Id> {
        match self {
            EditOp::Remove { from, .. } => from,
            EditOp::Insert { to, .. } => to,
        }
    }
}

/// An edit with both halves of a move folded together.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Change<Id> {
    Insert {
        id: Id,
        at: Position<Id>,
    },
    Remove {
        id: Id,
        at: Position<Id>,
    },
    Move {
        id: Id,
        from: Position<Id>,
        to: Position<Id>,
    },
}

impl<Id> Change<Id> {
    pub fn id(&self) -> &Id {
        match self {
            Change::Insert { id, .. } | Change::Remove { id, .. } | Change::Move { id, .. } => id,
        }
    }
}

/// Compute the edit script transforming `old` into `new`.
///
/// Identical snapshots yield an empty script. Identifiers must be unique in
/// each snapshot; this is assumed, not checked.
pub fn compute_edits<I: Identifiable>(old: &Snapshot<I>, new: &Snapshot<I>) -> Vec<EditOp<I::Id>> {
    diff_flattened(&old.flattened(), &new.flattened())
}

/// Same as [`compute_edits`], over two precomputed flattenings.
pub fn diff_flattened<Id: Identifier>(
    old: &[IndexedIdentifier<Id>],
    new: &[IndexedIdentifier<Id>],
) -> Vec<EditOp<Id>> {
    let common = common_subsequence(old, new);

    // An LCS pair only stays in place when its parent is unchanged;
    // otherwise it was reparented and becomes a move.
    let mut kept_old = vec![false; old.len()];
    let mut kept_new = vec![false; new.len()];
    for &(oi, ni) in &common {
        if old[oi].parent == new[ni].parent {
            kept_old[oi] = true;
            kept_new[ni] = true;
        }
    }
    settle_displaced(old, new, &mut kept_old, &mut kept_new);

    let displaced_old: HashMap<&Id, Position<Id>> = old
        .iter()
        .enumerate()
        .filter(|(oi, _)| !kept_old[*oi])
        .map(|(_, e)| (&e.id, e.position()))
        .collect();
    let displaced_new: HashMap<&Id, Position<Id>> = new
        .iter()
        .enumerate()
        .filter(|(ni, _)| !kept_new[*ni])
        .map(|(_, e)| (&e.id, e.position()))
        .collect();

    let mut ops = Vec::with_capacity(displaced_old.len() + displaced_new.len());

    // Removals in reverse pre-order: every untouched sibling before `from`
    // still has its old index.
    for (oi, entry) in old.iter().enumerate().rev() {
        if kept_old[oi] {
            continue;
        }
        ops.push(EditOp::Remove {
            id: entry.id.clone(),
            from: entry.position(),
            moved_to: displaced_new.get(&entry.id).cloned(),
        });
    }

    // Insertions in pre-order: parents and earlier siblings are in place first.
    for (ni, entry) in new.iter().enumerate() {
        if kept_new[ni] {
            continue;
        }
        ops.push(EditOp::Insert {
            id: entry.id.clone(),
            to: entry.position(),
            moved_from: displaced_old.get(&entry.id).cloned(),
        });
    }

    debug!(
        old = old.len(),
        new = new.len(),
        common = common.len(),
        edits = ops.len(),
        "computed outline edit script"
    );
    ops
}

/// Fold each move's two halves into a single [`Change::Move`].
///
/// Moves are reported at their destination, in insertion order.
pub fn collapse_moves<Id: Clone>(ops: &[EditOp<Id>]) -> Vec<Change<Id>> {
    ops.iter()
        .filter_map(|op| match op {
            EditOp::Remove {
                moved_to: Some(_), ..
            } => None,
            EditOp::Remove {
                id,
                from,
                moved_to: None,
            } => Some(Change::Remove {
                id: id.clone(),
                at: from.clone(),
            }),
            EditOp::Insert {
                id,
                to,
                moved_from: Some(from),
            } => Some(Change::Move {
                id: id.clone(),
                from: from.clone(),
                to: to.clone(),
            }),
            EditOp::Insert {
                id,
                to,
                moved_from: None,
            } => Some(Change::Insert {
                id: id.clone(),
                at: to.clone(),
            }),
        })
        .collect()
}

/// Keep survivors the LCS displaced although their parent did not change.
///
/// The flattened LCS can lose an item whose position is untouched, e.g. a
/// sibling that a moved subtree jumped over. Such an item stays in place
/// when its order relative to the already-kept siblings is the same in both
/// snapshots; kept siblings must always agree on order, or the script would
/// not apply sequentially.
fn settle_displaced<Id: Identifier>(
    old: &[IndexedIdentifier<Id>],
    new: &[IndexedIdentifier<Id>],
    kept_old: &mut [bool],
    kept_new: &mut [bool],
) {
    let new_index: HashMap<&Id, usize> = new.iter().enumerate().map(|(ni, e)| (&e.id, ni)).collect();

    // (old sibling index, new sibling index) of every kept child, per parent
    let mut kept_siblings: HashMap<Option<&Id>, Vec<(usize, usize)>> = HashMap::new();
    for (oi, entry) in old.iter().enumerate() {
        if !kept_old[oi] {
            continue;
        }
        if let Some(&ni) = new_index.get(&entry.id) {
            kept_siblings
                .entry(entry.parent.as_ref())
                .or_default()
                .push((entry.index(), new[ni].index()));
        }
    }

    let mut settled = 0usize;
    for (oi, entry) in old.iter().enumerate() {
        if kept_old[oi] {
            continue;
        }
        let Some(&ni) = new_index.get(&entry.id) else {
            continue;
        };
        if new[ni].parent != entry.parent {
            continue;
        }
        let (xo, xn) = (entry.index(), new[ni].index());
        let siblings = kept_siblings.entry(entry.parent.as_ref()).or_default();
        if siblings.iter().all(|&(o, n)| (o < xo) == (n < xn)) {
            siblings.push((xo, xn));
            kept_old[oi] = true;
            kept_new[ni] = true;
            settled += 1;
        }
    }
    if settled > 0 {
        trace!(settled, "kept survivors displaced by the flattened lcs");
    }
}

/// Index pairs `(old, new)` of a longest common subsequence of identifiers,
/// in increasing order.
///
/// The shared prefix and suffix are matched directly; the O(n·m) table only
/// covers what lies between them.
fn common_subsequence<Id: PartialEq>(
    old: &[IndexedIdentifier<Id>],
    new: &[IndexedIdentifier<Id>],
) -> Vec<(usize, usize)> {
    let prefix = old
        .iter()
        .zip(new)
        .take_while(|(a, b)| a.id == b.id)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a.id == b.id)
        .count();

    let a = &old[prefix..old.len() - suffix];
    let b = &new[prefix..new.len() - suffix];
    let (n, m) = (a.len(), b.len());
    trace!(prefix, suffix, rows = n, cols = m, "lcs table");

    // table[i * width + j] = LCS length of a[i..] and b[j..]
    let width = m + 1;
    let mut table = vec![0usize; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a[i].id == b[j].id {
                table[(i + 1) * width + j + 1] + 1
            } else {
                max(table[(i + 1) * width + j], table[i * width + j + 1])
            };
        }
    }

    let mut pairs: Vec<(usize, usize)> = (0..prefix).map(|k| (k, k)).collect();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i].id == b[j].id {
            pairs.push((prefix + i, prefix + j));
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }

    let (old_tail, new_tail) = (old.len() - suffix, new.len() - suffix);
    pairs.extend((0..suffix).map(|k| (old_tail + k, new_tail + k)));
    pairs
}
