//! Error types for the consumer-facing seams
//!
//! The diff engine itself has no recoverable errors: malformed snapshots are
//! precondition violations and panic. Errors only appear where a script meets
//! state the engine does not own.
//!
//! Author: Moroya Sakamoto

use thiserror::Error;

/// Structural invariant violated inside a [`Snapshot`](crate::Snapshot).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError<Id> {
    /// Identifier listed under more than one parent (or twice in one list).
    #[error("identifier {0:?} appears more than once")]
    Duplicate(Id),
    /// Child list references an identifier with no stored item.
    #[error("identifier {0:?} is referenced but has no item")]
    Dangling(Id),
    /// Stored parent link disagrees with the child list holding the item.
    #[error("parent link of {id:?} is {recorded:?}, but it is listed under {actual:?}")]
    ParentMismatch {
        id: Id,
        recorded: Option<Id>,
        actual: Option<Id>,
    },
    /// Item stored but not reachable from any root.
    #[error("identifier {0:?} is not reachable from any root")]
    Unreachable(Id),
}

/// An edit that does not match the state of an [`OutlineMirror`](crate::OutlineMirror).
///
/// Seeing one of these means the script was computed against a different
/// version than the one the mirror holds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirrorError<Id> {
    #[error("expected {expected:?} at index {index} under {parent:?}, found {found:?}")]
    Mismatch {
        expected: Id,
        parent: Option<Id>,
        index: usize,
        found: Option<Id>,
    },
    #[error("unknown parent {0:?}")]
    UnknownParent(Id),
    #[error("index {index} out of bounds under {parent:?} ({len} children)")]
    IndexOutOfBounds {
        parent: Option<Id>,
        index: usize,
        len: usize,
    },
    #[error("{0:?} is already present")]
    AlreadyPresent(Id),
    #[error("{0:?} is reattached but was never detached")]
    NotDetached(Id),
    #[error("{0} detached subtree(s) were never reattached")]
    DanglingMoves(usize),
}

/// Failure to get a snapshot applied through the apply queue.
#[derive(Debug, Error)]
pub enum QueueError<E> {
    /// The apply loop has been dropped; the submission was not applied.
    #[error("apply loop has shut down")]
    Closed,
    /// The edit target rejected the script; the live snapshot is unchanged.
    #[error("edit target rejected the script: {0}")]
    Target(E),
}
