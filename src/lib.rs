//! ALICE-Outline — Diffable outline snapshots
//!
//! Don't reload the outline, move the rows.
//!
//! Minimal structural edit scripts for trees of identified items:
//! - Snapshot forest with O(1) lookup by identifier
//! - LCS diff over depth-first flattenings with cross-level move inference
//! - Scripts that apply sequentially, no index renumbering on the consumer side
//! - Serialized application to a single owning context
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`snapshot`] | Forest of identified items, structural mutators, flattening |
//! | [`diff`] | Edit script engine (Insert, Remove, Move) |
//! | [`mirror`] | Identifier-only tree that applies scripts edit by edit |
//! | [`source`] | Owner of the live snapshot |
//! | [`queue`] | Single-consumer apply queue (`std` only) |
//! | [`error`] | Error types for the consumer-facing seams |
//!
//! # Feature flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `std` | `std` collections and the apply queue (default; otherwise `no_std` + `alloc`) |
//! | `serde` | `Serialize`/`Deserialize` for positions, flattenings and edits |
//!
//! # Quick Start
//!
//! ```
//! use alice_outline::{collapse_moves, compute_edits, Change, Position, Snapshot};
//!
//! let mut old = Snapshot::new();
//! old.append_items(["inbox", "drafts", "archive"], None);
//!
//! // Drag "inbox" to the bottom
//! let mut new = old.clone();
//! new.move_item(&"inbox", None, 2);
//!
//! let changes = collapse_moves(&compute_edits(&old, &new));
//! assert_eq!(
//!     changes,
//!     vec![Change::Move { id: "inbox", from: Position::root(0), to: Position::root(2) }]
//! );
//! ```
//!
//! Author: Moroya Sakamoto

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod diff;
pub mod error;
pub mod mirror;
#[cfg(feature = "std")]
pub mod queue;
pub mod snapshot;
pub mod source;

pub use diff::{collapse_moves, compute_edits, diff_flattened, Change, EditOp};
pub use error::{MirrorError, QueueError, SnapshotError};
pub use mirror::{EditTarget, OutlineMirror};
#[cfg(feature = "std")]
pub use queue::{apply_queue, ApplyLoop, ApplyTicket, SnapshotSender};
pub use snapshot::{Identifiable, Identifier, IndexedIdentifier, Position, Snapshot};
pub use source::DataSource;
