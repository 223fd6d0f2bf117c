//! Live data source
//!
//! Owns the one "current" snapshot a consumer is showing. Applying a new
//! snapshot diffs it against the current one, hands the script to the
//! consumer's edit target, and only then replaces the current snapshot
//! wholesale.
//!
//! Author: Moroya Sakamoto

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use tracing::{debug, warn};

use crate::diff::{compute_edits, EditOp};
use crate::mirror::EditTarget;
use crate::snapshot::{Identifiable, Snapshot};

/// Single owner of the live snapshot
#[derive(Debug, Clone)]
pub struct DataSource<I: Identifiable> {
    current: Snapshot<I>,
    /// Number of snapshots applied so far
    version: u64,
}

impl<I: Identifiable> Default for DataSource<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Identifiable> DataSource<I> {
    /// Start from an empty outline
    pub fn new() -> Self {
        Self::with_snapshot(Snapshot::new())
    }

    /// Start from a snapshot the consumer already displays.
    pub fn with_snapshot(snapshot: Snapshot<I>) -> Self {
        Self {
            current: snapshot,
            version: 0,
        }
    }

    /// The snapshot currently applied
    pub fn snapshot(&self) -> &Snapshot<I> {
        &self.current
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Resolve a persisted identifier against the live snapshot.
    ///
    /// Identifiers of items that have since been removed resolve to `None`.
    pub fn item(&self, id: &I::Id) -> Option<&I> {
        self.current.item(id)
    }

    /// Script that `apply_snapshot` would hand to the target.
    pub fn preview(&self, next: &Snapshot<I>) -> Vec<EditOp<I::Id>> {
        compute_edits(&self.current, next)
    }

    /// Diff `next` against the live snapshot, apply the script to `target`
    /// and make `next` the live snapshot.
    ///
    /// If the target rejects the script the live snapshot is left as it was.
    pub fn apply_snapshot<T>(
        &mut self,
        next: Snapshot<I>,
        target: &mut T,
    ) -> Result<Vec<EditOp<I::Id>>, T::Error>
    where
        T: EditTarget<I::Id>,
    {
        let edits = compute_edits(&self.current, &next);
        if let Err(err) = target.apply_edits(&edits) {
            warn!(
                version = self.version,
                edits = edits.len(),
                "edit target rejected snapshot"
            );
            return Err(err);
        }
        self.current = next;
        self.version += 1;
        debug!(version = self.version, edits = edits.len(), "applied snapshot");
        Ok(edits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{collapse_moves, Change};
    use crate::mirror::OutlineMirror;
    use crate::snapshot::Position;

    #[derive(Default)]
    struct Recorder {
        scripts: Vec<Vec<Change<u32>>>,
    }

    impl EditTarget<u32> for Recorder {
        type Error = ();

        fn apply_edits(&mut self, edits: &[EditOp<u32>]) -> Result<(), ()> {
            self.scripts.push(collapse_moves(edits));
            Ok(())
        }
    }

    struct Rejecting;

    impl EditTarget<u32> for Rejecting {
        type Error = &'static str;

        fn apply_edits(&mut self, _edits: &[EditOp<u32>]) -> Result<(), &'static str> {
            Err("busy")
        }
    }

    fn flat(ids: &[u32]) -> Snapshot<u32> {
        let mut s = Snapshot::new();
        s.append_items(ids.iter().copied(), None);
        s
    }

    #[test]
    fn test_new_source_is_empty() {
        let source: DataSource<u32> = DataSource::new();
        assert!(source.snapshot().is_empty());
        assert_eq!(source.version(), 0);
    }

    #[test]
    fn test_apply_replaces_live_snapshot() {
        let mut source = DataSource::new();
        let mut recorder = Recorder::default();

        source
            .apply_snapshot(flat(&[1, 2]), &mut recorder)
            .expect("recorder accepts");
        source
            .apply_snapshot(flat(&[2, 1]), &mut recorder)
            .expect("recorder accepts");

        assert_eq!(source.version(), 2);
        assert_eq!(source.snapshot().root_ids(), &[2, 1]);
        assert_eq!(recorder.scripts.len(), 2);
        assert_eq!(
            recorder.scripts[0],
            vec![
                Change::Insert {
                    id: 1,
                    at: Position::root(0),
                },
                Change::Insert {
                    id: 2,
                    at: Position::root(1),
                },
            ]
        );
        assert_eq!(recorder.scripts[1].len(), 1);
    }

    #[test]
    fn test_rejected_script_keeps_live_snapshot() {
        let mut source = DataSource::with_snapshot(flat(&[1]));
        let err = source.apply_snapshot(flat(&[1, 2]), &mut Rejecting);
        assert_eq!(err, Err("busy"));
        assert_eq!(source.version(), 0);
        assert_eq!(source.snapshot().root_ids(), &[1]);
    }

    #[test]
    fn test_item_lookup_follows_live_snapshot() {
        let mut source = DataSource::with_snapshot(flat(&[1, 2]));
        let mut mirror = OutlineMirror::from_snapshot(source.snapshot());
        assert_eq!(source.item(&2), Some(&2));

        source
            .apply_snapshot(flat(&[1]), &mut mirror)
            .expect("mirror in sync");
        assert_eq!(source.item(&2), None);
        assert_eq!(mirror.flattened(), source.snapshot().flattened());
    }

    #[test]
    fn test_preview_does_not_apply() {
        let source = DataSource::with_snapshot(flat(&[1]));
        let ops = source.preview(&flat(&[1, 2]));
        assert_eq!(ops.len(), 1);
        assert_eq!(source.snapshot().len(), 1);
    }

    #[test]
    fn test_same_snapshot_applies_empty_script() {
        let mut source = DataSource::with_snapshot(flat(&[1, 2, 3]));
        let mut recorder = Recorder::default();
        let next = source.snapshot().clone();
        let ops = source
            .apply_snapshot(next, &mut recorder)
            .expect("recorder accepts");
        assert!(ops.is_empty());
        assert_eq!(source.version(), 1);
    }
}
