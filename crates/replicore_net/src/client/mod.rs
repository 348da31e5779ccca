//! Per-client tracking: ack cursors, no-input bookkeeping and the
//! full-vs-delta snapshot policy.

mod reconcile;

pub use reconcile::{reconcile, ReconcileOutcome};

use crate::input::ServerInputCache;
use crate::snapshot::{Snapshot, SnapshotHistory};

/// Which kind of snapshot the server should send a client next, decided
/// by [`ClientTracker::decide_snapshot_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    /// Send every replicated entity in full.
    Full,
    /// Send a diff against the client's last acknowledged snapshot.
    Delta,
}

/// Server-side bookkeeping for one connected client: ack cursor,
/// input-delivery health, and readiness.
#[derive(Debug)]
pub struct ClientTracker {
    /// Input cache and ack bookkeeping for this client.
    pub input_cache: ServerInputCache,
    /// Set once the client has finished its connection handshake. A
    /// client that isn't ready is skipped entirely during outbound
    /// emission.
    ready: bool,
    /// Unacknowledged-snapshot count above which a full resync is forced
    /// regardless of reference-snapshot availability.
    full_snap_threshold: u32,
}

impl ClientTracker {
    /// Creates a tracker for a newly connected client, not yet ready.
    #[must_use]
    pub fn new(full_snap_threshold: u32) -> Self {
        Self {
            input_cache: ServerInputCache::new(),
            ready: false,
            full_snap_threshold,
        }
    }

    /// Marks the client ready (or not) to receive outbound snapshots —
    /// called by the adapter once the client has completed its
    /// connection handshake.
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// True if the client is ready to receive outbound snapshots.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Decides whether the next snapshot sent to this client should be a
    /// full resync or a delta: skip a not-ready client, force full once
    /// the unacknowledged-snapshot count exceeds the threshold or no
    /// reference snapshot is available for the client's last ack,
    /// otherwise delta against that reference. Returns `None` when the
    /// client should be skipped this tick.
    #[must_use]
    pub fn decide_snapshot_kind<'a>(
        &self,
        history: &'a SnapshotHistory,
    ) -> Option<(SnapshotKind, Option<&'a Snapshot>)> {
        if !self.ready {
            return None;
        }

        let non_acked = self.input_cache.non_acked_count() as u32;
        if non_acked > self.full_snap_threshold {
            return Some((SnapshotKind::Full, None));
        }

        match history.find(self.input_cache.last_ack_snap()) {
            Some(reference) => Some((SnapshotKind::Delta, Some(reference))),
            None => Some((SnapshotKind::Full, None)),
        }
    }

    /// Records that the client acknowledged a snapshot. Monotonic and
    /// collapsing: acking signature `K` also acks every earlier
    /// unacknowledged signature, matching [`ServerInputCache::acknowledge`].
    pub fn acknowledge_snapshot(&mut self, snapshot_sig: u32) {
        self.input_cache.acknowledge(snapshot_sig);
    }

    /// The client's last acknowledged snapshot signature.
    #[must_use]
    pub fn last_ack_snap(&self) -> u32 {
        self.input_cache.last_ack_snap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;

    #[test]
    fn not_ready_client_is_skipped() {
        let tracker = ClientTracker::new(30);
        let history = SnapshotHistory::new(10);
        assert_eq!(tracker.decide_snapshot_kind(&history), None);
    }

    #[test]
    fn ready_with_no_reference_gets_full() {
        let mut tracker = ClientTracker::new(30);
        tracker.set_ready(true);
        let history = SnapshotHistory::new(10);
        assert_eq!(
            tracker.decide_snapshot_kind(&history).map(|(k, _)| k),
            Some(SnapshotKind::Full)
        );
    }

    #[test]
    fn ready_with_reference_gets_delta() {
        let mut tracker = ClientTracker::new(30);
        tracker.set_ready(true);
        tracker.acknowledge_snapshot(5);
        let mut history = SnapshotHistory::new(10);
        history.push(Snapshot::new(5, 1));
        let decision = tracker.decide_snapshot_kind(&history);
        assert_eq!(decision.as_ref().map(|(k, _)| *k), Some(SnapshotKind::Delta));
        assert_eq!(decision.unwrap().1.unwrap().signature, 5);
    }

    #[test]
    fn exceeding_threshold_forces_full_even_with_reference() {
        let mut tracker = ClientTracker::new(1);
        tracker.set_ready(true);
        tracker.acknowledge_snapshot(5);
        tracker.input_cache.associate(6, 10);
        tracker.input_cache.associate(7, 11);
        let mut history = SnapshotHistory::new(10);
        history.push(Snapshot::new(5, 1));
        assert_eq!(
            tracker.decide_snapshot_kind(&history).map(|(k, _)| k),
            Some(SnapshotKind::Full)
        );
    }
}
