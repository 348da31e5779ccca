//! Snapshot model and bounded per-client/server history.

mod codec;

pub use codec::{decode_delta, decode_full, encode_delta, encode_full};

use crate::registry::FieldValue;
use std::collections::{HashMap, VecDeque};

/// One replicated entity's field values, keyed by declaration order in
/// its [`crate::registry::EntityTypeDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    /// Unique ID of this entity within the snapshot stream.
    pub uid: u32,
    /// Reserved class-hash value, present only for entity types
    /// registered with `has_class_hash = true`.
    pub class_hash: Option<u32>,
    /// Field values, in the same order as the type's field list.
    pub fields: Vec<FieldValue>,
}

/// A full point-in-time snapshot of every replicated entity, grouped by
/// entity-type hash.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Monotonically increasing snapshot signature.
    pub signature: u32,
    /// Input signature the server consumed to produce this snapshot (on
    /// the client, the input signature it believes was acknowledged).
    pub input_sig: u32,
    /// Entities, grouped by entity-type name hash, then keyed by uid.
    pub entities: HashMap<u32, HashMap<u32, EntityRecord>>,
}

impl Snapshot {
    /// Creates an empty snapshot with the given signature pair.
    #[must_use]
    pub fn new(signature: u32, input_sig: u32) -> Self {
        Self {
            signature,
            input_sig,
            entities: HashMap::new(),
        }
    }

    /// Inserts or replaces an entity record under the given type hash.
    /// Idempotent on `uid`: a second call with the same uid overwrites
    /// the first rather than duplicating the entity.
    pub fn add_entity(&mut self, type_hash: u32, record: EntityRecord) {
        self.entities
            .entry(type_hash)
            .or_default()
            .insert(record.uid, record);
    }

    /// Builds the removal tracker used by delta encoding: every `(type_hash,
    /// uid)` pair present in `self` but absent from `current`.
    #[must_use]
    pub fn uids_absent_from(&self, current: &Snapshot) -> HashMap<u32, Vec<u32>> {
        let mut tracker: HashMap<u32, Vec<u32>> = HashMap::new();
        for (type_hash, records) in &self.entities {
            let still_present = current.entities.get(type_hash);
            for uid in records.keys() {
                let present = still_present.is_some_and(|m| m.contains_key(uid));
                if !present {
                    tracker.entry(*type_hash).or_default().push(*uid);
                }
            }
        }
        tracker
    }
}

/// A bounded, drop-oldest ring buffer of snapshots, used both as the
/// server's per-type history (for delta reference selection) and the
/// client's reconciliation history.
#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    entries: VecDeque<Snapshot>,
    capacity: usize,
}

impl SnapshotHistory {
    /// Creates an empty history bounded to `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Pushes a new snapshot, evicting the oldest entry if at capacity.
    pub fn push(&mut self, snapshot: Snapshot) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Removes and returns the oldest retained snapshot, used during
    /// client reconciliation to pop acknowledged frames off the front of
    /// history.
    pub fn pop_front(&mut self) -> Option<Snapshot> {
        self.entries.pop_front()
    }

    /// The most recently pushed snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<&Snapshot> {
        self.entries.back()
    }

    /// The oldest snapshot still retained.
    #[must_use]
    pub fn oldest(&self) -> Option<&Snapshot> {
        self.entries.front()
    }

    /// Finds a snapshot by its signature.
    #[must_use]
    pub fn find(&self, signature: u32) -> Option<&Snapshot> {
        self.entries.iter().find(|s| s.signature == signature)
    }

    /// Number of entries currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no snapshots are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry older than `signature` (exclusive).
    pub fn drop_older_than(&mut self, signature: u32) {
        while let Some(front) = self.entries.front() {
            if front.signature < signature {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Mutable iterator over every retained entry, oldest first — used
    /// by reconciliation to propagate a correction into all remaining
    /// history, not just the newest entry.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Snapshot> {
        self.entries.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_entity_is_idempotent_on_uid() {
        let mut snap = Snapshot::new(1, 1);
        snap.add_entity(
            10,
            EntityRecord {
                uid: 5,
                class_hash: None,
                fields: vec![FieldValue::U8(1)],
            },
        );
        snap.add_entity(
            10,
            EntityRecord {
                uid: 5,
                class_hash: None,
                fields: vec![FieldValue::U8(2)],
            },
        );
        assert_eq!(snap.entities[&10].len(), 1);
        assert_eq!(snap.entities[&10][&5].fields[0], FieldValue::U8(2));
    }

    #[test]
    fn history_evicts_oldest_past_capacity() {
        let mut hist = SnapshotHistory::new(2);
        hist.push(Snapshot::new(1, 0));
        hist.push(Snapshot::new(2, 0));
        hist.push(Snapshot::new(3, 0));
        assert_eq!(hist.len(), 2);
        assert_eq!(hist.oldest().unwrap().signature, 2);
    }
}
