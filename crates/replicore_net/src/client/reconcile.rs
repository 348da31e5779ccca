//! Client-side reconciliation: detect a stale authoritative frame, and
//! when the server's state disagrees with a predicted frame, propagate
//! the correction (spawn, field correction or despawn) into every later
//! frame still held in history rather than only the one that was
//! checked.

use crate::error::{ReplicationError, ReplicationResult};
use crate::registry::EntityTypeRegistry;
use crate::snapshot::{EntityRecord, Snapshot, SnapshotHistory};
use std::collections::HashSet;

/// Result of reconciling a server snapshot against local prediction
/// history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The server's state matched the local prediction for this frame;
    /// no entity needed a correction, spawn or despawn.
    NoCorrection,
    /// The server's state disagreed with prediction; the given number of
    /// entities were spawned, corrected or despawned, and that change was
    /// propagated into every remaining history entry.
    Corrected {
        /// Number of entities spawned, corrected or despawned.
        entities_corrected: usize,
    },
}

enum Correction {
    Upsert(EntityRecord),
    Despawn(u32),
}

/// Reconciles `server_snapshot` against `history`, a client's buffer of
/// predicted snapshots. Implements the full client check: stale-frame
/// rejection, popping acknowledged frames off the front of history to
/// find the locally predicted frame `L`, per-type spawn/correction/
/// despawn classification against `L` using each field's registered
/// comparer, and propagating every change into the remaining history.
/// `server_snapshot` is saved into `server_state` unconditionally at the
/// end, becoming the delta base for the next incoming frame regardless
/// of whether a correction was needed.
///
/// Returns [`ReplicationError::StaleFrame`] if `server_snapshot`'s input
/// signature is older than the oldest prediction still retained — the
/// client has already discarded the context needed to correct that far
/// back and must fall back to accepting the server's state outright
/// (handled by the caller, not by this function).
pub fn reconcile(
    server_snapshot: &Snapshot,
    history: &mut SnapshotHistory,
    registry: &EntityTypeRegistry,
    server_state: &mut Option<Snapshot>,
) -> ReplicationResult<ReconcileOutcome> {
    let input_sig = server_snapshot.input_sig;

    if input_sig > 0 {
        if let Some(oldest) = history.oldest() {
            if input_sig < oldest.input_sig {
                tracing::warn!(
                    "dropping stale frame: input_sig={} is older than oldest retained {}",
                    input_sig,
                    oldest.input_sig
                );
                return Err(ReplicationError::StaleFrame {
                    input_sig,
                    oldest: oldest.input_sig,
                });
            }
        }
    }

    let local_predicted = if input_sig > 0 {
        let mut last_popped = None;
        while history.oldest().is_some_and(|s| s.input_sig <= input_sig) {
            last_popped = history.pop_front();
        }
        last_popped
    } else {
        history.latest().cloned()
    };

    *server_state = Some(server_snapshot.clone());

    let Some(local) = local_predicted else {
        return Ok(ReconcileOutcome::NoCorrection);
    };

    let mut corrections: Vec<(u32, Correction)> = Vec::new();

    for (type_hash, remote_records) in &server_snapshot.entities {
        let descriptor = registry.get(*type_hash).ok();
        let mut remaining_local: HashSet<u32> = local
            .entities
            .get(type_hash)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default();

        for (uid, authoritative) in remote_records {
            remaining_local.remove(uid);
            let predicted = local.entities.get(type_hash).and_then(|m| m.get(uid));
            let unchanged = match predicted {
                Some(p) => match descriptor {
                    Some(d) => records_match(d, p, authoritative),
                    None => p == authoritative,
                },
                None => false,
            };
            if !unchanged {
                corrections.push((*type_hash, Correction::Upsert(authoritative.clone())));
            }
        }

        for despawned_uid in remaining_local {
            corrections.push((*type_hash, Correction::Despawn(despawned_uid)));
        }
    }

    if corrections.is_empty() {
        return Ok(ReconcileOutcome::NoCorrection);
    }

    let entities_corrected = corrections.len();
    tracing::debug!(
        "reconciliation snapped {} entities at input_sig={}, propagating into {} retained frames",
        entities_corrected,
        input_sig,
        history.len()
    );
    for entry in history.iter_mut() {
        for (type_hash, correction) in &corrections {
            match correction {
                Correction::Upsert(record) => entry.add_entity(*type_hash, record.clone()),
                Correction::Despawn(uid) => {
                    if let Some(records) = entry.entities.get_mut(type_hash) {
                        records.remove(uid);
                    }
                }
            }
        }
    }

    Ok(ReconcileOutcome::Corrected { entities_corrected })
}

/// True if every field of `predicted` compares equal to `authoritative`
/// under its declared comparer, and the reserved class hash (if any)
/// matches exactly.
fn records_match(
    descriptor: &crate::registry::EntityTypeDescriptor,
    predicted: &EntityRecord,
    authoritative: &EntityRecord,
) -> bool {
    if predicted.class_hash != authoritative.class_hash {
        return false;
    }
    descriptor.fields.iter().enumerate().all(|(idx, field)| {
        match (predicted.fields.get(idx), authoritative.fields.get(idx)) {
            (Some(p), Some(a)) => field.comparer.equal(p, a),
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FieldSpec, FieldType, FieldValue};

    fn registry_with_player() -> EntityTypeRegistry {
        let mut reg = EntityTypeRegistry::new();
        reg.register("Player", vec![FieldSpec::exact("hp", FieldType::U8)], false)
            .unwrap();
        reg
    }

    fn snap_with(sig: u32, input_sig: u32, uid: u32, hp: u8) -> Snapshot {
        let mut s = Snapshot::new(sig, input_sig);
        s.add_entity(
            crate::registry::fnv1a_hash("Player"),
            EntityRecord {
                uid,
                class_hash: None,
                fields: vec![FieldValue::U8(hp)],
            },
        );
        s
    }

    #[test]
    fn matching_prediction_needs_no_correction() {
        let registry = registry_with_player();
        let mut history = SnapshotHistory::new(10);
        history.push(snap_with(1, 1, 1, 100));
        let server = snap_with(99, 1, 1, 100);
        let mut server_state = None;
        assert_eq!(
            reconcile(&server, &mut history, &registry, &mut server_state).unwrap(),
            ReconcileOutcome::NoCorrection
        );
        assert_eq!(server_state.unwrap().signature, 99);
    }

    #[test]
    fn mismatch_is_corrected_and_propagated_forward() {
        let registry = registry_with_player();
        let mut history = SnapshotHistory::new(10);
        history.push(snap_with(1, 1, 1, 90)); // mispredicted, popped as L
        history.push(snap_with(2, 2, 1, 90)); // later frame still wrong
        let server = snap_with(99, 1, 1, 100);
        let mut server_state = None;

        let outcome = reconcile(&server, &mut history, &registry, &mut server_state).unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Corrected {
                entities_corrected: 1
            }
        );

        let type_hash = crate::registry::fnv1a_hash("Player");
        let mut entries = history.iter_mut();
        assert_eq!(
            entries.next().unwrap().entities[&type_hash][&1].fields[0],
            FieldValue::U8(100)
        );
        assert!(entries.next().is_none()); // the popped frame (sig 1) is gone
    }

    #[test]
    fn spawn_and_despawn_are_detected() {
        let registry = registry_with_player();
        let mut history = SnapshotHistory::new(10);
        let mut local = snap_with(1, 1, 1, 100); // uid 1 locally predicted
        local.add_entity(
            crate::registry::fnv1a_hash("Player"),
            EntityRecord {
                uid: 2,
                class_hash: None,
                fields: vec![FieldValue::U8(50)],
            },
        ); // uid 2 will be despawned
        history.push(local);

        let server = snap_with(99, 1, 3, 10); // uid 3 is a new spawn, uid 1/2 absent
        let mut server_state = None;
        let outcome = reconcile(&server, &mut history, &registry, &mut server_state).unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Corrected {
                entities_corrected: 3 // spawn uid 3, despawn uid 1, despawn uid 2
            }
        );

        let type_hash = crate::registry::fnv1a_hash("Player");
        let remaining = &history.iter_mut().next().unwrap().entities[&type_hash];
        assert!(remaining.contains_key(&3));
        assert!(!remaining.contains_key(&1));
        assert!(!remaining.contains_key(&2));
    }

    #[test]
    fn frame_older_than_history_is_stale() {
        let registry = registry_with_player();
        let mut history = SnapshotHistory::new(10);
        history.push(snap_with(5, 5, 1, 100));
        let server = snap_with(99, 1, 1, 100);
        let mut server_state = None;
        assert!(matches!(
            reconcile(&server, &mut history, &registry, &mut server_state),
            Err(ReplicationError::StaleFrame { .. })
        ));
    }

    #[test]
    fn tolerance_comparer_suppresses_spurious_corrections() {
        let mut registry = EntityTypeRegistry::new();
        registry
            .register(
                "Player",
                vec![FieldSpec::approx("speed", FieldType::F32, 0.5)],
                false,
            )
            .unwrap();
        let type_hash = crate::registry::fnv1a_hash("Player");

        let mut local = Snapshot::new(1, 1);
        local.add_entity(
            type_hash,
            EntityRecord {
                uid: 1,
                class_hash: None,
                fields: vec![FieldValue::F32(10.0)],
            },
        );
        let mut history = SnapshotHistory::new(10);
        history.push(local);

        let mut server = Snapshot::new(99, 1);
        server.add_entity(
            type_hash,
            EntityRecord {
                uid: 1,
                class_hash: None,
                fields: vec![FieldValue::F32(10.2)], // within tolerance
            },
        );
        let mut server_state = None;
        assert_eq!(
            reconcile(&server, &mut history, &registry, &mut server_state).unwrap(),
            ReconcileOutcome::NoCorrection
        );
    }
}
