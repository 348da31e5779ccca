//! End-to-end scenarios exercising the codec, snapshot model, delta
//! protocol and client tracking together, rather than one component at a
//! time.

use replicore_net::client::{reconcile, ReconcileOutcome};
use replicore_net::registry::{FieldSpec, FieldType};
use replicore_net::snapshot::{decode_delta, decode_full, encode_delta, encode_full};
use replicore_net::{
    ClientTracker, EntityRecord, EntityTypeRegistry, FieldValue, Snapshot, SnapshotHistory,
    SnapshotKind,
};
use replicore_types::{Quat, Vec3};

fn player_registry() -> (EntityTypeRegistry, u32) {
    let mut registry = EntityTypeRegistry::new();
    let hash = registry
        .register(
            "Player",
            vec![
                FieldSpec::exact("hp", FieldType::I32),
                FieldSpec::exact("pos", FieldType::Vec3),
            ],
            false,
        )
        .unwrap();
    (registry, hash)
}

#[test]
fn full_snapshot_round_trip() {
    let (registry, hash) = player_registry();
    let mut snapshot = Snapshot::new(7, 0);
    snapshot.add_entity(
        hash,
        EntityRecord {
            uid: 42,
            class_hash: None,
            fields: vec![FieldValue::I32(100), FieldValue::Vec3(Vec3::new(1.0, 2.0, 3.0))],
        },
    );

    let mut wire = encode_full(&snapshot, &registry).unwrap();
    let decoded = decode_full(&mut wire, &registry).unwrap();

    assert_eq!(decoded.signature, 7);
    assert_eq!(decoded.entities[&hash].len(), 1);
    let entity = &decoded.entities[&hash][&42];
    assert_eq!(entity.fields[0], FieldValue::I32(100));
    assert_eq!(entity.fields[1], FieldValue::Vec3(Vec3::new(1.0, 2.0, 3.0)));
}

#[test]
fn delta_with_one_changed_field_omits_the_unchanged_one() {
    let (registry, hash) = player_registry();
    let mut base = Snapshot::new(7, 0);
    base.add_entity(
        hash,
        EntityRecord {
            uid: 42,
            class_hash: None,
            fields: vec![FieldValue::I32(100), FieldValue::Vec3(Vec3::new(1.0, 2.0, 3.0))],
        },
    );

    let mut updated = base.clone();
    updated.signature = 8;
    updated.entities.get_mut(&hash).unwrap().get_mut(&42).unwrap().fields[0] = FieldValue::I32(90);

    let mut wire = encode_delta(&updated, &base, &registry).unwrap();
    let decoded = decode_delta(&mut wire, &base, &registry).unwrap();

    let entity = &decoded.entities[&hash][&42];
    assert_eq!(entity.fields[0], FieldValue::I32(90));
    assert_eq!(entity.fields[1], FieldValue::Vec3(Vec3::new(1.0, 2.0, 3.0)));
}

#[test]
fn delta_removal_marks_the_entity_gone() {
    let (registry, hash) = player_registry();
    let mut base = Snapshot::new(7, 0);
    base.add_entity(
        hash,
        EntityRecord {
            uid: 42,
            class_hash: None,
            fields: vec![FieldValue::I32(100), FieldValue::Vec3(Vec3::new(0.0, 0.0, 0.0))],
        },
    );
    base.add_entity(
        hash,
        EntityRecord {
            uid: 43,
            class_hash: None,
            fields: vec![FieldValue::I32(50), FieldValue::Vec3(Vec3::new(0.0, 0.0, 0.0))],
        },
    );

    let mut new = Snapshot::new(8, 0);
    new.add_entity(
        hash,
        EntityRecord {
            uid: 42,
            class_hash: None,
            fields: vec![FieldValue::I32(100), FieldValue::Vec3(Vec3::new(0.0, 0.0, 0.0))],
        },
    );

    let mut wire = encode_delta(&new, &base, &registry).unwrap();
    let decoded = decode_delta(&mut wire, &base, &registry).unwrap();

    assert!(decoded.entities[&hash].contains_key(&42));
    assert!(!decoded.entities[&hash].contains_key(&43));
}

#[test]
fn full_snap_threshold_escape_hatch_forces_full_after_four_unacked_ticks() {
    let mut tracker = ClientTracker::new(3);
    tracker.set_ready(true);

    let mut history = SnapshotHistory::new(10);
    history.push(Snapshot::new(1, 1));

    tracker.input_cache.associate(1, 1);
    tracker.input_cache.associate(2, 2);
    tracker.input_cache.associate(3, 3);
    tracker.input_cache.associate(4, 4);

    let (kind, _) = tracker.decide_snapshot_kind(&history).unwrap();
    assert_eq!(kind, SnapshotKind::Full);
}

#[test]
fn stale_frame_leaves_history_and_server_state_untouched() {
    let (registry, hash) = player_registry();
    let mut history = SnapshotHistory::new(10);
    let mut oldest_local = Snapshot::new(5, 100);
    oldest_local.add_entity(
        hash,
        EntityRecord {
            uid: 1,
            class_hash: None,
            fields: vec![FieldValue::I32(10), FieldValue::Vec3(Vec3::new(0.0, 0.0, 0.0))],
        },
    );
    history.push(oldest_local);
    let history_len_before = history.len();

    let mut server_state = None;
    let stale = Snapshot::new(99, 50);
    let result = reconcile(&stale, &mut history, &registry, &mut server_state);

    assert!(result.is_err());
    assert_eq!(history.len(), history_len_before);
    assert!(server_state.is_none());
}

#[test]
fn reconciliation_is_idempotent_on_repeated_authoritative_frames() {
    let (registry, hash) = player_registry();
    let mut history = SnapshotHistory::new(10);
    let mut predicted = Snapshot::new(1, 1);
    predicted.add_entity(
        hash,
        EntityRecord {
            uid: 1,
            class_hash: None,
            fields: vec![FieldValue::I32(90), FieldValue::Vec3(Vec3::new(0.0, 0.0, 0.0))],
        },
    );
    history.push(predicted);

    let mut server = Snapshot::new(50, 1);
    server.add_entity(
        hash,
        EntityRecord {
            uid: 1,
            class_hash: None,
            fields: vec![FieldValue::I32(100), FieldValue::Vec3(Vec3::new(0.0, 0.0, 0.0))],
        },
    );

    let mut server_state = None;
    let first = reconcile(&server, &mut history, &registry, &mut server_state).unwrap();
    assert_eq!(first, ReconcileOutcome::Corrected { entities_corrected: 1 });
    let history_after_first: Vec<_> = history.iter_mut().map(|s| s.clone()).collect();

    let second = reconcile(&server, &mut history, &registry, &mut server_state).unwrap();
    assert_eq!(second, ReconcileOutcome::NoCorrection);
    let history_after_second: Vec<_> = history.iter_mut().map(|s| s.clone()).collect();
    assert_eq!(history_after_first, history_after_second);
}

#[test]
fn quantized_rotation_at_10_bits_stays_within_the_smallest_three_bound() {
    use replicore_net::codec::{pack_rotation_10bit, quantize_rotation, restore_rotation, unpack_rotation_10bit};

    let q = Quat::new(0.5, 0.5, 0.5, 0.5);
    let decomposed = quantize_rotation(q);
    let packed = pack_rotation_10bit(decomposed);
    let restored = restore_rotation(unpack_rotation_10bit(packed));

    let dot = (q.x * restored.x + q.y * restored.y + q.z * restored.z + q.w * restored.w).abs();
    assert!(dot > 0.9995, "dot product {dot} too far from 1.0");
}
