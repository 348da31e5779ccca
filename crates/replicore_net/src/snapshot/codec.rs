//! Full and delta snapshot encoding.
//!
//! Delta encoding mirrors the original replication module's layout: a
//! per-type block is only written when at least one of its entities
//! changed or was removed, the block's entity count is back-patched once
//! the scan of that type finishes (never at a hardcoded offset — always
//! the position captured right before the placeholder write), and a
//! removed entity is marked by a zero change mask with no field payload.

use super::{EntityRecord, Snapshot};
use crate::codec::Buffer;
use crate::error::{ReplicationError, ReplicationResult};
use crate::registry::{ChangeMaskWidth, EntityTypeRegistry, FieldValue};

fn write_change_mask(into: &mut Buffer, width: ChangeMaskWidth, mask: u32) {
    match width {
        ChangeMaskWidth::One => into.write_u8(mask as u8),
        ChangeMaskWidth::Two => into.write_u16(mask as u16),
        ChangeMaskWidth::Four => into.write_u32(mask),
    }
}

fn read_change_mask(from: &mut Buffer, width: ChangeMaskWidth) -> ReplicationResult<u32> {
    Ok(match width {
        ChangeMaskWidth::One => u32::from(from.read_u8()?),
        ChangeMaskWidth::Two => u32::from(from.read_u16()?),
        ChangeMaskWidth::Four => from.read_u32()?,
    })
}

/// Encodes every currently-known entity in full: signature, input
/// signature, then one `(type_hash, count)` block per entity type that
/// has at least one entity, followed by each entity's uid, optional
/// class hash, and every declared field in order.
pub fn encode_full(snapshot: &Snapshot, registry: &EntityTypeRegistry) -> ReplicationResult<Buffer> {
    let mut into = Buffer::new();
    into.write_u32(snapshot.signature);
    into.write_u32(snapshot.input_sig);

    for descriptor in registry.iter_ordered() {
        let Some(records) = snapshot.entities.get(&descriptor.name_hash) else {
            continue;
        };
        if records.is_empty() {
            continue;
        }
        into.write_u32(descriptor.name_hash);
        let count_pos = into.write_cursor();
        into.write_u32(0); // placeholder, back-patched below

        let mut uids: Vec<_> = records.keys().copied().collect();
        uids.sort_unstable();
        for uid in &uids {
            let record = &records[uid];
            into.write_u32(*uid);
            if descriptor.has_class_hash {
                into.write_u32(record.class_hash.unwrap_or(0));
            }
            for (field, value) in descriptor.fields.iter().zip(record.fields.iter()) {
                value.encode(&field.name, &mut into)?;
            }
        }
        into.rewrite_u32(uids.len() as u32, count_pos)?;
    }
    Ok(into)
}

/// Decodes a buffer produced by [`encode_full`].
pub fn decode_full(from: &mut Buffer, registry: &EntityTypeRegistry) -> ReplicationResult<Snapshot> {
    let signature = from.read_u32()?;
    let input_sig = from.read_u32()?;
    let mut snapshot = Snapshot::new(signature, input_sig);

    while from.has_read_data() {
        let type_hash = from.read_u32()?;
        let descriptor = match registry.get(type_hash) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                tracing::warn!(
                    "decode_full: unknown entity type hash {}, aborting frame sig={}",
                    type_hash,
                    signature
                );
                return Err(err);
            }
        };
        let count = from.read_u32()?;
        for _ in 0..count {
            let uid = from.read_u32()?;
            let class_hash = if descriptor.has_class_hash {
                Some(from.read_u32()?)
            } else {
                None
            };
            let mut fields = Vec::with_capacity(descriptor.fields.len());
            for field in &descriptor.fields {
                fields.push(FieldValue::decode(field.field_type, from)?);
            }
            snapshot.add_entity(
                type_hash,
                EntityRecord {
                    uid,
                    class_hash,
                    fields,
                },
            );
        }
    }
    Ok(snapshot)
}

/// Computes the change mask for one entity against its reference record:
/// bit `i` is set when field `i` differs per its registered comparer, and
/// `class_hash`'s own bit is set when it differs too (so a type migration
/// is representable in a delta instead of always riding along). A missing
/// reference (new entity) yields the type's full change mask.
fn change_mask_for(
    descriptor: &crate::registry::EntityTypeDescriptor,
    current: &EntityRecord,
    reference: Option<&EntityRecord>,
) -> u32 {
    let Some(reference) = reference else {
        return descriptor.full_change_mask();
    };
    let mut mask = 0u32;
    for (field, (cur_val, ref_val)) in descriptor
        .fields
        .iter()
        .zip(current.fields.iter().zip(reference.fields.iter()))
    {
        if !field.comparer.equal(cur_val, ref_val) {
            mask |= 1 << field.bit;
        }
    }
    if let Some(bit) = descriptor.class_hash_bit {
        if current.class_hash != reference.class_hash {
            mask |= 1 << bit;
        }
    }
    mask
}

/// Encodes the difference between `current` and `reference`: signature,
/// input signature, a `has_changes` flag back-patched once the scan
/// completes, then one block per entity type that gained, lost, or
/// changed an entity.
pub fn encode_delta(
    current: &Snapshot,
    reference: &Snapshot,
    registry: &EntityTypeRegistry,
) -> ReplicationResult<Buffer> {
    let mut into = Buffer::new();
    into.write_u32(current.signature);
    into.write_u32(current.input_sig);
    let has_changes_pos = into.write_cursor();
    into.write_bool(false); // placeholder, back-patched once we know

    let removed_by_type = reference.uids_absent_from(current);
    let mut any_changes = false;

    for descriptor in registry.iter_ordered() {
        let current_records = current.entities.get(&descriptor.name_hash);
        let reference_records = reference.entities.get(&descriptor.name_hash);
        let removed = removed_by_type.get(&descriptor.name_hash);

        let mut header_written = false;
        let mut count_pos = 0usize;
        let mut count = 0u32;

        if let Some(current_records) = current_records {
            let mut uids: Vec<_> = current_records.keys().copied().collect();
            uids.sort_unstable();
            for uid in uids {
                let record = &current_records[&uid];
                let reference_record = reference_records.and_then(|m| m.get(&uid));
                let mask = change_mask_for(descriptor, record, reference_record);
                if mask == 0 {
                    continue;
                }
                if !header_written {
                    into.write_u32(descriptor.name_hash);
                    count_pos = into.write_cursor();
                    into.write_u32(0);
                    header_written = true;
                }
                into.write_u32(uid);
                write_change_mask(&mut into, descriptor.change_mask_width, mask);
                if let Some(bit) = descriptor.class_hash_bit {
                    if mask & (1 << bit) != 0 {
                        into.write_u32(record.class_hash.unwrap_or(0));
                    }
                }
                for (index, field) in descriptor.fields.iter().enumerate() {
                    if mask & (1 << field.bit) != 0 {
                        record.fields[index].encode(&field.name, &mut into)?;
                    }
                }
                count += 1;
            }
        }

        if let Some(removed) = removed {
            for uid in removed {
                if !header_written {
                    into.write_u32(descriptor.name_hash);
                    count_pos = into.write_cursor();
                    into.write_u32(0);
                    header_written = true;
                }
                into.write_u32(*uid);
                write_change_mask(&mut into, descriptor.change_mask_width, 0);
                count += 1;
            }
        }

        if header_written {
            into.rewrite_u32(count, count_pos)?;
            any_changes = true;
        }
    }

    into.rewrite_bool(any_changes, has_changes_pos)?;
    Ok(into)
}

/// Decodes a buffer produced by [`encode_delta`], applying it onto
/// `reference` to produce the resulting snapshot. Fields absent from an
/// entity's change mask are carried over unchanged from `reference`.
pub fn decode_delta(
    from: &mut Buffer,
    reference: &Snapshot,
    registry: &EntityTypeRegistry,
) -> ReplicationResult<Snapshot> {
    let signature = from.read_u32()?;
    let input_sig = from.read_u32()?;
    let has_changes = from.read_bool()?;

    let mut result = reference.clone();
    result.signature = signature;
    result.input_sig = input_sig;

    if !has_changes {
        return Ok(result);
    }

    while from.has_read_data() {
        let type_hash = from.read_u32()?;
        let descriptor = match registry.get(type_hash) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                tracing::warn!(
                    "decode_delta: unknown entity type hash {}, aborting frame sig={}",
                    type_hash,
                    signature
                );
                return Err(err);
            }
        };
        let count = from.read_u32()?;
        for _ in 0..count {
            let uid = from.read_u32()?;
            let mask = read_change_mask(from, descriptor.change_mask_width)?;
            if mask == 0 {
                if let Some(m) = result.entities.get_mut(&type_hash) {
                    m.remove(&uid);
                }
                continue;
            }

            let existing = result
                .entities
                .get(&type_hash)
                .and_then(|m| m.get(&uid))
                .cloned();

            let class_hash = match descriptor.class_hash_bit {
                Some(bit) if mask & (1 << bit) != 0 => Some(from.read_u32()?),
                Some(_) => None,
                None => None,
            };
            if descriptor.class_hash_bit.is_some() && class_hash.is_none() && existing.is_none() {
                return Err(ReplicationError::CodecOutOfRange {
                    offset: from.len(),
                    requested: 0,
                    size: from.len(),
                });
            }

            let mut fields = existing
                .as_ref()
                .map(|e| e.fields.clone())
                .unwrap_or_else(|| vec![FieldValue::Bool(false); descriptor.fields.len()]);

            for (index, field) in descriptor.fields.iter().enumerate() {
                if mask & (1 << field.bit) != 0 {
                    fields[index] = FieldValue::decode(field.field_type, from)?;
                } else if existing.is_none() {
                    return Err(ReplicationError::CodecOutOfRange {
                        offset: from.len(),
                        requested: 0,
                        size: from.len(),
                    });
                }
            }

            result.add_entity(
                type_hash,
                EntityRecord {
                    uid,
                    class_hash: class_hash.or(existing.and_then(|e| e.class_hash)),
                    fields,
                },
            );
        }
    }

    Ok(result)
}
