//! Custom per-player property batch synchronization.
//!
//! Properties are registered once with a replication mode, set locally,
//! and marked dirty; [`encode_batch`] drains the dirty set into a single
//! wire payload rather than one message per property.

use crate::codec::Buffer;
use crate::error::ReplicationResult;
use crate::registry::FieldValue;
use std::collections::HashMap;

/// Controls who a custom property's changes are sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationMode {
    /// Not replicated at all.
    None,
    /// Sent only to the server (client-owned property).
    ServerOnly,
    /// Sent to the server, then rebroadcast to every other client.
    ServerBroadcast,
}

/// One custom property's current value and replication bookkeeping.
#[derive(Debug, Clone)]
pub struct CustomProperty {
    value: FieldValue,
    mode: ReplicationMode,
    dirty: bool,
}

impl CustomProperty {
    /// Declares a property with its initial value and replication mode.
    #[must_use]
    pub fn new(initial: FieldValue, mode: ReplicationMode) -> Self {
        Self {
            value: initial,
            mode,
            dirty: false,
        }
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Replication mode.
    #[must_use]
    pub fn mode(&self) -> ReplicationMode {
        self.mode
    }

    /// True if the value has changed since the last [`Self::clear_dirty`].
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Sets the value and marks the property dirty.
    pub fn set_value(&mut self, value: FieldValue) {
        self.value = value;
        self.dirty = true;
    }

    /// Clears the dirty flag after a successful sync.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

/// Encodes every dirty property owned by `player_id` into a single batch:
/// `player_id`, a one-byte count back-patched once the dirty set is
/// known, then `(name, value)` pairs. The count's offset is always
/// captured immediately before the placeholder write via
/// [`Buffer::write_cursor`], never hardcoded — a fixed literal offset
/// here is exactly the defect this format must not repeat.
pub fn encode_batch(
    player_id: u32,
    properties: &mut HashMap<String, CustomProperty>,
    force_all: bool,
    into: &mut Buffer,
) -> ReplicationResult<u8> {
    into.write_u32(player_id);
    let count_pos = into.write_cursor();
    into.write_u8(0);

    let mut encoded = 0u8;
    for (name, prop) in properties.iter_mut() {
        if prop.mode == ReplicationMode::None {
            continue;
        }
        if !force_all && !prop.dirty {
            continue;
        }
        into.write_string(name);
        prop.value.encode(name, into)?;
        prop.clear_dirty();
        encoded += 1;
    }

    into.rewrite_u8(encoded, count_pos)?;
    Ok(encoded)
}

/// Decodes a batch written by [`encode_batch`] into `(player_id, name,
/// value)` triples; the caller is responsible for looking up each named
/// property's declared type to know how to interpret `value` (the wire
/// format does not carry a type tag per entry — it is established out of
/// band when the property was registered).
pub fn decode_batch(
    from: &mut Buffer,
    value_decoder: impl Fn(&str, &mut Buffer) -> ReplicationResult<FieldValue>,
) -> ReplicationResult<(u32, Vec<(String, FieldValue)>)> {
    let player_id = from.read_u32()?;
    let count = from.read_u8()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = from.read_string()?;
        let value = value_decoder(&name, from)?;
        out.push((name, value));
    }
    Ok((player_id, out))
}
