//! Wire encoding for [`super::InputState`]. An input record writes
//! `input_sig`, `has_input`, and — only when input was recorded — the
//! optional mouse fields followed by four independently-masked groups in
//! fixed order: analogs, booleans, custom vec2s, custom vec3s.

use super::InputState;
use crate::codec::{quantize_unit_float, restore_unit_float, Buffer};
use crate::error::ReplicationResult;
use crate::registry::ChangeMaskWidth;
use replicore_types::{Vec2, Vec3};

/// The restricted set of value types input fields may carry — analog,
/// boolean and the two vector shapes the original input system polls
/// directly from the input map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFieldValue {
    /// A pressed/held action.
    Bool(bool),
    /// An analog axis value, conventionally in `[0, 1]`.
    Analog(f32),
    /// A 2D input vector (e.g. movement).
    Vec2(Vec2),
    /// A 3D input vector.
    Vec3(Vec3),
}

/// One registered input field: its name (used as the key in
/// [`super::InputState::values`]) and its declared shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFieldKind {
    /// See [`InputFieldValue::Bool`].
    Bool,
    /// See [`InputFieldValue::Analog`].
    Analog,
    /// See [`InputFieldValue::Vec2`].
    Vec2,
    /// See [`InputFieldValue::Vec3`].
    Vec3,
}

/// Declares one named input field and its wire shape.
#[derive(Debug, Clone)]
pub struct InputFieldSpec {
    /// Field name, matching the key used in [`super::InputState::values`].
    pub name: String,
    /// Wire shape of the field's value.
    pub kind: InputFieldKind,
}

/// The number of bits an analog value is quantized to when
/// `quantize_analog` is enabled — 8 bits over `[0, 1]`.
const ANALOG_QUANTIZE_BITS: u32 = 8;

/// A single masked group within the record: a fixed ordered subset of
/// the declared fields sharing one wire shape, with its own change mask
/// sized to its own field count.
#[derive(Debug, Clone)]
struct FieldGroup {
    fields: Vec<InputFieldSpec>,
    mask_width: ChangeMaskWidth,
}

impl FieldGroup {
    fn new(fields: Vec<InputFieldSpec>) -> Self {
        let mask_width = ChangeMaskWidth::for_field_count(fields.len());
        Self { fields, mask_width }
    }

    fn write_mask(&self, into: &mut Buffer, mask: u32) {
        match self.mask_width {
            ChangeMaskWidth::One => into.write_u8(mask as u8),
            ChangeMaskWidth::Two => into.write_u16(mask as u16),
            ChangeMaskWidth::Four => into.write_u32(mask),
        }
    }

    fn read_mask(&self, from: &mut Buffer) -> ReplicationResult<u32> {
        Ok(match self.mask_width {
            ChangeMaskWidth::One => u32::from(from.read_u8()?),
            ChangeMaskWidth::Two => u32::from(from.read_u16()?),
            ChangeMaskWidth::Four => from.read_u32()?,
        })
    }

    fn mask_for(&self, values: &std::collections::HashMap<String, InputFieldValue>) -> u32 {
        let mut mask = 0u32;
        for (bit, field) in self.fields.iter().enumerate() {
            if values.contains_key(&field.name) {
                mask |= 1 << bit;
            }
        }
        mask
    }
}

/// Encodes and decodes [`InputState`] values against declared field
/// lists partitioned by wire shape, matching the codec's fixed group
/// order (analogs, booleans, custom vec2s, custom vec3s). Each
/// declaration's relative order within its own group fixes that field's
/// bit position, exactly as the entity-type registry fixes bit positions
/// for replicated fields.
#[derive(Debug, Clone)]
pub struct InputCodec {
    analogs: FieldGroup,
    booleans: FieldGroup,
    vec2s: FieldGroup,
    vec3s: FieldGroup,
    use_mouse_relative: bool,
    use_mouse_speed: bool,
    quantize_analog: bool,
}

impl InputCodec {
    /// Builds a codec from a declared field list, partitioning it into
    /// the four fixed wire groups by kind while preserving each field's
    /// relative order within its group.
    #[must_use]
    pub fn new(
        fields: Vec<InputFieldSpec>,
        use_mouse_relative: bool,
        use_mouse_speed: bool,
        quantize_analog: bool,
    ) -> Self {
        let mut analogs = Vec::new();
        let mut booleans = Vec::new();
        let mut vec2s = Vec::new();
        let mut vec3s = Vec::new();
        for field in fields {
            match field.kind {
                InputFieldKind::Analog => analogs.push(field),
                InputFieldKind::Bool => booleans.push(field),
                InputFieldKind::Vec2 => vec2s.push(field),
                InputFieldKind::Vec3 => vec3s.push(field),
            }
        }
        Self {
            analogs: FieldGroup::new(analogs),
            booleans: FieldGroup::new(booleans),
            vec2s: FieldGroup::new(vec2s),
            vec3s: FieldGroup::new(vec3s),
            use_mouse_relative,
            use_mouse_speed,
            quantize_analog,
        }
    }

    fn write_analog(&self, into: &mut Buffer, value: f32) {
        if self.quantize_analog {
            into.write_u8(quantize_unit_float(value, ANALOG_QUANTIZE_BITS) as u8);
        } else {
            into.write_f32(value);
        }
    }

    fn read_analog(&self, from: &mut Buffer) -> ReplicationResult<f32> {
        Ok(if self.quantize_analog {
            restore_unit_float(u32::from(from.read_u8()?), ANALOG_QUANTIZE_BITS)
        } else {
            from.read_f32()?
        })
    }

    /// Encodes the full input record: `input_sig`, `has_input`, and —
    /// only when `input.has_input()` — the enabled mouse fields followed
    /// by the four masked groups in fixed order.
    pub fn encode(&self, input: &InputState, into: &mut Buffer) -> ReplicationResult<()> {
        into.write_u32(input.signature);
        let has_input = input.has_input();
        into.write_bool(has_input);
        if !has_input {
            return Ok(());
        }

        if self.use_mouse_relative {
            into.write_vec2(input.mouse_relative.unwrap_or(Vec2::new(0.0, 0.0)));
        }
        if self.use_mouse_speed {
            into.write_vec2(input.mouse_speed.unwrap_or(Vec2::new(0.0, 0.0)));
        }

        let analog_mask = self.analogs.mask_for(&input.values);
        self.analogs.write_mask(into, analog_mask);
        for (bit, field) in self.analogs.fields.iter().enumerate() {
            if analog_mask & (1 << bit) == 0 {
                continue;
            }
            let InputFieldValue::Analog(v) = input.values[&field.name] else {
                unreachable!("analog group field must carry an Analog value")
            };
            self.write_analog(into, v);
        }

        let bool_mask = self.booleans.mask_for(&input.values);
        self.booleans.write_mask(into, bool_mask);
        // Booleans encode purely in their mask; no value bodies follow.

        let vec2_mask = self.vec2s.mask_for(&input.values);
        self.vec2s.write_mask(into, vec2_mask);
        for (bit, field) in self.vec2s.fields.iter().enumerate() {
            if vec2_mask & (1 << bit) == 0 {
                continue;
            }
            let InputFieldValue::Vec2(v) = input.values[&field.name] else {
                unreachable!("vec2 group field must carry a Vec2 value")
            };
            into.write_vec2(v);
        }

        let vec3_mask = self.vec3s.mask_for(&input.values);
        self.vec3s.write_mask(into, vec3_mask);
        for (bit, field) in self.vec3s.fields.iter().enumerate() {
            if vec3_mask & (1 << bit) == 0 {
                continue;
            }
            let InputFieldValue::Vec3(v) = input.values[&field.name] else {
                unreachable!("vec3 group field must carry a Vec3 value")
            };
            into.write_vec3(v);
        }

        Ok(())
    }

    /// Decodes an [`InputState`] previously written by [`Self::encode`].
    pub fn decode(&self, from: &mut Buffer) -> ReplicationResult<InputState> {
        let signature = from.read_u32()?;
        let has_input = from.read_bool()?;
        let mut state = InputState::empty(signature);
        if !has_input {
            return Ok(state);
        }

        if self.use_mouse_relative {
            state.mouse_relative = Some(from.read_vec2()?);
        }
        if self.use_mouse_speed {
            state.mouse_speed = Some(from.read_vec2()?);
        }

        let analog_mask = self.analogs.read_mask(from)?;
        for (bit, field) in self.analogs.fields.iter().enumerate() {
            if analog_mask & (1 << bit) == 0 {
                continue;
            }
            let value = self.read_analog(from)?;
            state
                .values
                .insert(field.name.clone(), InputFieldValue::Analog(value));
        }

        let bool_mask = self.booleans.read_mask(from)?;
        for (bit, field) in self.booleans.fields.iter().enumerate() {
            if bool_mask & (1 << bit) == 0 {
                continue;
            }
            state
                .values
                .insert(field.name.clone(), InputFieldValue::Bool(true));
        }

        let vec2_mask = self.vec2s.read_mask(from)?;
        for (bit, field) in self.vec2s.fields.iter().enumerate() {
            if vec2_mask & (1 << bit) == 0 {
                continue;
            }
            let value = from.read_vec2()?;
            state
                .values
                .insert(field.name.clone(), InputFieldValue::Vec2(value));
        }

        let vec3_mask = self.vec3s.read_mask(from)?;
        for (bit, field) in self.vec3s.fields.iter().enumerate() {
            if vec3_mask & (1 << bit) == 0 {
                continue;
            }
            let value = from.read_vec3()?;
            state
                .values
                .insert(field.name.clone(), InputFieldValue::Vec3(value));
        }

        Ok(state)
    }

    /// Encodes a full input packet: a `u16` count followed by each
    /// record in order, used when a client batches more than one
    /// unacknowledged input into a single send.
    pub fn encode_packet(&self, inputs: &[InputState], into: &mut Buffer) -> ReplicationResult<()> {
        into.write_u16(u16::try_from(inputs.len()).unwrap_or(u16::MAX));
        for input in inputs {
            self.encode(input, into)?;
        }
        Ok(())
    }

    /// Decodes a full input packet previously written by
    /// [`Self::encode_packet`].
    pub fn decode_packet(&self, from: &mut Buffer) -> ReplicationResult<Vec<InputState>> {
        let count = from.read_u16()?;
        let mut inputs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            inputs.push(self.decode(from)?);
        }
        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_codec() -> InputCodec {
        InputCodec::new(
            vec![
                InputFieldSpec {
                    name: "jump".to_string(),
                    kind: InputFieldKind::Bool,
                },
                InputFieldSpec {
                    name: "move".to_string(),
                    kind: InputFieldKind::Vec2,
                },
                InputFieldSpec {
                    name: "throttle".to_string(),
                    kind: InputFieldKind::Analog,
                },
            ],
            false,
            false,
            false,
        )
    }

    #[test]
    fn empty_input_encodes_to_preamble_only() {
        let codec = sample_codec();
        let input = InputState::empty(7);
        let mut buf = Buffer::new();
        codec.encode(&input, &mut buf).unwrap();
        // u32 signature (4) + bool has_input (1) = 5 bytes, nothing else.
        assert_eq!(buf.len(), 5);

        let mut read = Buffer::from_bytes(buf.into_bytes());
        let decoded = codec.decode(&mut read).unwrap();
        assert_eq!(decoded.signature, 7);
        assert!(!decoded.has_input());
    }

    #[test]
    fn each_group_carries_its_own_mask() {
        let codec = sample_codec();
        let mut input = InputState::empty(1);
        input
            .values
            .insert("jump".to_string(), InputFieldValue::Bool(true));
        let mut buf = Buffer::new();
        codec.encode(&input, &mut buf).unwrap();

        let mut read = Buffer::from_bytes(buf.into_bytes());
        let decoded = codec.decode(&mut read).unwrap();
        assert_eq!(decoded.values.len(), 1);
        assert_eq!(decoded.values["jump"], InputFieldValue::Bool(true));
    }

    #[test]
    fn quantized_analog_round_trips_within_one_step() {
        let codec = InputCodec::new(
            vec![InputFieldSpec {
                name: "throttle".to_string(),
                kind: InputFieldKind::Analog,
            }],
            false,
            false,
            true,
        );
        let mut input = InputState::empty(1);
        input
            .values
            .insert("throttle".to_string(), InputFieldValue::Analog(0.5));
        let mut buf = Buffer::new();
        codec.encode(&input, &mut buf).unwrap();

        let mut read = Buffer::from_bytes(buf.into_bytes());
        let decoded = codec.decode(&mut read).unwrap();
        let InputFieldValue::Analog(v) = decoded.values["throttle"] else {
            panic!("expected analog value");
        };
        assert!((v - 0.5).abs() < 0.01);
    }

    #[test]
    fn packet_round_trips_multiple_records() {
        let codec = sample_codec();
        let mut a = InputState::empty(1);
        a.values
            .insert("jump".to_string(), InputFieldValue::Bool(true));
        let b = InputState::empty(2);

        let mut buf = Buffer::new();
        codec.encode_packet(&[a.clone(), b.clone()], &mut buf).unwrap();
        let mut read = Buffer::from_bytes(buf.into_bytes());
        let decoded = codec.decode_packet(&mut read).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].signature, 1);
        assert_eq!(decoded[1].signature, 2);
        assert!(decoded[0].has_input());
        assert!(!decoded[1].has_input());
    }

    #[test]
    fn mouse_fields_round_trip_when_enabled() {
        let codec = InputCodec::new(vec![], true, true, false);
        let mut input = InputState::empty(3);
        input.mouse_relative = Some(Vec2::new(1.0, -1.0));
        input.mouse_speed = Some(Vec2::new(2.0, 0.5));
        let mut buf = Buffer::new();
        codec.encode(&input, &mut buf).unwrap();

        let mut read = Buffer::from_bytes(buf.into_bytes());
        let decoded = codec.decode(&mut read).unwrap();
        assert_eq!(decoded.mouse_relative, Some(Vec2::new(1.0, -1.0)));
        assert_eq!(decoded.mouse_speed, Some(Vec2::new(2.0, 0.5)));
    }
}
