//! Unit-float quantization and smallest-three rotation compression.

use replicore_types::Quat;

/// `sqrt(1/2)`. The magnitude any retained smallest-three component can
/// reach once the largest component has been dropped and the rest are
/// scaled back into range.
const ROTATION_BOUNDS: f32 = 0.707_107_f32;

/// Quantizes a float known to be in `[0, 1]` into an integer with
/// `num_bits` of precision. Uses round-half-up (truncating `scaled + 0.5`)
/// and clamps down by one step if rounding pushed the value past the top
/// of the range.
#[must_use]
pub fn quantize_unit_float(value: f32, num_bits: u32) -> u32 {
    let intervals = 1u32 << num_bits;
    let scaled = value * (intervals - 1) as f32;
    let mut rounded = (scaled + 0.5) as u32;
    if rounded > intervals - 1 {
        rounded -= 1;
    }
    rounded
}

/// Restores a float in `[0, 1]` from a value quantized with
/// [`quantize_unit_float`] using the same `num_bits`.
#[must_use]
pub fn restore_unit_float(quantized: u32, num_bits: u32) -> f32 {
    let intervals = 1u32 << num_bits;
    let interval_size = 1.0 / (intervals - 1) as f32;
    quantized as f32 * interval_size
}

/// Quantizes a float within an arbitrary `[minval, maxval]` range by
/// rescaling it into `[0, 1]` first.
#[must_use]
pub fn quantize_float(value: f32, minval: f32, maxval: f32, num_bits: u32) -> u32 {
    let unit = (value - minval) / (maxval - minval);
    quantize_unit_float(unit, num_bits)
}

/// Restores a float within an arbitrary `[minval, maxval]` range.
#[must_use]
pub fn restore_float(quantized: u32, minval: f32, maxval: f32, num_bits: u32) -> f32 {
    let unit = restore_unit_float(quantized, num_bits);
    minval + unit * (maxval - minval)
}

/// The smallest-three decomposition of a rotation quaternion: the three
/// retained components (already rescaled into `[-ROTATION_BOUNDS,
/// ROTATION_BOUNDS]`), the index `[0..=3]` of the dropped (largest
/// magnitude) component, and that component's sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizedRotation {
    /// The three retained components, in ascending component-index order
    /// (skipping `dropped_index`).
    pub retained: [f32; 3],
    /// Index of the dropped, largest-magnitude component.
    pub dropped_index: u8,
    /// Sign of the dropped component before it was dropped: `1` or `-1`.
    pub sign: i8,
}

/// Decomposes a rotation quaternion using the smallest-three method: find
/// the largest-magnitude component, drop it (it is always reconstructible
/// since the quaternion is unit-length), and rescale the rest by the
/// dropped component's sign so they land in `[-ROTATION_BOUNDS,
/// ROTATION_BOUNDS]`.
#[must_use]
pub fn quantize_rotation(q: Quat) -> QuantizedRotation {
    let comps = [q.x, q.y, q.z, q.w];
    let mut dropped_index = 0u8;
    let mut largest = comps[0].abs();
    for (i, c) in comps.iter().enumerate().skip(1) {
        if c.abs() > largest {
            largest = c.abs();
            dropped_index = i as u8;
        }
    }
    let sign: i8 = if comps[dropped_index as usize] < 0.0 {
        -1
    } else {
        1
    };

    let mut retained = [0.0f32; 3];
    let mut slot = 0;
    for (i, c) in comps.iter().enumerate() {
        if i as u8 == dropped_index {
            continue;
        }
        retained[slot] = c * f32::from(sign);
        slot += 1;
    }

    QuantizedRotation {
        retained,
        dropped_index,
        sign,
    }
}

/// Reconstructs a unit rotation quaternion from a [`QuantizedRotation`].
/// The dropped component's magnitude follows from the unit-length
/// constraint; its sign, and the sign of the retained components, are
/// both restored by multiplying through by `sign` — undoing the same
/// flip [`quantize_rotation`] applied going in, so the two cancel out.
#[must_use]
pub fn restore_rotation(q: QuantizedRotation) -> Quat {
    let sign = f32::from(q.sign);
    let [a, b, c] = q.retained;
    let sum_sq = a * a + b * b + c * c;
    let dropped_magnitude = (1.0 - sum_sq).max(0.0).sqrt();
    let dropped_value = dropped_magnitude * sign;
    Quat::from_dropped([a * sign, b * sign, c * sign], q.dropped_index, dropped_value)
}

/// Packs a [`QuantizedRotation`] into a single `u32` using 9 bits per
/// retained component (quantized against `[-ROTATION_BOUNDS,
/// ROTATION_BOUNDS]`), 2 bits for the dropped-component index, and 1 bit
/// for its sign — 29 of the 32 bits used.
#[must_use]
pub fn pack_rotation_9bit(q: QuantizedRotation) -> u32 {
    let qa = quantize_float(q.retained[0], -ROTATION_BOUNDS, ROTATION_BOUNDS, 9);
    let qb = quantize_float(q.retained[1], -ROTATION_BOUNDS, ROTATION_BOUNDS, 9);
    let qc = quantize_float(q.retained[2], -ROTATION_BOUNDS, ROTATION_BOUNDS, 9);
    let signal = u32::from(q.sign < 0);
    qa | (qb << 9) | (qc << 18) | (u32::from(q.dropped_index) << 27) | (signal << 30)
}

/// Unpacks a rotation packed with [`pack_rotation_9bit`].
#[must_use]
pub fn unpack_rotation_9bit(packed: u32) -> QuantizedRotation {
    const MASK_9: u32 = 511;
    let qa = packed & MASK_9;
    let qb = (packed >> 9) & MASK_9;
    let qc = (packed >> 18) & MASK_9;
    let dropped_index = ((packed >> 27) & 3) as u8;
    let sign: i8 = if (packed >> 30) & 1 == 1 { -1 } else { 1 };
    QuantizedRotation {
        retained: [
            restore_float(qa, -ROTATION_BOUNDS, ROTATION_BOUNDS, 9),
            restore_float(qb, -ROTATION_BOUNDS, ROTATION_BOUNDS, 9),
            restore_float(qc, -ROTATION_BOUNDS, ROTATION_BOUNDS, 9),
        ],
        dropped_index,
        sign,
    }
}

/// Packs a [`QuantizedRotation`] into a single `u32` using 10 bits per
/// retained component. All 30 bits are data; there is no room left for
/// the dropped component's sign, so the restored quaternion may come back
/// negated (`q` and `-q` represent the same rotation, so this is not
/// observable as a visual difference).
#[must_use]
pub fn pack_rotation_10bit(q: QuantizedRotation) -> u32 {
    let qa = quantize_float(q.retained[0], -ROTATION_BOUNDS, ROTATION_BOUNDS, 10);
    let qb = quantize_float(q.retained[1], -ROTATION_BOUNDS, ROTATION_BOUNDS, 10);
    let qc = quantize_float(q.retained[2], -ROTATION_BOUNDS, ROTATION_BOUNDS, 10);
    qa | (qb << 10) | (qc << 20) | (u32::from(q.dropped_index) << 30)
}

/// Unpacks a rotation packed with [`pack_rotation_10bit`]. Sign is always
/// restored as positive since 10-bit packing does not retain it.
#[must_use]
pub fn unpack_rotation_10bit(packed: u32) -> QuantizedRotation {
    const MASK_10: u32 = 1023;
    let qa = packed & MASK_10;
    let qb = (packed >> 10) & MASK_10;
    let qc = (packed >> 20) & MASK_10;
    let dropped_index = ((packed >> 30) & 3) as u8;
    QuantizedRotation {
        retained: [
            restore_float(qa, -ROTATION_BOUNDS, ROTATION_BOUNDS, 10),
            restore_float(qb, -ROTATION_BOUNDS, ROTATION_BOUNDS, 10),
            restore_float(qc, -ROTATION_BOUNDS, ROTATION_BOUNDS, 10),
        ],
        dropped_index,
        sign: 1,
    }
}

/// Packs a [`QuantizedRotation`] into two `u32` words using 15 bits per
/// retained component: the first word holds two full 15-bit components
/// plus the dropped-component index, the second holds the third
/// component plus the dropped component's sign in its top bit. The
/// second word fits in 16 bits, which is the point of splitting it this
/// way for wire transmission.
#[must_use]
pub fn pack_rotation_15bit(q: QuantizedRotation) -> (u32, u16) {
    const MASK_15: u32 = 32767;
    let qa = quantize_float(q.retained[0], -ROTATION_BOUNDS, ROTATION_BOUNDS, 15) & MASK_15;
    let qb = quantize_float(q.retained[1], -ROTATION_BOUNDS, ROTATION_BOUNDS, 15) & MASK_15;
    let qc = quantize_float(q.retained[2], -ROTATION_BOUNDS, ROTATION_BOUNDS, 15) & MASK_15;
    let word0 = qa | (qb << 15) | (u32::from(q.dropped_index) << 30);
    let signal = u16::from(q.sign < 0) << 15;
    let word1 = (qc as u16) | signal;
    (word0, word1)
}

/// Unpacks a rotation packed with [`pack_rotation_15bit`].
#[must_use]
pub fn unpack_rotation_15bit(word0: u32, word1: u16) -> QuantizedRotation {
    const MASK_15: u32 = 32767;
    let qa = word0 & MASK_15;
    let qb = (word0 >> 15) & MASK_15;
    let qc = u32::from(word1) & MASK_15;
    let dropped_index = ((word0 >> 30) & 3) as u8;
    let sign: i8 = if (word1 >> 15) & 1 == 1 { -1 } else { 1 };
    QuantizedRotation {
        retained: [
            restore_float(qa, -ROTATION_BOUNDS, ROTATION_BOUNDS, 15),
            restore_float(qb, -ROTATION_BOUNDS, ROTATION_BOUNDS, 15),
            restore_float(qc, -ROTATION_BOUNDS, ROTATION_BOUNDS, 15),
        ],
        dropped_index,
        sign,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_float_round_trip_within_precision() {
        for bits in [9u32, 10, 15] {
            let value = 0.63_f32;
            let q = quantize_unit_float(value, bits);
            let r = restore_unit_float(q, bits);
            assert!((r - value).abs() < 1.0 / (1u32 << (bits - 2)) as f32);
        }
    }

    #[test]
    fn quantize_unit_float_clamps_overflow_down() {
        let q = quantize_unit_float(1.0, 9);
        assert_eq!(q, (1u32 << 9) - 1);
    }

    #[test]
    fn rotation_9bit_round_trips_approximately() {
        let q = Quat::new(0.1, 0.2, 0.3, 0.9165).normalized_approx();
        let decomposed = quantize_rotation(q);
        let packed = pack_rotation_9bit(decomposed);
        let unpacked = unpack_rotation_9bit(packed);
        let restored = restore_rotation(unpacked);
        assert!((restored.x - q.x).abs() < 0.05);
        assert!((restored.w - q.w).abs() < 0.05);
    }

    #[test]
    fn rotation_15bit_is_tighter_than_9bit() {
        let q = Quat::new(0.2, 0.3, 0.4, 0.8426).normalized_approx();
        let decomposed = quantize_rotation(q);

        let packed9 = pack_rotation_9bit(decomposed);
        let restored9 = restore_rotation(unpack_rotation_9bit(packed9));

        let (w0, w1) = pack_rotation_15bit(decomposed);
        let restored15 = restore_rotation(unpack_rotation_15bit(w0, w1));

        let err9 = (restored9.x - q.x).abs();
        let err15 = (restored15.x - q.x).abs();
        assert!(err15 <= err9);
    }

    #[test]
    fn rotation_round_trips_when_dropped_component_is_negative() {
        let q = Quat::new(0.1, 0.2, 0.3, -0.9165).normalized_approx();
        let decomposed = quantize_rotation(q);
        assert_eq!(decomposed.sign, -1);

        let restored9 = restore_rotation(unpack_rotation_9bit(pack_rotation_9bit(decomposed)));
        assert!((restored9.x - q.x).abs() < 0.05);
        assert!((restored9.w - q.w).abs() < 0.05);

        let (w0, w1) = pack_rotation_15bit(decomposed);
        let restored15 = restore_rotation(unpack_rotation_15bit(w0, w1));
        assert!((restored15.x - q.x).abs() < 0.01);
        assert!((restored15.w - q.w).abs() < 0.01);
    }
}
