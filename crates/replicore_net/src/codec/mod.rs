//! Cursor-based binary codec buffer.
//!
//! A single growable byte buffer that is written to by appending, read from
//! through a cursor that advances as values are consumed, and supports
//! rewriting a previously-written region in place (used to back-patch
//! placeholder counts and flags once the real value is known).

mod quantize;

pub use quantize::{
    pack_rotation_9bit, pack_rotation_10bit, pack_rotation_15bit, quantize_float,
    quantize_rotation, quantize_unit_float, restore_float, restore_rotation, restore_unit_float,
    unpack_rotation_9bit, unpack_rotation_10bit, unpack_rotation_15bit, QuantizedRotation,
};

use crate::error::{ReplicationError, ReplicationResult};
use replicore_types::{Color, Quat, Rect2, Vec2, Vec3};

/// Maximum length, in elements, of an array-typed field. Matches the wire
/// format's single-byte length prefix.
pub const MAX_ARRAY_LEN: usize = u8::MAX as usize;

/// A growable byte buffer with an independent write-append cursor, a
/// read cursor, and offset-addressed rewriting.
///
/// Writes always append at the end of the buffer; reads always advance
/// from the current read position. The two cursors are independent so a
/// buffer produced by one tick's worth of writes can be read back by a
/// second pass (e.g. a local loopback test) without resetting state.
#[derive(Debug, Default, Clone)]
pub struct Buffer {
    bytes: Vec<u8>,
    read_pos: usize,
}

impl Buffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            read_pos: 0,
        }
    }

    /// Wraps an existing byte vector for reading, with the read cursor at
    /// the start.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes, read_pos: 0 }
    }

    /// Clears the buffer and resets both cursors. Reused across ticks to
    /// avoid reallocating.
    pub fn reset(&mut self) {
        self.bytes.clear();
        self.read_pos = 0;
    }

    /// Number of bytes currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True if the read cursor has not yet reached the end of the buffer.
    #[must_use]
    pub fn has_read_data(&self) -> bool {
        self.read_pos < self.bytes.len()
    }

    /// Current write position — the offset the next append will land at.
    /// Capturing this before writing a placeholder is how back-patching
    /// later finds the right spot, rather than hardcoding an offset.
    #[must_use]
    pub fn write_cursor(&self) -> usize {
        self.bytes.len()
    }

    /// Borrows the full contents, e.g. to hand off to a transport.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the buffer, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    fn append(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    fn rewrite_at(&mut self, at: usize, data: &[u8]) -> ReplicationResult<()> {
        if at + data.len() > self.bytes.len() {
            return Err(ReplicationError::CodecOutOfRange {
                offset: at,
                requested: data.len(),
                size: self.bytes.len(),
            });
        }
        self.bytes[at..at + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn take(&mut self, count: usize) -> ReplicationResult<&[u8]> {
        if self.read_pos + count > self.bytes.len() {
            return Err(ReplicationError::CodecOutOfRange {
                offset: self.read_pos,
                requested: count,
                size: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.read_pos..self.read_pos + count];
        self.read_pos += count;
        Ok(slice)
    }

    // -- bool ---------------------------------------------------------

    /// Appends a boolean, encoded as a single byte.
    pub fn write_bool(&mut self, value: bool) {
        self.append(&[u8::from(value)]);
    }

    /// Rewrites a previously-written boolean.
    pub fn rewrite_bool(&mut self, value: bool, at: usize) -> ReplicationResult<()> {
        self.rewrite_at(at, &[u8::from(value)])
    }

    /// Reads a boolean, advancing the read cursor.
    pub fn read_bool(&mut self) -> ReplicationResult<bool> {
        Ok(self.take(1)?[0] != 0)
    }

    // -- i32 ------------------------------------------------------------

    /// Appends a signed 32-bit integer, little-endian.
    pub fn write_i32(&mut self, value: i32) {
        self.append(&value.to_le_bytes());
    }

    /// Rewrites a previously-written `i32`.
    pub fn rewrite_i32(&mut self, value: i32, at: usize) -> ReplicationResult<()> {
        self.rewrite_at(at, &value.to_le_bytes())
    }

    /// Reads an `i32`, advancing the read cursor.
    pub fn read_i32(&mut self) -> ReplicationResult<i32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().expect("4 bytes taken");
        Ok(i32::from_le_bytes(bytes))
    }

    // -- f32 --------------------------------------------------------------

    /// Appends a 32-bit float, little-endian.
    pub fn write_f32(&mut self, value: f32) {
        self.append(&value.to_le_bytes());
    }

    /// Rewrites a previously-written `f32`.
    pub fn rewrite_f32(&mut self, value: f32, at: usize) -> ReplicationResult<()> {
        self.rewrite_at(at, &value.to_le_bytes())
    }

    /// Reads an `f32`, advancing the read cursor.
    pub fn read_f32(&mut self) -> ReplicationResult<f32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().expect("4 bytes taken");
        Ok(f32::from_le_bytes(bytes))
    }

    // -- u8 / u16 / u32 -----------------------------------------------

    /// Appends a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.append(&[value]);
    }

    /// Rewrites a previously-written byte.
    pub fn rewrite_u8(&mut self, value: u8, at: usize) -> ReplicationResult<()> {
        self.rewrite_at(at, &[value])
    }

    /// Reads a byte, advancing the read cursor.
    pub fn read_u8(&mut self) -> ReplicationResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Appends an unsigned 16-bit integer, little-endian.
    pub fn write_u16(&mut self, value: u16) {
        self.append(&value.to_le_bytes());
    }

    /// Rewrites a previously-written `u16`.
    pub fn rewrite_u16(&mut self, value: u16, at: usize) -> ReplicationResult<()> {
        self.rewrite_at(at, &value.to_le_bytes())
    }

    /// Reads a `u16`, advancing the read cursor.
    pub fn read_u16(&mut self) -> ReplicationResult<u16> {
        let bytes: [u8; 2] = self.take(2)?.try_into().expect("2 bytes taken");
        Ok(u16::from_le_bytes(bytes))
    }

    /// Appends an unsigned 32-bit integer, little-endian.
    pub fn write_u32(&mut self, value: u32) {
        self.append(&value.to_le_bytes());
    }

    /// Rewrites a previously-written `u32`. This is the back-patch
    /// primitive used to fill in counts and flags whose value is only
    /// known after scanning ahead: callers must capture [`Buffer::write_cursor`]
    /// before writing the placeholder and pass that captured offset here,
    /// never a literal constant.
    pub fn rewrite_u32(&mut self, value: u32, at: usize) -> ReplicationResult<()> {
        self.rewrite_at(at, &value.to_le_bytes())
    }

    /// Reads a `u32`, advancing the read cursor.
    pub fn read_u32(&mut self) -> ReplicationResult<u32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().expect("4 bytes taken");
        Ok(u32::from_le_bytes(bytes))
    }

    // -- vectors / rect / quat / color --------------------------------

    /// Appends a `Vec2`.
    pub fn write_vec2(&mut self, value: Vec2) {
        self.write_f32(value.x);
        self.write_f32(value.y);
    }

    /// Rewrites a previously-written `Vec2`.
    pub fn rewrite_vec2(&mut self, value: Vec2, at: usize) -> ReplicationResult<()> {
        self.rewrite_f32(value.x, at)?;
        self.rewrite_f32(value.y, at + 4)
    }

    /// Reads a `Vec2`, advancing the read cursor.
    pub fn read_vec2(&mut self) -> ReplicationResult<Vec2> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        Ok(Vec2::new(x, y))
    }

    /// Appends a `Rect2`.
    pub fn write_rect2(&mut self, value: Rect2) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.w);
        self.write_f32(value.h);
    }

    /// Rewrites a previously-written `Rect2`.
    pub fn rewrite_rect2(&mut self, value: Rect2, at: usize) -> ReplicationResult<()> {
        self.rewrite_f32(value.x, at)?;
        self.rewrite_f32(value.y, at + 4)?;
        self.rewrite_f32(value.w, at + 8)?;
        self.rewrite_f32(value.h, at + 12)
    }

    /// Reads a `Rect2`, advancing the read cursor.
    pub fn read_rect2(&mut self) -> ReplicationResult<Rect2> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let w = self.read_f32()?;
        let h = self.read_f32()?;
        Ok(Rect2::new(x, y, w, h))
    }

    /// Appends a `Vec3`.
    pub fn write_vec3(&mut self, value: Vec3) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
    }

    /// Rewrites a previously-written `Vec3`.
    pub fn rewrite_vec3(&mut self, value: Vec3, at: usize) -> ReplicationResult<()> {
        self.rewrite_f32(value.x, at)?;
        self.rewrite_f32(value.y, at + 4)?;
        self.rewrite_f32(value.z, at + 8)
    }

    /// Reads a `Vec3`, advancing the read cursor. Returns the three
    /// components in `(x, y, z)` order.
    pub fn read_vec3(&mut self) -> ReplicationResult<Vec3> {
        let aux = [self.read_f32()?, self.read_f32()?, self.read_f32()?];
        Ok(Vec3::new(aux[0], aux[1], aux[2]))
    }

    /// Appends a `Quat`.
    pub fn write_quat(&mut self, value: Quat) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
        self.write_f32(value.w);
    }

    /// Rewrites a previously-written `Quat`.
    pub fn rewrite_quat(&mut self, value: Quat, at: usize) -> ReplicationResult<()> {
        self.rewrite_f32(value.x, at)?;
        self.rewrite_f32(value.y, at + 4)?;
        self.rewrite_f32(value.z, at + 8)?;
        self.rewrite_f32(value.w, at + 12)
    }

    /// Reads a `Quat`, advancing the read cursor.
    pub fn read_quat(&mut self) -> ReplicationResult<Quat> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let z = self.read_f32()?;
        let w = self.read_f32()?;
        Ok(Quat::new(x, y, z, w))
    }

    /// Appends a `Color`.
    pub fn write_color(&mut self, value: Color) {
        self.write_f32(value.r);
        self.write_f32(value.g);
        self.write_f32(value.b);
        self.write_f32(value.a);
    }

    /// Rewrites a previously-written `Color`.
    pub fn rewrite_color(&mut self, value: Color, at: usize) -> ReplicationResult<()> {
        self.rewrite_f32(value.r, at)?;
        self.rewrite_f32(value.g, at + 4)?;
        self.rewrite_f32(value.b, at + 8)?;
        self.rewrite_f32(value.a, at + 12)
    }

    /// Reads a `Color`, advancing the read cursor.
    pub fn read_color(&mut self) -> ReplicationResult<Color> {
        let r = self.read_f32()?;
        let g = self.read_f32()?;
        let b = self.read_f32()?;
        let a = self.read_f32()?;
        Ok(Color::new(r, g, b, a))
    }

    // -- string / arrays ------------------------------------------------

    /// Appends a UTF-8 string as a `u32` byte-length prefix followed by
    /// its bytes, no trailing NUL. Strings are never rewritten in place: a
    /// changed string almost never keeps the same encoded length.
    pub fn write_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        self.write_u32(bytes.len() as u32);
        self.append(bytes);
    }

    /// Reads a length-prefixed UTF-8 string, advancing the read cursor.
    pub fn read_string(&mut self) -> ReplicationResult<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?.to_vec();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Appends a byte array as a `u8` length prefix followed by its
    /// elements. Returns an error if the array is longer than
    /// [`MAX_ARRAY_LEN`].
    pub fn write_byte_array(&mut self, field: &str, value: &[u8]) -> ReplicationResult<()> {
        if value.len() > MAX_ARRAY_LEN {
            return Err(ReplicationError::ArrayTooLong {
                field: field.to_string(),
                len: value.len(),
                max: MAX_ARRAY_LEN,
            });
        }
        self.write_u8(value.len() as u8);
        self.append(value);
        Ok(())
    }

    /// Reads a byte array written by [`Buffer::write_byte_array`].
    pub fn read_byte_array(&mut self) -> ReplicationResult<Vec<u8>> {
        let len = self.read_u8()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Appends an `i32` array as a `u8` length prefix followed by its
    /// elements. Returns an error if the array is longer than
    /// [`MAX_ARRAY_LEN`].
    pub fn write_int_array(&mut self, field: &str, value: &[i32]) -> ReplicationResult<()> {
        if value.len() > MAX_ARRAY_LEN {
            return Err(ReplicationError::ArrayTooLong {
                field: field.to_string(),
                len: value.len(),
                max: MAX_ARRAY_LEN,
            });
        }
        self.write_u8(value.len() as u8);
        for v in value {
            self.write_i32(*v);
        }
        Ok(())
    }

    /// Reads an `i32` array written by [`Buffer::write_int_array`].
    pub fn read_int_array(&mut self) -> ReplicationResult<Vec<i32>> {
        let len = self.read_u8()? as usize;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.read_i32()?);
        }
        Ok(out)
    }

    /// Appends an `f32` array as a `u8` length prefix followed by its
    /// elements. Returns an error if the array is longer than
    /// [`MAX_ARRAY_LEN`].
    pub fn write_float_array(&mut self, field: &str, value: &[f32]) -> ReplicationResult<()> {
        if value.len() > MAX_ARRAY_LEN {
            return Err(ReplicationError::ArrayTooLong {
                field: field.to_string(),
                len: value.len(),
                max: MAX_ARRAY_LEN,
            });
        }
        self.write_u8(value.len() as u8);
        for v in value {
            self.write_f32(*v);
        }
        Ok(())
    }

    /// Reads an `f32` array written by [`Buffer::write_float_array`].
    /// Kept as a distinct case from [`Buffer::read_int_array`] rather than
    /// falling through a shared branch, since the two element types decode
    /// differently.
    pub fn read_float_array(&mut self) -> ReplicationResult<Vec<f32>> {
        let len = self.read_u8()? as usize;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.read_f32()?);
        }
        Ok(out)
    }
}
