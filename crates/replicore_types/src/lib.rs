//! # Replicore Types
//!
//! Small, `Pod`-friendly value types shared by the codec, the quantizer and
//! the snapshot model: vectors, a rectangle, a rotation quaternion and a
//! color. None of these carry engine-specific behavior; they exist so the
//! wire formats in `replicore_net` have something concrete to read and
//! write.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

use bytemuck::{Pod, Zeroable};

/// A 2-component float vector.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vec2 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
}

impl Vec2 {
    /// Builds a vector from its components.
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A 3-component float vector.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vec3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl Vec3 {
    /// Builds a vector from its components.
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// An axis-aligned rectangle described by its origin and size.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Rect2 {
    /// Origin X.
    pub x: f32,
    /// Origin Y.
    pub y: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

impl Rect2 {
    /// Builds a rectangle from origin and size.
    #[must_use]
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }
}

/// A rotation quaternion, `x*i + y*j + z*k + w`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Quat {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
    /// W (scalar) component.
    pub w: f32,
}

impl Quat {
    /// Builds a quaternion from its components.
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// The identity rotation.
    #[must_use]
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// Component access by index, used by the smallest-three quantizer to
    /// iterate over and reconstruct components generically.
    #[must_use]
    pub fn component(&self, index: u8) -> f32 {
        match index {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            _ => self.w,
        }
    }

    /// Rescales the quaternion to unit length.
    #[must_use]
    pub fn normalized_approx(&self) -> Self {
        let len = (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt();
        Self::new(self.x / len, self.y / len, self.z / len, self.w / len)
    }

    /// Rebuilds a quaternion from three retained components plus the index
    /// of the dropped (largest-magnitude) one and its reconstructed value.
    #[must_use]
    pub fn from_dropped(retained: [f32; 3], dropped_index: u8, dropped_value: f32) -> Self {
        let mut comps = [0.0f32; 4];
        let mut r = retained.iter();
        for (i, slot) in comps.iter_mut().enumerate() {
            if i as u8 == dropped_index {
                *slot = dropped_value;
            } else {
                *slot = *r.next().expect("exactly three retained components");
            }
        }
        Self::new(comps[0], comps[1], comps[2], comps[3])
    }
}

/// An RGBA color with components in `[0, 1]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl Color {
    /// Builds a color from its components.
    #[must_use]
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quat_roundtrips_through_dropped_component() {
        let q = Quat::new(0.1, 0.2, 0.9, 0.3);
        let retained = [q.component(0), q.component(1), q.component(3)];
        let rebuilt = Quat::from_dropped(retained, 2, q.z);
        assert_eq!(rebuilt, q);
    }

    #[test]
    fn vec3_pod_roundtrip() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let bytes = bytemuck::bytes_of(&v);
        let back: Vec3 = *bytemuck::from_bytes(bytes);
        assert_eq!(v, back);
    }
}
