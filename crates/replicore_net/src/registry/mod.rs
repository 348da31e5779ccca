//! Property descriptors, comparers and the entity-type registry.

mod comparer;

pub use comparer::{Comparer, ComparerRegistry};

use crate::codec::Buffer;
use crate::error::{ReplicationError, ReplicationResult};
use replicore_types::{Color, Quat, Rect2, Vec2, Vec3};
use std::collections::HashMap;

/// The wire type of a replicable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `bool`.
    Bool,
    /// `i32`.
    I32,
    /// `f32`.
    F32,
    /// `u8`.
    U8,
    /// `u16`.
    U16,
    /// `u32`.
    U32,
    /// [`replicore_types::Vec2`].
    Vec2,
    /// [`replicore_types::Vec3`].
    Vec3,
    /// [`replicore_types::Rect2`].
    Rect2,
    /// [`replicore_types::Quat`].
    Quat,
    /// [`replicore_types::Color`].
    Color,
    /// `String`.
    String,
    /// `Vec<u8>`.
    ByteArray,
    /// `Vec<i32>`.
    IntArray,
    /// `Vec<f32>`.
    FloatArray,
}

/// A concrete value of a replicable field, tagged by [`FieldType`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// See [`FieldType::Bool`].
    Bool(bool),
    /// See [`FieldType::I32`].
    I32(i32),
    /// See [`FieldType::F32`].
    F32(f32),
    /// See [`FieldType::U8`].
    U8(u8),
    /// See [`FieldType::U16`].
    U16(u16),
    /// See [`FieldType::U32`].
    U32(u32),
    /// See [`FieldType::Vec2`].
    Vec2(Vec2),
    /// See [`FieldType::Vec3`].
    Vec3(Vec3),
    /// See [`FieldType::Rect2`].
    Rect2(Rect2),
    /// See [`FieldType::Quat`].
    Quat(Quat),
    /// See [`FieldType::Color`].
    Color(Color),
    /// See [`FieldType::String`].
    String(String),
    /// See [`FieldType::ByteArray`].
    ByteArray(Vec<u8>),
    /// See [`FieldType::IntArray`].
    IntArray(Vec<i32>),
    /// See [`FieldType::FloatArray`].
    FloatArray(Vec<f32>),
}

impl FieldValue {
    /// The [`FieldType`] tag of this value.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::I32(_) => FieldType::I32,
            FieldValue::F32(_) => FieldType::F32,
            FieldValue::U8(_) => FieldType::U8,
            FieldValue::U16(_) => FieldType::U16,
            FieldValue::U32(_) => FieldType::U32,
            FieldValue::Vec2(_) => FieldType::Vec2,
            FieldValue::Vec3(_) => FieldType::Vec3,
            FieldValue::Rect2(_) => FieldType::Rect2,
            FieldValue::Quat(_) => FieldType::Quat,
            FieldValue::Color(_) => FieldType::Color,
            FieldValue::String(_) => FieldType::String,
            FieldValue::ByteArray(_) => FieldType::ByteArray,
            FieldValue::IntArray(_) => FieldType::IntArray,
            FieldValue::FloatArray(_) => FieldType::FloatArray,
        }
    }

    /// Encodes this value into `into`, using `name` only for the
    /// `ArrayTooLong` error message on array-typed fields.
    pub fn encode(&self, name: &str, into: &mut Buffer) -> ReplicationResult<()> {
        match self {
            FieldValue::Bool(v) => into.write_bool(*v),
            FieldValue::I32(v) => into.write_i32(*v),
            FieldValue::F32(v) => into.write_f32(*v),
            FieldValue::U8(v) => into.write_u8(*v),
            FieldValue::U16(v) => into.write_u16(*v),
            FieldValue::U32(v) => into.write_u32(*v),
            FieldValue::Vec2(v) => into.write_vec2(*v),
            FieldValue::Vec3(v) => into.write_vec3(*v),
            FieldValue::Rect2(v) => into.write_rect2(*v),
            FieldValue::Quat(v) => into.write_quat(*v),
            FieldValue::Color(v) => into.write_color(*v),
            FieldValue::String(v) => into.write_string(v),
            FieldValue::ByteArray(v) => into.write_byte_array(name, v)?,
            FieldValue::IntArray(v) => into.write_int_array(name, v)?,
            FieldValue::FloatArray(v) => into.write_float_array(name, v)?,
        }
        Ok(())
    }

    /// Decodes a value of the given [`FieldType`] from `from`. Each case
    /// is handled explicitly — in particular `IntArray` and `FloatArray`
    /// never share a branch, since their element widths differ.
    pub fn decode(field_type: FieldType, from: &mut Buffer) -> ReplicationResult<Self> {
        Ok(match field_type {
            FieldType::Bool => FieldValue::Bool(from.read_bool()?),
            FieldType::I32 => FieldValue::I32(from.read_i32()?),
            FieldType::F32 => FieldValue::F32(from.read_f32()?),
            FieldType::U8 => FieldValue::U8(from.read_u8()?),
            FieldType::U16 => FieldValue::U16(from.read_u16()?),
            FieldType::U32 => FieldValue::U32(from.read_u32()?),
            FieldType::Vec2 => FieldValue::Vec2(from.read_vec2()?),
            FieldType::Vec3 => FieldValue::Vec3(from.read_vec3()?),
            FieldType::Rect2 => FieldValue::Rect2(from.read_rect2()?),
            FieldType::Quat => FieldValue::Quat(from.read_quat()?),
            FieldType::Color => FieldValue::Color(from.read_color()?),
            FieldType::String => FieldValue::String(from.read_string()?),
            FieldType::ByteArray => FieldValue::ByteArray(from.read_byte_array()?),
            FieldType::IntArray => FieldValue::IntArray(from.read_int_array()?),
            FieldType::FloatArray => FieldValue::FloatArray(from.read_float_array()?),
        })
    }
}

/// Describes one replicable field of an entity type: its name, wire type,
/// bit position within the entity's change mask, and the comparer used to
/// decide whether it changed between two snapshots.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name, used for error messages and custom-property lookups.
    pub name: String,
    /// Wire type of the field.
    pub field_type: FieldType,
    /// Bit position `[0, 31]` within the entity's change mask, assigned in
    /// declaration order starting at 0. `uid` never occupies a bit (it is
    /// always present on the wire, never conditionally written); when the
    /// type carries `class_hash`, that field takes the bit immediately
    /// after the last declared field's (see
    /// [`EntityTypeDescriptor::class_hash_bit`]).
    pub bit: u8,
    /// Comparer used to detect changes for this field.
    pub comparer: Comparer,
}

/// The change-mask width, in bytes, selected from an entity type's field
/// count: one byte covers up to 8 fields, two up to 16, four up to 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeMaskWidth {
    /// One byte, up to 8 fields.
    One,
    /// Two bytes, up to 16 fields.
    Two,
    /// Four bytes, up to 32 fields.
    Four,
}

impl ChangeMaskWidth {
    /// Selects the smallest width that can address `field_count` fields.
    #[must_use]
    pub fn for_field_count(field_count: usize) -> Self {
        if field_count <= 8 {
            ChangeMaskWidth::One
        } else if field_count <= 16 {
            ChangeMaskWidth::Two
        } else {
            ChangeMaskWidth::Four
        }
    }

    /// Width in bytes.
    #[must_use]
    pub fn bytes(self) -> usize {
        match self {
            ChangeMaskWidth::One => 1,
            ChangeMaskWidth::Two => 2,
            ChangeMaskWidth::Four => 4,
        }
    }
}

/// The maximum number of replicable fields a single entity type may
/// declare; beyond this, the 4-byte change mask can no longer address
/// every field by a distinct bit. When the type also carries
/// `class_hash`, that field claims the bit right after the last declared
/// field, so such a type is limited to 31 declared fields — `register`
/// enforces the exact bound.
pub const MAX_FIELDS_PER_ENTITY_TYPE: usize = 32;

/// Describes a registered entity type: its stable name hash, ordered
/// field list (which fixes each field's bit position), and whether its
/// records carry the reserved `class_hash` field.
#[derive(Debug, Clone)]
pub struct EntityTypeDescriptor {
    /// Stable hash of the type's name, used on the wire in place of the
    /// name itself.
    pub name_hash: u32,
    /// Human-readable name, kept for diagnostics.
    pub name: String,
    /// Ordered replicable fields. Position in this list matches position
    /// in an [`EntityRecord`](crate::snapshot::EntityRecord)'s `fields`
    /// vector; each field's `bit` is assigned to the same position, so
    /// the two coincide here, but callers should index by position and
    /// mask by `bit` rather than assume they stay interchangeable if this
    /// list is ever reordered independently of registration.
    pub fields: Vec<FieldDescriptor>,
    /// Whether entities of this type carry the reserved `class_hash`
    /// field in addition to their declared fields.
    pub has_class_hash: bool,
    /// Bit position of `class_hash` within the change mask, when
    /// `has_class_hash` is set. `class_hash` is written unconditionally in
    /// full snapshots, but in deltas it is gated by this bit like any
    /// other field, so a type migration (a rare event) costs a wire write
    /// instead of being carried on every update.
    pub class_hash_bit: Option<u8>,
    /// Change-mask width implied by the declared fields plus the
    /// `class_hash` bit, if present.
    pub change_mask_width: ChangeMaskWidth,
}

impl EntityTypeDescriptor {
    /// The change mask with every field bit set, plus the `class_hash`
    /// bit if present — used when encoding a newly-spawned entity, which
    /// replicates every field regardless of whether it differs from some
    /// default.
    #[must_use]
    pub fn full_change_mask(&self) -> u32 {
        let mut mask = 0u32;
        if let Some(bit) = self.class_hash_bit {
            mask |= 1u32 << bit;
        }
        for field in &self.fields {
            mask |= 1u32 << field.bit;
        }
        mask
    }
}

/// FNV-1a over UTF-8 bytes. Deterministic across processes and platforms,
/// which `name_hash` requires since it is compared between an
/// independently-started server and client.
#[must_use]
pub fn fnv1a_hash(name: &str) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for byte in name.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// A single field declaration used when registering an entity type.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Wire type.
    pub field_type: FieldType,
    /// `Some(tolerance)` for an absolute-tolerance float/vector comparer,
    /// `None` for an exact-equality comparer.
    pub tolerance: Option<f32>,
}

impl FieldSpec {
    /// Shorthand for an exact-equality field.
    #[must_use]
    pub fn exact(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            tolerance: None,
        }
    }

    /// Shorthand for an absolute-tolerance field.
    #[must_use]
    pub fn approx(name: &str, field_type: FieldType, tolerance: f32) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            tolerance: Some(tolerance),
        }
    }
}

/// The registry of known entity types, keyed by `name_hash`. Owns the
/// [`ComparerRegistry`] so equal `(type, tolerance)` comparers are shared
/// across every entity type that declares them.
#[derive(Debug, Default)]
pub struct EntityTypeRegistry {
    by_hash: HashMap<u32, EntityTypeDescriptor>,
    comparers: ComparerRegistry,
}

impl EntityTypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new entity type. Fails if the name is already
    /// registered, if it declares more than [`MAX_FIELDS_PER_ENTITY_TYPE`]
    /// fields, if `has_class_hash` is set and declaring one more field
    /// would leave no bit for `class_hash`, or if two fields share a name.
    pub fn register(
        &mut self,
        name: &str,
        fields: Vec<FieldSpec>,
        has_class_hash: bool,
    ) -> ReplicationResult<u32> {
        let name_hash = fnv1a_hash(name);
        if self.by_hash.contains_key(&name_hash) {
            tracing::warn!("registration refused: '{}' is already registered", name);
            return Err(ReplicationError::RegistrationError {
                name: name.to_string(),
                reason: "entity type already registered".to_string(),
            });
        }

        let field_budget = MAX_FIELDS_PER_ENTITY_TYPE - usize::from(has_class_hash);
        if fields.len() > field_budget {
            tracing::warn!(
                "registration refused: '{}' declares {} fields, maximum is {}",
                name,
                fields.len(),
                field_budget
            );
            return Err(ReplicationError::RegistrationError {
                name: name.to_string(),
                reason: format!(
                    "{} fields declared, maximum is {field_budget}{}",
                    fields.len(),
                    if has_class_hash {
                        " (class_hash claims one mask bit)"
                    } else {
                        ""
                    }
                ),
            });
        }

        let mut seen_names = std::collections::HashSet::new();
        let mut descriptors = Vec::with_capacity(fields.len());
        for (bit, spec) in fields.into_iter().enumerate() {
            if !seen_names.insert(spec.name.clone()) {
                tracing::warn!(
                    "registration refused: '{}' declares duplicate field name '{}'",
                    name,
                    spec.name
                );
                return Err(ReplicationError::RegistrationError {
                    name: name.to_string(),
                    reason: format!("duplicate field name '{}'", spec.name),
                });
            }
            let comparer = self.comparers.intern(spec.field_type, spec.tolerance);
            descriptors.push(FieldDescriptor {
                name: spec.name,
                field_type: spec.field_type,
                bit: bit as u8,
                comparer,
            });
        }

        let class_hash_bit = has_class_hash.then_some(descriptors.len() as u8);
        let change_mask_width =
            ChangeMaskWidth::for_field_count(descriptors.len() + usize::from(has_class_hash));
        self.by_hash.insert(
            name_hash,
            EntityTypeDescriptor {
                name_hash,
                name: name.to_string(),
                fields: descriptors,
                has_class_hash,
                class_hash_bit,
                change_mask_width,
            },
        );
        Ok(name_hash)
    }

    /// Looks up a registered type by its name hash.
    pub fn get(&self, name_hash: u32) -> ReplicationResult<&EntityTypeDescriptor> {
        self.by_hash
            .get(&name_hash)
            .ok_or(ReplicationError::UnknownEntityType(name_hash))
    }

    /// Iterates registered types in a stable order (ascending name hash),
    /// so full/delta encoding visits types in the same order on every
    /// call.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &EntityTypeDescriptor> {
        let mut hashes: Vec<_> = self.by_hash.keys().copied().collect();
        hashes.sort_unstable();
        hashes.into_iter().map(move |h| &self.by_hash[&h])
    }
}
