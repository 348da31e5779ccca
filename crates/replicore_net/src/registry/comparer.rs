//! Interned field-value comparers.

use super::FieldType;
use crate::registry::FieldValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered bits of an `f32` tolerance, used as a hash-map key since `f32`
/// itself is not `Eq`/`Hash`.
type ToleranceKey = Option<u32>;

fn tolerance_key(tolerance: Option<f32>) -> ToleranceKey {
    tolerance.map(f32::to_bits)
}

/// True for the field types an `is_equal_approx` auto-tolerance comparer
/// is allowed on: `f32` and the vector/rotation/color types built out of
/// it.
fn is_float_bearing(field_type: FieldType) -> bool {
    matches!(
        field_type,
        FieldType::F32
            | FieldType::Vec2
            | FieldType::Vec3
            | FieldType::Rect2
            | FieldType::Quat
            | FieldType::Color
    )
}

/// Relative factor of the Godot-style `is_equal_approx` auto-tolerance:
/// two values compare equal if their difference is within this fraction
/// of their magnitude.
const AUTO_TOLERANCE_RELATIVE: f32 = 1e-5;
/// Floor under the relative term above, so comparisons near zero still
/// have a meaningful tolerance.
const AUTO_TOLERANCE_ABSOLUTE_MIN: f32 = 1e-6;

/// The comparison rule for one field: bit-exact equality for discrete
/// types, a field-provided absolute tolerance, or (when a float-bearing
/// type declares no explicit tolerance) the auto-tolerance default.
#[derive(Debug)]
enum ComparerKind {
    Exact,
    Approx(f32),
    Auto,
}

/// A shared, interned comparer. Cloning is cheap (an `Arc` bump); the
/// actual comparison logic lives behind the `Arc` so that two fields
/// declared with the same `(FieldType, tolerance)` share one instance,
/// mirroring the original engine's named comparer cache.
#[derive(Debug, Clone)]
pub struct Comparer {
    kind: Arc<ComparerKind>,
}

impl Comparer {
    /// Compares two field values of the same type. Values of mismatched
    /// types are never considered equal.
    #[must_use]
    pub fn equal(&self, a: &FieldValue, b: &FieldValue) -> bool {
        match self.kind.as_ref() {
            ComparerKind::Exact => values_exact_equal(a, b),
            ComparerKind::Approx(tol) => values_tolerance_equal(a, b, |x, y| (x - y).abs() <= tol),
            ComparerKind::Auto => values_tolerance_equal(a, b, auto_equal),
        }
    }

    /// Pointer to the interned instance, exposed for tests that verify
    /// sharing.
    #[must_use]
    pub fn inner(&self) -> *const () {
        Arc::as_ptr(&self.kind).cast::<()>()
    }
}

fn values_exact_equal(a: &FieldValue, b: &FieldValue) -> bool {
    a == b
}

/// Godot's `is_equal_approx`: relative tolerance scaled by the larger
/// operand's magnitude, floored so comparisons near zero still work.
fn auto_equal(x: f32, y: f32) -> bool {
    let tolerance = AUTO_TOLERANCE_RELATIVE * x.abs().max(y.abs());
    (x - y).abs() <= tolerance.max(AUTO_TOLERANCE_ABSOLUTE_MIN)
}

/// Compares every float component of a float-bearing value with the
/// given per-component predicate. Non-float-bearing types fall back to
/// exact equality, since they have no components to tolerance-compare.
fn values_tolerance_equal(a: &FieldValue, b: &FieldValue, within: impl Fn(f32, f32) -> bool) -> bool {
    match (a, b) {
        (FieldValue::F32(x), FieldValue::F32(y)) => within(*x, *y),
        (FieldValue::Vec2(x), FieldValue::Vec2(y)) => within(x.x, y.x) && within(x.y, y.y),
        (FieldValue::Vec3(x), FieldValue::Vec3(y)) => {
            within(x.x, y.x) && within(x.y, y.y) && within(x.z, y.z)
        }
        (FieldValue::Rect2(x), FieldValue::Rect2(y)) => {
            within(x.x, y.x) && within(x.y, y.y) && within(x.w, y.w) && within(x.h, y.h)
        }
        (FieldValue::Quat(x), FieldValue::Quat(y)) => {
            within(x.x, y.x) && within(x.y, y.y) && within(x.z, y.z) && within(x.w, y.w)
        }
        (FieldValue::Color(x), FieldValue::Color(y)) => {
            within(x.r, y.r) && within(x.g, y.g) && within(x.b, y.b) && within(x.a, y.a)
        }
        _ => values_exact_equal(a, b),
    }
}

/// Interns [`Comparer`] instances by `(FieldType, tolerance)` so that
/// fields across different entity types which compare the same way share
/// one comparer, rather than allocating a fresh one per field.
#[derive(Debug, Default)]
pub struct ComparerRegistry {
    cache: HashMap<(FieldType, ToleranceKey), Comparer>,
}

impl ComparerRegistry {
    /// Returns the shared comparer for `(field_type, tolerance)`,
    /// creating it on first use.
    pub fn intern(&mut self, field_type: FieldType, tolerance: Option<f32>) -> Comparer {
        let key = (field_type, tolerance_key(tolerance));
        self.cache
            .entry(key)
            .or_insert_with(|| {
                let kind = match tolerance {
                    Some(tol) => ComparerKind::Approx(tol),
                    None if is_float_bearing(field_type) => ComparerKind::Auto,
                    None => ComparerKind::Exact,
                };
                Comparer {
                    kind: Arc::new(kind),
                }
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_comparer_respects_tolerance() {
        let mut reg = ComparerRegistry::default();
        let cmp = reg.intern(FieldType::F32, Some(0.1));
        assert!(cmp.equal(&FieldValue::F32(1.0), &FieldValue::F32(1.05)));
        assert!(!cmp.equal(&FieldValue::F32(1.0), &FieldValue::F32(1.2)));
    }

    #[test]
    fn rect2_approx_comparer_checks_all_four_components() {
        use replicore_types::Rect2;
        let mut reg = ComparerRegistry::default();
        let cmp = reg.intern(FieldType::Rect2, Some(0.1));
        let a = Rect2::new(0.0, 0.0, 1.0, 1.0);
        assert!(cmp.equal(&FieldValue::Rect2(a), &FieldValue::Rect2(Rect2::new(0.05, 0.0, 1.0, 1.0))));
        assert!(!cmp.equal(&FieldValue::Rect2(a), &FieldValue::Rect2(Rect2::new(0.0, 0.0, 1.5, 1.0))));
    }

    #[test]
    fn exact_comparer_requires_bit_equality() {
        let mut reg = ComparerRegistry::default();
        let cmp = reg.intern(FieldType::U8, None);
        assert!(!cmp.equal(&FieldValue::U8(1), &FieldValue::U8(2)));
    }

    #[test]
    fn float_field_with_no_explicit_tolerance_gets_auto_tolerance() {
        let mut reg = ComparerRegistry::default();
        let cmp = reg.intern(FieldType::F32, None);
        // Within the relative auto-tolerance band.
        assert!(cmp.equal(&FieldValue::F32(1000.0), &FieldValue::F32(1000.005)));
        // Clearly outside it.
        assert!(!cmp.equal(&FieldValue::F32(1000.0), &FieldValue::F32(1001.0)));
        // Near zero, the absolute floor still catches a real difference.
        assert!(!cmp.equal(&FieldValue::F32(0.0), &FieldValue::F32(0.01)));
    }

    #[test]
    fn discrete_field_with_no_explicit_tolerance_is_exact() {
        let mut reg = ComparerRegistry::default();
        let cmp = reg.intern(FieldType::Bool, None);
        assert!(!cmp.equal(&FieldValue::Bool(true), &FieldValue::Bool(false)));
    }
}
