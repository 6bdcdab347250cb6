//! The scalar field consumed by the extractor.

use cgmath::{InnerSpace, Point3, Vector3};

/// A scalar function sampled over the bounding box. Points where it is lower than the iso-level
/// are inside the surface.
///
/// The field is sampled from several threads at once and may be evaluated many times at the same
/// point, so it must be a pure, deterministic function of its position.
///
/// Any `Fn(f32, f32, f32) -> f32 + Sync` closure is a field:
/// ```rust
/// use cms::field::ScalarField;
///
/// let sphere = |x: f32, y: f32, z: f32| x * x + y * y + z * z - 1.;
/// assert_eq!(sphere.evaluate(1., 0., 0.), 0.);
/// ```
pub trait ScalarField: Sync {
    /// Returns the value of the field at `(x, y, z)`.
    fn evaluate(&self, x: f32, y: f32, z: f32) -> f32;

    /// Evaluates the field at a point.
    fn evaluate_at(&self, p: Point3<f32>) -> f32 {
        self.evaluate(p.x, p.y, p.z)
    }
}

impl<F> ScalarField for F
where
    F: Fn(f32, f32, f32) -> f32 + Sync,
{
    fn evaluate(&self, x: f32, y: f32, z: f32) -> f32 {
        self(x, y, z)
    }
}

/// Estimates the gradient at `p` with forward differences, using a separate step per axis.
pub fn gradient<F: ScalarField + ?Sized>(field: &F, p: Point3<f32>, step: Vector3<f32>) -> Vector3<f32> {
    let center = field.evaluate_at(p);
    Vector3::new(
        (field.evaluate(p.x + step.x, p.y, p.z) - center) / step.x,
        (field.evaluate(p.x, p.y + step.y, p.z) - center) / step.y,
        (field.evaluate(p.x, p.y, p.z + step.z) - center) / step.z,
    )
}

/// Normalizes `v`, returning the zero vector when it is too short to have a direction.
pub fn safe_normalize(v: Vector3<f32>) -> Vector3<f32> {
    let len2 = v.magnitude2();
    if len2 > 1e-20 && len2.is_finite() {
        v / len2.sqrt()
    } else {
        Vector3::new(0., 0., 0.)
    }
}
