use glam::Vec3;

/// A ray with its slab-test reciprocals pre-multiplied, so the box test
/// in `kernels::intersect` stays branchless.
///
/// `inv_dir` is `1.0 / dir` per component, and `origin_div_dir` is
/// `origin / dir`, so the slab test only needs `box.min * inv_dir -
/// origin_div_dir` instead of a subtract-then-multiply-then-divide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub inv_dir: Vec3,
    pub origin_div_dir: Vec3,
    pub t_max: f32,
}

impl Ray {
    /// Normalizes `direction` before caching the reciprocals.
    pub fn new(origin: Vec3, direction: Vec3, t_max: f32) -> Self {
        Self::new_unsafe(origin, direction.normalize(), t_max)
    }

    /// Skips normalization. Only safe when the caller already knows
    /// `direction` is unit length (e.g. a direction coming out of another
    /// `Ray`, or a BSDF sample).
    pub fn new_unsafe(origin: Vec3, direction: Vec3, t_max: f32) -> Self {
        let inv_dir = Vec3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z);
        Self {
            origin,
            direction,
            inv_dir,
            origin_div_dir: origin * inv_dir,
            t_max,
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Re-expresses this ray in another coordinate frame, recomputing the
    /// cached reciprocals — required whenever the two-level BVH descends
    /// into an object's local space (spec.md section 4.3.3).
    pub fn transformed(&self, to_local: glam::Mat4) -> Self {
        let origin = to_local.transform_point3(self.origin);
        let direction = to_local.transform_vector3(self.direction);
        Self::new_unsafe(origin, direction, self.t_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_follows_parametric_line() {
        let r = Ray::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), f32::INFINITY);
        assert!((r.at(3.0) - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn origin_div_dir_matches_definition() {
        let r = Ray::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.0, 1.0), f32::INFINITY);
        assert!((r.origin_div_dir - r.origin * r.inv_dir).length() < 1e-6);
    }
}
