//! Intersection kernels (spec.md section 4.2): slab-method ray/box,
//! Möller-Trumbore ray/triangle, and ray/sphere in `f64`, each in scalar and
//! width-8 SIMD form. Grounded on the teacher's `muller_trumbore` (kept as
//! the scalar triangle test, generalized to return `(t, u, v)`) and
//! `intersect_aabb` (generalized to the two-sided form), plus
//! `original_source/Core/Geometry.cpp`'s double-precision sphere solve.

use crate::simd::Vector8f;
use glam::Vec3;
use shared_structs::{Aabb, Ray};

/// Near-distance-only ray/AABB test (spec.md section 4.2). Returns `Some(t_near)`
/// iff `t_far >= max(t_near, 0) && t_near <= ray.t_max`.
#[inline]
pub fn intersect_aabb(ray: &Ray, aabb: &Aabb) -> Option<f32> {
    intersect_aabb_two_sided(ray, aabb).map(|(near, _far)| near)
}

/// Two-sided variant returning both `t_near` and `t_far` — needed by CSG
/// interval combination and by the packet traversal's per-group masks
/// (spec.md section 3, "Supplemented features"). The teacher's single-value
/// `intersect_aabb` (dropped) only ever needed the near distance.
#[inline]
pub fn intersect_aabb_two_sided(ray: &Ray, aabb: &Aabb) -> Option<(f32, f32)> {
    let t_lo = Vec3::new(
        aabb.min.x * ray.inv_dir.x - ray.origin_div_dir.x,
        aabb.min.y * ray.inv_dir.y - ray.origin_div_dir.y,
        aabb.min.z * ray.inv_dir.z - ray.origin_div_dir.z,
    );
    let t_hi = Vec3::new(
        aabb.max.x * ray.inv_dir.x - ray.origin_div_dir.x,
        aabb.max.y * ray.inv_dir.y - ray.origin_div_dir.y,
        aabb.max.z * ray.inv_dir.z - ray.origin_div_dir.z,
    );
    let t_min = t_lo.min(t_hi);
    let t_max = t_lo.max(t_hi);
    let t_near = t_min.x.max(t_min.y).max(t_min.z);
    let t_far = t_max.x.min(t_max.y).min(t_max.z);

    if t_far >= t_near.max(0.0) && t_near <= ray.t_max {
        Some((t_near, t_far))
    } else {
        None
    }
}

/// Eight rays, structure-of-arrays, used by the packet traversal when
/// descending the BVH (spec.md section 4.2, "SIMD-8 variants").
pub struct RaySoa8 {
    pub origin: [Vector8f; 3],
    pub dir: [Vector8f; 3],
    pub inv_dir: [Vector8f; 3],
    pub origin_div_dir: [Vector8f; 3],
    pub t_max: Vector8f,
}

/// One box against eight rays. The mask is a per-lane float bit-pattern
/// (all-ones/all-zeros), combined with `&` the way `Vector8f` overloads
/// bitwise-and.
#[inline]
pub fn intersect_aabb_x8(rays: &RaySoa8, aabb: &Aabb) -> (Vector8f, Vector8f) {
    let min = [
        Vector8f::splat(aabb.min.x),
        Vector8f::splat(aabb.min.y),
        Vector8f::splat(aabb.min.z),
    ];
    let max = [
        Vector8f::splat(aabb.max.x),
        Vector8f::splat(aabb.max.y),
        Vector8f::splat(aabb.max.z),
    ];

    let mut t_near = Vector8f::splat(f32::NEG_INFINITY);
    let mut t_far = Vector8f::splat(f32::INFINITY);
    for axis in 0..3 {
        let t_lo = min[axis].mul_add(rays.inv_dir[axis], -rays.origin_div_dir[axis]);
        let t_hi = max[axis].mul_add(rays.inv_dir[axis], -rays.origin_div_dir[axis]);
        t_near = t_near.max(t_lo.min(t_hi));
        t_far = t_far.min(t_lo.max(t_hi));
    }

    let hit = t_far.cmp_ge(t_near.max(Vector8f::zero())) & t_near.cmp_le(rays.t_max);
    (hit, t_near)
}

/// Eight boxes against one ray — the other SIMD-8 box form named in
/// spec.md section 4.2, used when a single ray descends into 8 sibling
/// nodes at once.
#[inline]
pub fn intersect_aabb_x8_boxes(ray: &Ray, mins: &[Vector8f; 3], maxs: &[Vector8f; 3]) -> (Vector8f, Vector8f) {
    let inv_dir = [
        Vector8f::splat(ray.inv_dir.x),
        Vector8f::splat(ray.inv_dir.y),
        Vector8f::splat(ray.inv_dir.z),
    ];
    let origin_div_dir = [
        Vector8f::splat(ray.origin_div_dir.x),
        Vector8f::splat(ray.origin_div_dir.y),
        Vector8f::splat(ray.origin_div_dir.z),
    ];

    let mut t_near = Vector8f::splat(f32::NEG_INFINITY);
    let mut t_far = Vector8f::splat(f32::INFINITY);
    for axis in 0..3 {
        let t_lo = mins[axis].mul_add(inv_dir[axis], -origin_div_dir[axis]);
        let t_hi = maxs[axis].mul_add(inv_dir[axis], -origin_div_dir[axis]);
        t_near = t_near.max(t_lo.min(t_hi));
        t_far = t_far.min(t_lo.max(t_hi));
    }

    let hit = t_far.cmp_ge(t_near.max(Vector8f::zero())) & t_near.cmp_le(Vector8f::splat(ray.t_max));
    (hit, t_near)
}

/// Möller-Trumbore ray/triangle. `edge1 = v1 - v0`, `edge2 = v2 - v0`.
/// Double-sided: the determinant is not clamped and backface culling is
/// never performed (spec.md section 4.2). Returns `(t, u, v)`.
#[inline]
pub fn intersect_triangle(ray: &Ray, v0: Vec3, edge1: Vec3, edge2: Vec3) -> Option<(f32, f32, f32)> {
    let p_vec = ray.direction.cross(edge2);
    let det = edge1.dot(p_vec);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;

    let t_vec = ray.origin - v0;
    let u = t_vec.dot(p_vec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q_vec = t_vec.cross(edge1);
    let v = ray.direction.dot(q_vec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(q_vec) * inv_det;
    if t > 0.0 && t <= ray.t_max {
        Some((t, u, v))
    } else {
        None
    }
}

/// One triangle against eight rays (spec.md section 4.2, "SIMD-8 variants").
pub fn intersect_triangle_x8(
    rays: &RaySoa8,
    v0: Vec3,
    edge1: Vec3,
    edge2: Vec3,
) -> (Vector8f, Vector8f, Vector8f, Vector8f) {
    let v0 = [Vector8f::splat(v0.x), Vector8f::splat(v0.y), Vector8f::splat(v0.z)];
    let e1 = [Vector8f::splat(edge1.x), Vector8f::splat(edge1.y), Vector8f::splat(edge1.z)];
    let e2 = [Vector8f::splat(edge2.x), Vector8f::splat(edge2.y), Vector8f::splat(edge2.z)];

    let p_vec = cross(rays.dir, e2);
    let det = dot(e1, p_vec);
    let not_small = det.abs().cmp_ge(Vector8f::splat(1e-12));
    let inv_det = Vector8f::splat(1.0) / det;

    let t_vec = [
        rays.origin[0] - v0[0],
        rays.origin[1] - v0[1],
        rays.origin[2] - v0[2],
    ];
    let u = dot(t_vec, p_vec) * inv_det;

    let q_vec = cross(t_vec, e1);
    let v = dot(rays.dir, q_vec) * inv_det;
    let t = dot(e2, q_vec) * inv_det;

    let valid = not_small
        & u.cmp_ge(Vector8f::zero())
        & u.cmp_le(Vector8f::splat(1.0))
        & v.cmp_ge(Vector8f::zero())
        & (u + v).cmp_le(Vector8f::splat(1.0))
        & t.cmp_gt(Vector8f::zero())
        & t.cmp_le(rays.t_max);

    (valid, t, u, v)
}

fn dot(a: [Vector8f; 3], b: [Vector8f; 3]) -> Vector8f {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [Vector8f; 3], b: [Vector8f; 3]) -> [Vector8f; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Ray/sphere solved in `f64` to avoid catastrophic cancellation near
/// grazing rays (spec.md section 4.2). Sphere is centered at `center` with
/// radius `radius`; returns the nearest valid hit distance in the ray's
/// `f32` units.
pub fn intersect_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<f32> {
    let oc = (ray.origin - center).as_dvec3();
    let dir = ray.direction.as_dvec3();
    let r = radius as f64;

    let b = dir.dot(-oc);
    let c = r * r - oc.length_squared();
    let discriminant = b * b + c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let t_near = b - root;
    let t_far = b + root;
    if t_far <= t_near {
        return None;
    }

    let t = if t_near > 1e-6 {
        t_near
    } else if t_far > 1e-6 {
        t_far
    } else {
        return None;
    };
    let t = t as f32;
    if t > 0.0 && t <= ray.t_max {
        Some(t)
    } else {
        None
    }
}

trait AsDVec3 {
    fn as_dvec3(self) -> glam::DVec3;
}

impl AsDVec3 for Vec3 {
    fn as_dvec3(self) -> glam::DVec3 {
        glam::DVec3::new(self.x as f64, self.y as f64, self.z as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use shared_structs::Ray;

    #[test]
    fn box_ray_hit_point_lies_inside_box() {
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let r = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), f32::INFINITY);
        let t = intersect_aabb(&r, &b).unwrap();
        let p = r.at(t);
        assert!(b.min.x - 1e-4 <= p.x && p.x <= b.max.x + 1e-4);
    }

    #[test]
    fn triangle_hit_matches_barycentric_reconstruction() {
        let v0 = Vec3::new(0.0, 0.0, 0.0);
        let v1 = Vec3::new(1.0, 0.0, 0.0);
        let v2 = Vec3::new(0.0, 1.0, 0.0);
        let r = Ray::new(Vec3::new(0.2, 0.2, -5.0), Vec3::new(0.0, 0.0, 1.0), f32::INFINITY);
        let (t, u, v) = intersect_triangle(&r, v0, v1 - v0, v2 - v0).unwrap();
        let p = r.at(t);
        let reconstructed = (1.0 - u - v) * v0 + u * v1 + v * v2;
        assert!((p - reconstructed).length() < 1e-4);
    }

    #[test]
    fn triangle_is_double_sided() {
        let v0 = Vec3::new(0.0, 0.0, 0.0);
        let v1 = Vec3::new(1.0, 0.0, 0.0);
        let v2 = Vec3::new(0.0, 1.0, 0.0);
        let front = Ray::new(Vec3::new(0.2, 0.2, -5.0), Vec3::new(0.0, 0.0, 1.0), f32::INFINITY);
        let back = Ray::new(Vec3::new(0.2, 0.2, 5.0), Vec3::new(0.0, 0.0, -1.0), f32::INFINITY);
        assert!(intersect_triangle(&front, v0, v1 - v0, v2 - v0).is_some());
        assert!(intersect_triangle(&back, v0, v1 - v0, v2 - v0).is_some());
    }

    #[test]
    fn sphere_hit_distance_lands_on_surface() {
        let radius = 2.5;
        let r = Ray::new(Vec3::new(10.0, 0.3, 0.0), Vec3::new(-1.0, 0.0, 0.0), f32::INFINITY);
        let t = intersect_sphere(&r, Vec3::ZERO, radius).unwrap();
        let p = r.at(t);
        assert!((p.length() - radius).abs() / radius < 1e-4);
    }

    #[test]
    fn concentric_miss_returns_none() {
        let r = Ray::new(Vec3::new(10.0, 10.0, 10.0), Vec3::new(1.0, 0.0, 0.0), f32::INFINITY);
        assert!(intersect_sphere(&r, Vec3::ZERO, 1.0).is_none());
    }
}
