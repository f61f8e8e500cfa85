//! The shape data model (spec.md section 4.4): one tagged-union `Shape`
//! standing in for the teacher's per-primitive `intersect_*` free
//! functions, generalized to also support area sampling (needed by area
//! lights) and CSG composition. Each variant owns whatever geometry it
//! needs; `TriangleMesh` owns a local [`crate::bvh`] over its own
//! triangles so a mesh with many triangles doesn't degrade the scene-level
//! BVH's leaf cost (spec.md section 4.3.3).

use glam::Vec3;
use shared_structs::{Aabb, Ray, VertexBuffer};

use crate::bvh::{self, BvhHit};
use crate::intersection::{intersect_sphere, intersect_triangle};
use crate::rng::Rng;

/// Surface point returned by area sampling: `point`, geometric `normal`,
/// and the `pdf` with respect to *area*, not solid angle (spec.md section
/// 4.4, "Shape data model" — callers convert to solid angle themselves
/// since that conversion needs the reference point too).
#[derive(Debug, Clone, Copy)]
pub struct ShapeSample {
    pub point: Vec3,
    pub normal: Vec3,
    pub pdf_area: f32,
}

/// A resolved intersection: distance already applied, with the
/// interpolated shading normal and surface UV baked in so callers never
/// need to know which shape variant produced the hit.
#[derive(Debug, Clone, Copy)]
pub struct ShapeIntersection {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub uv: glam::Vec2,
}

pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

pub struct BoxShape {
    pub half_extents: Vec3,
}

pub struct TriangleMesh {
    pub vertices: VertexBuffer,
    pub bvh_nodes: Vec<shared_structs::BvhNode>,
    pub bvh_indices: Vec<u32>,
    /// Cumulative per-triangle area, used by [`Self::sample_area`] to pick
    /// a triangle proportional to its area before sampling a point on it.
    area_cdf: Vec<f32>,
    total_area: f32,
}

impl TriangleMesh {
    pub fn new(vertices: VertexBuffer) -> Self {
        let aabbs: Vec<Aabb> = (0..vertices.num_triangles())
            .map(|t| {
                let (a, b, c) = vertices.triangle_positions(t);
                Aabb::from_point(a).union_point(b).union_point(c)
            })
            .collect();
        let (bvh_nodes, bvh_indices) = bvh::build(&aabbs);

        let mut area_cdf = Vec::with_capacity(vertices.num_triangles());
        let mut total_area = 0.0f32;
        for t in 0..vertices.num_triangles() {
            let (a, b, c) = vertices.triangle_positions(t);
            total_area += 0.5 * (b - a).cross(c - a).length();
            area_cdf.push(total_area);
        }

        Self {
            vertices,
            bvh_nodes,
            bvh_indices,
            area_cdf,
            total_area,
        }
    }

    fn interpolated(&self, tri: usize, u: f32, v: f32) -> (Vec3, glam::Vec2) {
        let idx = self.vertices.indices[tri];
        let sa = self.vertices.shading[idx.i0 as usize];
        let sb = self.vertices.shading[idx.i1 as usize];
        let sc = self.vertices.shading[idx.i2 as usize];
        let w = 1.0 - u - v;
        let normal = (w * sa.normal + u * sb.normal + v * sc.normal).normalize();
        let uv = w * sa.uv + u * sb.uv + v * sc.uv;
        (normal, uv)
    }
}

pub enum CsgOp {
    Union,
    Intersection,
    Difference,
}

pub struct Csg {
    pub op: CsgOp,
    pub left: Box<Shape>,
    pub right: Box<Shape>,
}

pub enum Shape {
    Sphere(Sphere),
    Box(BoxShape),
    TriangleMesh(TriangleMesh),
    Csg(Csg),
}

impl Shape {
    pub fn bounding_box(&self) -> Aabb {
        match self {
            Shape::Sphere(s) => Aabb::new(s.center - Vec3::splat(s.radius), s.center + Vec3::splat(s.radius)),
            Shape::Box(b) => Aabb::new(-b.half_extents, b.half_extents),
            Shape::TriangleMesh(m) => m
                .bvh_nodes
                .first()
                .map(|n| n.aabb())
                .unwrap_or(Aabb::EMPTY),
            Shape::Csg(c) => c.left.bounding_box().union(c.right.bounding_box()),
        }
    }

    pub fn surface_area(&self) -> f32 {
        match self {
            Shape::Sphere(s) => 4.0 * std::f32::consts::PI * s.radius * s.radius,
            Shape::Box(b) => {
                let e = b.half_extents * 2.0;
                2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
            }
            Shape::TriangleMesh(m) => m.total_area,
            Shape::Csg(c) => c.left.surface_area() + c.right.surface_area(),
        }
    }

    /// Nearest-hit intersection in the shape's own local space (spec.md
    /// section 4.3.3 hands this a ray already transformed into that space).
    pub fn intersect(&self, ray: &Ray) -> Option<ShapeIntersection> {
        match self {
            Shape::Sphere(s) => {
                let t = intersect_sphere(ray, s.center, s.radius)?;
                let point = ray.at(t);
                let normal = (point - s.center) / s.radius;
                let uv = sphere_uv(normal);
                Some(ShapeIntersection { distance: t, point, normal, uv })
            }
            Shape::Box(b) => intersect_box_shape(ray, b),
            Shape::TriangleMesh(m) => {
                let hit = bvh::traverse_nearest(&m.bvh_nodes, &m.bvh_indices, ray, |tri, r| {
                    let (a, bb, c) = m.vertices.triangle_positions(tri as usize);
                    intersect_triangle(r, a, bb - a, c - a)
                })?;
                let point = ray.at(hit.distance);
                let (normal, uv) = m.interpolated(hit.primitive_index as usize, hit.u, hit.v);
                Some(ShapeIntersection { distance: hit.distance, point, normal, uv })
            }
            Shape::Csg(c) => intersect_csg(c, ray),
        }
    }

    pub fn intersects_any(&self, ray: &Ray) -> bool {
        match self {
            Shape::TriangleMesh(m) => bvh::traverse_any(&m.bvh_nodes, &m.bvh_indices, ray, |tri, r| {
                let (a, bb, c) = m.vertices.triangle_positions(tri as usize);
                intersect_triangle(r, a, bb - a, c - a).map(|(t, _, _)| t)
            }),
            _ => self.intersect(ray).map(|h| h.distance < ray.t_max).unwrap_or(false),
        }
    }

    /// Uniformly samples a point on the surface, area-proportional when
    /// the shape has multiple sub-parts (spec.md section 4.4, "Area
    /// sampling"). CSG shapes are deliberately not supported as emitters
    /// (spec.md section 4.4.4 Non-goals).
    pub fn sample_area(&self, rng: &mut Rng) -> ShapeSample {
        match self {
            Shape::Sphere(s) => {
                let u = rng.next_2f32();
                let dir = crate::sampling::uniform_sample_sphere(u.x, u.y);
                ShapeSample {
                    point: s.center + dir * s.radius,
                    normal: dir,
                    pdf_area: 1.0 / self.surface_area(),
                }
            }
            Shape::Box(b) => sample_box_surface(b, rng),
            Shape::TriangleMesh(m) => {
                let target = rng.next_f32() * m.total_area;
                let tri = match m.area_cdf.binary_search_by(|p| p.partial_cmp(&target).unwrap()) {
                    Ok(i) => i,
                    Err(i) => i.min(m.area_cdf.len() - 1),
                };
                let (a, b, c) = m.vertices.triangle_positions(tri);
                let u = rng.next_2f32();
                let (bu, bv) = crate::sampling::uniform_sample_triangle(u.x, u.y);
                let point = (1.0 - bu - bv) * a + bu * b + bv * c;
                let normal = (b - a).cross(c - a).normalize();
                ShapeSample { point, normal, pdf_area: 1.0 / m.total_area }
            }
            Shape::Csg(_) => ShapeSample { point: Vec3::ZERO, normal: Vec3::Z, pdf_area: 0.0 },
        }
    }
}

/// A direction, distance and solid-angle PDF sampled towards a point on
/// the shape as seen from `reference` (spec.md section 3, `sample_by_ref`).
#[derive(Debug, Clone, Copy)]
pub struct ReferenceSample {
    pub point: Vec3,
    pub normal: Vec3,
    pub direction: Vec3,
    pub distance: f32,
    pub cos_at_light: f32,
    pub pdf_solid_angle: f32,
}

impl Shape {
    /// Samples a direction towards the shape as seen from `reference`
    /// (spec.md section 3 / 4.4.1). Spheres use the solid-angle cone
    /// importance-sampling formula directly; every other shape falls back
    /// to area sampling plus the `dA -> dOmega` Jacobian.
    pub fn sample_by_ref(&self, reference: Vec3, rng: &mut Rng) -> Option<ReferenceSample> {
        if let Shape::Sphere(s) = self {
            let to_center = s.center - reference;
            let dist_sq = to_center.length_squared();
            let radius_sq = s.radius * s.radius;
            if dist_sq <= radius_sq {
                // Reference point is inside the sphere: not a valid emitter
                // query (spec.md section 4.4.1).
                return None;
            }
            let dist_to_center = dist_sq.sqrt();
            let cos_theta_max = (1.0 - radius_sq / dist_sq).max(0.0).sqrt();
            let (tangent, bitangent) = crate::sampling::build_orthonormal_basis(to_center / dist_to_center);
            let u = rng.next_2f32();
            let local = crate::sampling::uniform_sample_cone(u.x, u.y, cos_theta_max);
            let axis = to_center / dist_to_center;
            let direction = (tangent * local.x + bitangent * local.y + axis * local.z).normalize();

            // Reproject the sampled cone direction onto the sphere surface
            // itself, rather than trusting the tangent-plane approximation.
            let local_ray = Ray::new(reference, direction, f32::INFINITY);
            let t = intersect_sphere(&local_ray, s.center, s.radius)?;
            let point = local_ray.at(t);
            let normal = (point - s.center) / s.radius;
            let distance = t;
            let cos_at_light = normal.dot(-direction).abs();
            let pdf_solid_angle = crate::sampling::uniform_cone_pdf(cos_theta_max);
            return Some(ReferenceSample { point, normal, direction, distance, cos_at_light, pdf_solid_angle });
        }

        let sample = self.sample_area(rng);
        let to_sample = sample.point - reference;
        let distance = to_sample.length();
        if distance <= 1e-6 {
            return None;
        }
        let direction = to_sample / distance;
        let cos_at_light = sample.normal.dot(-direction).abs();
        if cos_at_light <= 1e-6 {
            return None;
        }
        let pdf_solid_angle = sample.pdf_area * distance * distance / cos_at_light;
        Some(ReferenceSample {
            point: sample.point,
            normal: sample.normal,
            direction,
            distance,
            cos_at_light,
            pdf_solid_angle,
        })
    }

    /// Solid-angle PDF of `sample_by_ref` producing `point` from
    /// `reference` (spec.md section 3, `pdf_by_ref`). Used for MIS when a
    /// BSDF-sampled ray happens to land on a light.
    pub fn pdf_by_ref(&self, reference: Vec3, point: Vec3, normal: Vec3) -> f32 {
        if let Shape::Sphere(s) = self {
            let dist_sq = (s.center - reference).length_squared();
            let radius_sq = s.radius * s.radius;
            if dist_sq <= radius_sq {
                return 0.0;
            }
            let cos_theta_max = (1.0 - radius_sq / dist_sq).max(0.0).sqrt();
            return crate::sampling::uniform_cone_pdf(cos_theta_max);
        }

        let to_light = point - reference;
        let distance_sq = to_light.length_squared();
        if distance_sq <= 1e-12 {
            return 0.0;
        }
        let distance = distance_sq.sqrt();
        let cos_at_light = normal.dot(to_light / -distance).abs();
        if cos_at_light <= 1e-6 {
            return 0.0;
        }
        let pdf_area = 1.0 / self.surface_area().max(1e-9);
        pdf_area * distance_sq / cos_at_light
    }
}

fn sphere_uv(normal: Vec3) -> glam::Vec2 {
    let u = 0.5 + normal.z.atan2(normal.x) / (2.0 * std::f32::consts::PI);
    let v = 0.5 + normal.y.asin() / std::f32::consts::PI;
    glam::Vec2::new(u, v)
}

fn intersect_box_shape(ray: &Ray, b: &BoxShape) -> Option<ShapeIntersection> {
    let aabb = Aabb::new(-b.half_extents, b.half_extents);
    let (t_near, t_far) = crate::intersection::intersect_aabb_two_sided(ray, &aabb)?;
    let t = if t_near > 0.0 { t_near } else { t_far };
    if t <= 0.0 || t > ray.t_max {
        return None;
    }
    let point = ray.at(t);
    let local = point / b.half_extents;
    let normal = box_face_normal(local);
    let uv = glam::Vec2::new(local.x * 0.5 + 0.5, local.y * 0.5 + 0.5);
    Some(ShapeIntersection { distance: t, point, normal, uv })
}

fn box_face_normal(local: Vec3) -> Vec3 {
    let ax = local.x.abs();
    let ay = local.y.abs();
    let az = local.z.abs();
    if ax >= ay && ax >= az {
        Vec3::new(local.x.signum(), 0.0, 0.0)
    } else if ay >= az {
        Vec3::new(0.0, local.y.signum(), 0.0)
    } else {
        Vec3::new(0.0, 0.0, local.z.signum())
    }
}

/// Picks one of the six faces with probability proportional to its area,
/// then samples uniformly within it (spec.md section 9's flagged CDF
/// bug: the six face weights are normalized once up front here, not
/// re-normalized per pick).
fn sample_box_surface(b: &BoxShape, rng: &mut Rng) -> ShapeSample {
    let e = b.half_extents * 2.0;
    let areas = [e.y * e.z, e.y * e.z, e.x * e.z, e.x * e.z, e.x * e.y, e.x * e.y];
    let total: f32 = areas.iter().sum();
    let mut target = rng.next_f32() * total;
    let mut face = 5usize;
    for (i, &a) in areas.iter().enumerate() {
        if target < a {
            face = i;
            break;
        }
        target -= a;
    }
    let u = rng.next_2f32();
    let (s, t) = (u.x * 2.0 - 1.0, u.y * 2.0 - 1.0);
    let (point, normal) = match face {
        0 => (Vec3::new(b.half_extents.x, s * b.half_extents.y, t * b.half_extents.z), Vec3::X),
        1 => (Vec3::new(-b.half_extents.x, s * b.half_extents.y, t * b.half_extents.z), -Vec3::X),
        2 => (Vec3::new(s * b.half_extents.x, b.half_extents.y, t * b.half_extents.z), Vec3::Y),
        3 => (Vec3::new(s * b.half_extents.x, -b.half_extents.y, t * b.half_extents.z), -Vec3::Y),
        4 => (Vec3::new(s * b.half_extents.x, t * b.half_extents.y, b.half_extents.z), Vec3::Z),
        _ => (Vec3::new(s * b.half_extents.x, t * b.half_extents.y, -b.half_extents.z), -Vec3::Z),
    };
    ShapeSample { point, normal, pdf_area: 1.0 / total }
}

/// CSG intersection (spec.md section 4.4.4): evaluates both sub-shapes'
/// first hit and combines by the requested boolean op. This is the
/// single-interval limitation the spec calls out explicitly — a ray that
/// enters and exits a sub-shape more than once (e.g. a non-convex mesh)
/// is not handled correctly, only the first crossing of each child is
/// considered.
fn intersect_csg(c: &Csg, ray: &Ray) -> Option<ShapeIntersection> {
    let left = c.left.intersect(ray);
    let right = c.right.intersect(ray);
    match c.op {
        CsgOp::Union => match (left, right) {
            (Some(l), Some(r)) => Some(if l.distance <= r.distance { l } else { r }),
            (Some(l), None) => Some(l),
            (None, Some(r)) => Some(r),
            (None, None) => None,
        },
        CsgOp::Intersection => {
            let l = left?;
            let r = right?;
            let inside_right = c.right.bounding_box().contains(l.point);
            let inside_left = c.left.bounding_box().contains(r.point);
            if inside_right {
                Some(l)
            } else if inside_left {
                Some(r)
            } else {
                None
            }
        }
        CsgOp::Difference => {
            let l = left?;
            if c.right.bounding_box().contains(l.point) {
                None
            } else {
                Some(l)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_structs::{PerVertexData, VertexIndices};

    #[test]
    fn sphere_intersection_lands_on_surface() {
        let sphere = Shape::Sphere(Sphere { center: Vec3::ZERO, radius: 2.0 });
        let ray = Ray::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::X, f32::INFINITY);
        let hit = sphere.intersect(&ray).unwrap();
        assert!((hit.point.length() - 2.0).abs() < 1e-4);
        assert!((hit.normal.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn box_shape_hits_the_correct_face() {
        let b = Shape::Box(BoxShape { half_extents: Vec3::splat(1.0) });
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, f32::INFINITY);
        let hit = b.intersect(&ray).unwrap();
        assert!((hit.normal - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-5);
    }

    fn single_triangle_mesh() -> TriangleMesh {
        let positions = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        let indices = vec![VertexIndices { i0: 0, i1: 1, i2: 2, material_index: 0 }];
        let shading = vec![
            PerVertexData::new(Vec3::Z, Vec3::X, glam::Vec2::ZERO),
            PerVertexData::new(Vec3::Z, Vec3::X, glam::Vec2::X),
            PerVertexData::new(Vec3::Z, Vec3::X, glam::Vec2::Y),
        ];
        TriangleMesh::new(VertexBuffer::new(positions, indices, shading))
    }

    #[test]
    fn triangle_mesh_hit_reports_interpolated_normal() {
        let mesh = Shape::TriangleMesh(single_triangle_mesh());
        let ray = Ray::new(Vec3::new(0.2, 0.2, -5.0), Vec3::Z, f32::INFINITY);
        let hit = mesh.intersect(&ray).unwrap();
        assert!((hit.normal - Vec3::Z).length() < 1e-4);
    }

    #[test]
    fn csg_union_reports_the_nearer_hit() {
        let a = Shape::Sphere(Sphere { center: Vec3::new(-1.0, 0.0, 0.0), radius: 0.5 });
        let b = Shape::Sphere(Sphere { center: Vec3::new(1.0, 0.0, 0.0), radius: 0.5 });
        let csg = Shape::Csg(Csg { op: CsgOp::Union, left: Box::new(a), right: Box::new(b) });
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, f32::INFINITY);
        let hit = csg.intersect(&ray).unwrap();
        assert!((hit.point.x - (-1.5)).abs() < 1e-4);
    }

    #[test]
    fn sample_area_point_lies_on_sphere_surface() {
        let sphere = Shape::Sphere(Sphere { center: Vec3::ZERO, radius: 3.0 });
        let mut rng = Rng::new_for_worker(7, 0);
        let sample = sphere.sample_area(&mut rng);
        assert!((sample.point.length() - 3.0).abs() < 1e-3);
        assert!(sample.pdf_area > 0.0);
    }

    #[test]
    fn sphere_sample_by_ref_stays_within_the_subtended_cone() {
        let sphere = Shape::Sphere(Sphere { center: Vec3::ZERO, radius: 1.0 });
        let reference = Vec3::new(0.0, 0.0, -5.0);
        let mut rng = Rng::new_for_worker(11, 0);
        for _ in 0..64 {
            let sample = sphere.sample_by_ref(reference, &mut rng).unwrap();
            assert!((sample.point.length() - 1.0).abs() < 1e-3);
            assert!(sample.pdf_solid_angle > 0.0);
            assert!(sample.cos_at_light >= 0.0);
        }
    }

    #[test]
    fn sphere_sample_by_ref_rejects_reference_inside_sphere() {
        let sphere = Shape::Sphere(Sphere { center: Vec3::ZERO, radius: 2.0 });
        let mut rng = Rng::new_for_worker(12, 0);
        assert!(sphere.sample_by_ref(Vec3::ZERO, &mut rng).is_none());
    }

    #[test]
    fn sphere_pdf_by_ref_matches_cone_formula() {
        let sphere = Shape::Sphere(Sphere { center: Vec3::ZERO, radius: 1.0 });
        let reference = Vec3::new(0.0, 0.0, -5.0);
        let cos_theta_max = (1.0f32 - 1.0 / 25.0).sqrt();
        let expected = 1.0 / (2.0 * std::f32::consts::PI * (1.0 - cos_theta_max));
        let pdf = sphere.pdf_by_ref(reference, Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!((pdf - expected).abs() < 1e-4);
    }
}
