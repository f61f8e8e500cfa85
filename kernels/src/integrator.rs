//! Unidirectional path integrator with NEE + MIS (spec.md section 4.7).
//! Grounded on the teacher's `trace_pixel` loop in `kernels/src/lib.rs`:
//! same bounce loop shape (trace, add emission, sample lights, sample
//! BSDF, Russian roulette), generalized from "index/vertex buffers +
//! single combined PBR lobe" to the [`crate::shapes::Shape`]/[`crate::bsdf`]
//! model and the two-level scene BVH in [`crate::bvh`]. Object transforms
//! are treated as rigid motions (rotation + translation, no non-uniform
//! scale) so a local-space hit distance equals the world-space distance
//! and a rotated normal needs no inverse-transpose (spec.md section
//! 4.3.3 leaves exact transform handling unspecified).

use glam::{Mat4, Vec3};
use shared_structs::{LightPickEntry, MaterialData, NextEventEstimation, Ray, Wavelength};

use crate::bsdf::{self, EvaluationContext, EventType, SamplingContext};
use crate::bvh::{self, BvhHit};
use crate::light::{AreaLight, EnvironmentLight};
use crate::light_pick;
use crate::rng::Rng;
use crate::sampling::build_orthonormal_basis;
use crate::shapes::{Shape, ShapeIntersection};
use crate::util;

pub struct SceneObject {
    pub shape_index: u32,
    pub material_index: u32,
    pub to_world: Mat4,
    pub to_local: Mat4,
}

pub struct SceneRef<'a> {
    pub objects: &'a [SceneObject],
    pub shapes: &'a [Shape],
    pub materials: &'a [MaterialData],
    pub bvh_nodes: &'a [shared_structs::BvhNode],
    pub bvh_indices: &'a [u32],
    pub area_lights: &'a [AreaLight],
    pub light_pick_table: &'a [LightPickEntry],
    pub environment: Option<&'a EnvironmentLight>,
}

pub struct SurfaceHit {
    pub object_index: u32,
    pub intersection: ShapeIntersection,
}

/// Two-level dispatch (spec.md section 4.3.3): the scene BVH's leaves are
/// objects; on a leaf hit the ray is transformed into that object's local
/// space and handed to its shape.
fn trace_scene(scene: &SceneRef, ray: &Ray) -> Option<SurfaceHit> {
    let hit: BvhHit = bvh::traverse_nearest(scene.bvh_nodes, scene.bvh_indices, ray, |obj_idx, r| {
        let obj = &scene.objects[obj_idx as usize];
        let local_ray = r.transformed(obj.to_local);
        let shape = &scene.shapes[obj.shape_index as usize];
        shape.intersect(&local_ray).map(|h| (h.distance, 0.0, 0.0))
    })?;

    let obj = &scene.objects[hit.primitive_index as usize];
    let local_ray = ray.transformed(obj.to_local);
    let shape = &scene.shapes[obj.shape_index as usize];
    let local_hit = shape.intersect(&local_ray)?;

    let world_point = obj.to_world.transform_point3(local_hit.point);
    let world_normal = obj.to_world.transform_vector3(local_hit.normal).normalize();

    Some(SurfaceHit {
        object_index: hit.primitive_index,
        intersection: ShapeIntersection {
            distance: local_hit.distance,
            point: world_point,
            normal: world_normal,
            uv: local_hit.uv,
        },
    })
}

fn trace_scene_any(scene: &SceneRef, ray: &Ray) -> bool {
    bvh::traverse_any(scene.bvh_nodes, scene.bvh_indices, ray, |obj_idx, r| {
        let obj = &scene.objects[obj_idx as usize];
        let local_ray = r.transformed(obj.to_local);
        let shape = &scene.shapes[obj.shape_index as usize];
        shape.intersect(&local_ray).map(|h| h.distance)
    })
}

fn world_to_local_frame(normal: Vec3, world_dir: Vec3) -> Vec3 {
    let (t, b) = build_orthonormal_basis(normal);
    Vec3::new(world_dir.dot(t), world_dir.dot(b), world_dir.dot(normal))
}

fn local_to_world_frame(normal: Vec3, local_dir: Vec3) -> Vec3 {
    let (t, b) = build_orthonormal_basis(normal);
    t * local_dir.x + b * local_dir.y + normal * local_dir.z
}

/// Direct light sampling for one surface vertex (spec.md section 4.7's
/// NEE step): picks a light via the alias table, samples a point on it,
/// shadow-tests, evaluates the BSDF towards it, and combines with MIS
/// against the BSDF's own sampling PDF for that direction.
#[allow(clippy::too_many_arguments)]
fn sample_direct_lighting(
    scene: &SceneRef,
    nee_mode: NextEventEstimation,
    material: &MaterialData,
    wavelength: &mut Wavelength,
    surface_point: Vec3,
    surface_normal: Vec3,
    outgoing_world: Vec3,
    rng: &mut Rng,
) -> Vec3 {
    if scene.light_pick_table.is_empty() || scene.light_pick_table[0].is_sentinel() {
        return Vec3::ZERO;
    }

    let (light_index, _light_area, light_pick_pdf) = light_pick::pick_light(scene.light_pick_table, rng);
    let light = &scene.area_lights[light_index as usize];
    let shape = &scene.shapes[light.shape_index as usize];

    let emission_sample = match light.sample_emission(shape, surface_point, rng) {
        Some(s) => s,
        None => return Vec3::ZERO,
    };

    let shadow_ray = Ray::new(surface_point + emission_sample.direction * util::EPS, emission_sample.direction, emission_sample.distance - 2.0 * util::EPS);
    if trace_scene_any(scene, &shadow_ray) {
        return Vec3::ZERO;
    }

    let outgoing_local = world_to_local_frame(surface_normal, outgoing_world);
    let incoming_local = world_to_local_frame(surface_normal, emission_sample.direction);
    let eval_ctx = EvaluationContext {
        material,
        wavelength,
        outgoing_local,
        incoming_local,
    };
    let (bsdf_value, bsdf_pdf) = bsdf::evaluate(&eval_ctx);
    if bsdf_value == Vec3::ZERO || emission_sample.pdf_solid_angle <= 0.0 {
        return Vec3::ZERO;
    }

    let weight = light_pick::get_weight(nee_mode, emission_sample.pdf_solid_angle, bsdf_pdf);
    util::mask_nan(bsdf_value * emission_sample.radiance * weight / (emission_sample.pdf_solid_angle * light_pick_pdf))
}

/// Radiance along one camera ray (spec.md section 4.7). `entropy`/`worker_id`
/// seed the per-worker RNG the way the teacher forks its GPU lane RNG
/// state per invocation.
pub fn radiance(
    scene: &SceneRef,
    mut ray: Ray,
    nee_mode: NextEventEstimation,
    max_bounces: u32,
    min_bounces: u32,
    rng: &mut Rng,
) -> Vec3 {
    let nee = nee_mode.uses_nee();
    let mut throughput = Vec3::ONE;
    let mut radiance_out = Vec3::ZERO;
    let mut wavelength = Wavelength::sample(rng.next_f32());
    let mut last_event = EventType::SpecularReflection;
    let mut last_pdf = 1.0f32;

    for bounce in 0..max_bounces {
        let hit = match trace_scene(scene, &ray) {
            Some(h) => h,
            None => {
                // The environment is never next-event-sampled (there is no
                // `sample_direct_lighting` branch for it), so the BSDF-sampled
                // miss is the *only* estimator for the background and must
                // receive the full contribution, unweighted (spec.md section
                // 4.7's loop adds `path_throughput * env.evaluate(ray.dir)`
                // unconditionally on a miss).
                if let Some(env) = scene.environment {
                    radiance_out += throughput * env.evaluate(ray.direction);
                }
                break;
            }
        };

        let obj = &scene.objects[hit.object_index as usize];
        let material = &scene.materials[obj.material_index as usize];

        if material.is_emissive() {
            if bounce == 0 || !nee || last_event.is_specular() {
                radiance_out += util::mask_nan(throughput * material.emission);
            } else if nee_mode.uses_mis() {
                let light_entry = scene
                    .area_lights
                    .iter()
                    .find(|l| l.shape_index == obj.shape_index);
                if let Some(light) = light_entry {
                    let shape = &scene.shapes[obj.shape_index as usize];
                    let light_pdf = light.pdf_solid_angle(shape, ray.origin, hit.intersection.point, hit.intersection.normal);
                    let weight = light_pick::get_weight(nee_mode, last_pdf, light_pdf);
                    radiance_out += util::mask_nan(throughput * material.emission * weight);
                }
            }
            break;
        }

        let outgoing_local = world_to_local_frame(hit.intersection.normal, -ray.direction);

        if nee {
            let direct = sample_direct_lighting(
                scene,
                nee_mode,
                material,
                &mut wavelength,
                hit.intersection.point,
                hit.intersection.normal,
                -ray.direction,
                rng,
            );
            radiance_out += throughput * direct;
        }

        let mut sampling_ctx = SamplingContext {
            material,
            wavelength: &mut wavelength,
            outgoing_local,
        };
        let sample = match bsdf::sample(&mut sampling_ctx, rng) {
            Some(s) => s,
            None => break,
        };
        if sample.pdf <= 0.0 {
            break;
        }

        throughput *= sample.throughput;
        last_event = sample.event;
        last_pdf = sample.pdf;

        let next_dir = local_to_world_frame(hit.intersection.normal, sample.direction_local);
        ray = Ray::new(hit.intersection.point + next_dir * util::EPS, next_dir, f32::INFINITY);

        if bounce >= min_bounces {
            let survive = throughput.max_element().clamp(0.05, 0.95);
            if rng.next_f32() > survive {
                break;
            }
            throughput /= survive;
        }
    }

    util::mask_nan(radiance_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_structs::BsdfKind;

    fn empty_scene<'a>() -> SceneRef<'a> {
        SceneRef {
            objects: &[],
            shapes: &[],
            materials: &[],
            bvh_nodes: &[],
            bvh_indices: &[],
            area_lights: &[],
            light_pick_table: &[],
            environment: None,
        }
    }

    #[test]
    fn empty_scene_with_no_environment_returns_black() {
        let scene = empty_scene();
        let mut rng = Rng::new_for_worker(1, 0);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z, f32::INFINITY);
        let radiance_value = radiance(&scene, ray, NextEventEstimation::None, 8, 3, &mut rng);
        assert_eq!(radiance_value, Vec3::ZERO);
    }

    #[test]
    fn empty_scene_with_environment_returns_flat_background() {
        let env = EnvironmentLight { radiance: Vec3::new(1.0, 2.0, 3.0) };
        let mut scene = empty_scene();
        scene.environment = Some(&env);
        let mut rng = Rng::new_for_worker(1, 0);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z, f32::INFINITY);
        let radiance_value = radiance(&scene, ray, NextEventEstimation::None, 8, 3, &mut rng);
        assert_eq!(radiance_value, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn emissive_sphere_returns_its_emission_on_first_bounce() {
        let shapes = [Shape::Sphere(crate::shapes::Sphere { center: Vec3::ZERO, radius: 1.0 })];
        let mut material = MaterialData { bsdf: BsdfKind::Null, ..Default::default() };
        material.emission = Vec3::new(3.0, 2.0, 1.0);
        let materials = [material];
        let objects = [SceneObject {
            shape_index: 0,
            material_index: 0,
            to_world: Mat4::IDENTITY,
            to_local: Mat4::IDENTITY,
        }];
        let aabbs = [shapes[0].bounding_box()];
        let (nodes, indices) = bvh::build(&aabbs);
        let scene = SceneRef {
            objects: &objects,
            shapes: &shapes,
            materials: &materials,
            bvh_nodes: &nodes,
            bvh_indices: &indices,
            area_lights: &[],
            light_pick_table: &[],
            environment: None,
        };
        let mut rng = Rng::new_for_worker(2, 0);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z, f32::INFINITY);
        let radiance_value = radiance(&scene, ray, NextEventEstimation::None, 8, 3, &mut rng);
        assert!((radiance_value - Vec3::new(3.0, 2.0, 1.0)).length() < 1e-4);
    }
}
