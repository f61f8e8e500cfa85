//! Scene ownership (spec.md section 3, "Scene"): arenas of shapes and
//! materials plus a flat object list, each object a shape index, a
//! material index and a world transform. Grounded on the teacher's own
//! scene-side arrays (`per_vertex_buffer`/`index_buffer`/`material_data_buffer`
//! passed into `trace_pixel`) generalized from "one big mesh" to
//! "N objects, each an index into shared arenas" (spec.md section 9,
//! "Dynamic dispatch" / "Arena ownership").

use glam::{Mat4, Quat, Vec3};
use shared_structs::{LightPickEntry, MaterialData, SceneError};

use kernels::bvh::{self};
use kernels::integrator::SceneRef;
use kernels::light::{AreaLight, EnvironmentLight};
use kernels::shapes::Shape;

/// Rigid placement of an object in world space (spec.md section 4.3.3
/// keeps transforms to rotation + translation; see `kernels::integrator`'s
/// module doc for why non-uniform scale isn't supported).
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub fn identity() -> Self {
        Self { position: Vec3::ZERO, rotation: Quat::IDENTITY }
    }

    pub fn to_world(self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    pub fn to_local(self) -> Mat4 {
        self.to_world().inverse()
    }
}

pub struct SceneObject {
    pub shape_index: u32,
    pub material_index: u32,
    pub transform: Transform,
}

impl SceneObject {
    pub fn new(shape_index: u32, material_index: u32, transform: Transform) -> Self {
        Self { shape_index, material_index, transform }
    }
}

#[derive(Default)]
pub struct Scene {
    shapes: Vec<Shape>,
    materials: Vec<MaterialData>,
    objects: Vec<SceneObject>,
    environment: Option<EnvironmentLight>,

    area_lights: Vec<AreaLight>,
    light_pick_table: Vec<LightPickEntry>,
    bvh_nodes: Vec<shared_structs::BvhNode>,
    bvh_indices: Vec<u32>,

    /// `objects` re-expressed with `to_world`/`to_local` pre-computed, the
    /// layout `kernels::integrator::SceneRef` actually borrows from (spec.md
    /// section 4.3.3: the hot loop never re-derives a matrix inverse).
    /// Rebuilt alongside `bvh_nodes` in `build_bvh`.
    kernel_objects: Vec<kernels::integrator::SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_shape(&mut self, shape: Shape) -> u32 {
        self.shapes.push(shape);
        self.shapes.len() as u32 - 1
    }

    pub fn add_material(&mut self, material: MaterialData) -> u32 {
        self.materials.push(material);
        self.materials.len() as u32 - 1
    }

    pub fn add_object(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    pub fn set_environment(&mut self, radiance: Vec3) {
        self.environment = Some(EnvironmentLight { radiance });
    }

    /// Builds the scene-level BVH over object bounds and the light-pick
    /// alias table over emissive objects (spec.md section 4.6). The only
    /// fallible step in the core's public surface (spec.md section 7,
    /// "Allocation failure").
    pub fn build_bvh(&mut self) -> Result<(), SceneError> {
        if self.objects.is_empty() {
            self.bvh_nodes.clear();
            self.bvh_indices.clear();
            self.area_lights.clear();
            self.light_pick_table.clear();
            self.kernel_objects.clear();
            return Ok(());
        }

        let aabbs: Vec<shared_structs::Aabb> = self
            .objects
            .iter()
            .map(|obj| world_aabb(&self.shapes[obj.shape_index as usize], obj.transform))
            .collect();

        let (nodes, indices) = bvh::build(&aabbs);
        if nodes.len() > isize::MAX as usize / std::mem::size_of::<shared_structs::BvhNode>() {
            return Err(SceneError::AllocationFailure {
                what: "scene BVH nodes",
                requested: nodes.len() * std::mem::size_of::<shared_structs::BvhNode>(),
            });
        }
        self.bvh_nodes = nodes;
        self.bvh_indices = indices;

        self.kernel_objects = self
            .objects
            .iter()
            .map(|obj| kernels::integrator::SceneObject {
                shape_index: obj.shape_index,
                material_index: obj.material_index,
                to_world: obj.transform.to_world(),
                to_local: obj.transform.to_local(),
            })
            .collect();

        self.build_light_table();
        Ok(())
    }

    fn build_light_table(&mut self) {
        self.area_lights.clear();
        for obj in &self.objects {
            let material = &self.materials[obj.material_index as usize];
            if material.is_emissive() {
                self.area_lights.push(AreaLight {
                    shape_index: obj.shape_index,
                    radiance: material.emission,
                });
            }
        }

        self.light_pick_table.clear();
        if self.area_lights.is_empty() {
            self.light_pick_table.push(LightPickEntry::SENTINEL);
            return;
        }

        let areas: Vec<f32> = self
            .area_lights
            .iter()
            .map(|l| self.shapes[l.shape_index as usize].surface_area().max(1e-9))
            .collect();
        let total: f32 = areas.iter().sum();
        let n = self.area_lights.len();
        let uniform_pdf = 1.0 / n as f32;

        // Pairs consecutive lights into binary alias-table entries; the
        // last unpaired light (for odd n) is a 100%-weighted self pair.
        let mut i = 0;
        while i < n {
            if i + 1 < n {
                let (a, b) = (i, i + 1);
                let weight_a = areas[a] / total;
                let weight_b = areas[b] / total;
                let ratio = weight_a / (weight_a + weight_b).max(1e-12);
                self.light_pick_table.push(LightPickEntry::new(
                    a as u32,
                    areas[a],
                    uniform_pdf,
                    ratio,
                    b as u32,
                    areas[b],
                    uniform_pdf,
                ));
                i += 2;
            } else {
                self.light_pick_table.push(LightPickEntry::new(
                    i as u32,
                    areas[i],
                    uniform_pdf,
                    1.0,
                    i as u32,
                    areas[i],
                    uniform_pdf,
                ));
                i += 1;
            }
        }
    }

    pub fn as_ref(&self) -> SceneRef<'_> {
        SceneRef {
            objects: &self.kernel_objects,
            shapes: &self.shapes,
            materials: &self.materials,
            bvh_nodes: &self.bvh_nodes,
            bvh_indices: &self.bvh_indices,
            area_lights: &self.area_lights,
            light_pick_table: &self.light_pick_table,
            environment: self.environment.as_ref(),
        }
    }
}

fn world_aabb(shape: &Shape, transform: Transform) -> shared_structs::Aabb {
    let local = shape.bounding_box();
    let to_world = transform.to_world();
    let corners = [
        Vec3::new(local.min.x, local.min.y, local.min.z),
        Vec3::new(local.max.x, local.min.y, local.min.z),
        Vec3::new(local.min.x, local.max.y, local.min.z),
        Vec3::new(local.max.x, local.max.y, local.min.z),
        Vec3::new(local.min.x, local.min.y, local.max.z),
        Vec3::new(local.max.x, local.min.y, local.max.z),
        Vec3::new(local.min.x, local.max.y, local.max.z),
        Vec3::new(local.max.x, local.max.y, local.max.z),
    ];
    let mut aabb = shared_structs::Aabb::EMPTY;
    for c in corners {
        aabb = aabb.union_point(to_world.transform_point3(c));
    }
    aabb
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_structs::BsdfKind;

    #[test]
    fn empty_scene_builds_without_error() {
        let mut scene = Scene::new();
        assert!(scene.build_bvh().is_ok());
    }

    #[test]
    fn light_table_is_sentinel_with_no_emitters() {
        let mut scene = Scene::new();
        let shape = scene.add_shape(Shape::Sphere(kernels::shapes::Sphere { center: Vec3::ZERO, radius: 1.0 }));
        let material = scene.add_material(MaterialData { bsdf: BsdfKind::Diffuse, ..Default::default() });
        scene.add_object(SceneObject::new(shape, material, Transform::identity()));
        scene.build_bvh().unwrap();
        assert!(scene.light_pick_table[0].is_sentinel());
    }

    #[test]
    fn as_ref_exposes_a_traceable_object() {
        let mut scene = Scene::new();
        let shape = scene.add_shape(Shape::Sphere(kernels::shapes::Sphere { center: Vec3::ZERO, radius: 1.0 }));
        let mut material = MaterialData { bsdf: BsdfKind::Null, ..Default::default() };
        material.emission = Vec3::new(3.0, 2.0, 1.0);
        let material = scene.add_material(material);
        scene.add_object(SceneObject::new(shape, material, Transform::identity()));
        scene.build_bvh().unwrap();

        let scene_ref = scene.as_ref();
        assert_eq!(scene_ref.objects.len(), 1);

        let mut rng = kernels::rng::Rng::new_for_worker(1, 0);
        let ray = shared_structs::Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z, f32::INFINITY);
        let radiance = kernels::integrator::radiance(
            &scene_ref,
            ray,
            shared_structs::NextEventEstimation::None,
            8,
            3,
            &mut rng,
        );
        assert!((radiance - Vec3::new(3.0, 2.0, 1.0)).length() < 1e-4);
    }
}
