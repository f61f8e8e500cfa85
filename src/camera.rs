//! The pinhole camera (spec.md section 6's external API: `set_transform`,
//! `set_perspective`, `generate_ray`). Grounded on
//! `original_source/Core/Scene/Camera.cpp`'s `GenerateRay` — the teacher
//! has no camera of its own (every GPU dispatch hard-codes an
//! orbit camera inline in `app.rs`), so this is new code following the
//! original's screen-space ray construction exactly, minus depth-of-field
//! and barrel distortion (not named by spec.md section 6 and not exercised
//! by any of its testable properties).

use glam::{Mat4, Quat, Vec3};

use kernels::rng::Rng;

/// Per-worker scratch the camera (and, eventually, other per-sample
/// kernels) draw randomness from, matching the teacher's/original's
/// `RenderingContext` (spec.md section 3, "BSDF sampling/evaluation
/// contexts" and section 5, "Per-worker state").
pub struct RenderingContext {
    pub rng: Rng,
}

impl RenderingContext {
    pub fn new(entropy: u64, worker_id: u32) -> Self {
        Self { rng: Rng::new_for_worker(entropy, worker_id) }
    }
}

/// World-space placement of the camera: origin plus orientation.
#[derive(Debug, Clone, Copy)]
pub struct CameraTransform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl CameraTransform {
    pub fn identity() -> Self {
        Self { position: Vec3::ZERO, rotation: Quat::IDENTITY }
    }

    fn to_matrix(self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }
}

pub struct Camera {
    transform: CameraTransform,
    local_to_world: Mat4,
    aspect_ratio: f32,
    field_of_view: f32,
    tan_half_fov: f32,
}

impl Default for Camera {
    fn default() -> Self {
        let transform = CameraTransform::identity();
        Self {
            transform,
            local_to_world: transform.to_matrix(),
            aspect_ratio: 1.0,
            field_of_view: 20f32.to_radians(),
            tan_half_fov: (20f32.to_radians() * 0.5).tan(),
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_transform(&mut self, transform: &CameraTransform) {
        self.transform = *transform;
        self.local_to_world = transform.to_matrix();
    }

    pub fn set_perspective(&mut self, aspect_ratio: f32, fov_y_radians: f32) {
        self.aspect_ratio = aspect_ratio;
        self.field_of_view = fov_y_radians;
        self.tan_half_fov = (fov_y_radians * 0.5).tan();
    }

    /// Generates a world-space camera ray for film coordinates `uv`, each
    /// component in `[0, 1)` (spec.md section 6). `+x` is right, `+y` is
    /// up, `+z` is the camera's forward axis, matching the original's
    /// `transform[0]`/`transform[1]`/`transform[2]` column convention.
    pub fn generate_ray(&self, uv: glam::Vec2, context: &mut RenderingContext) -> shared_structs::Ray {
        let _ = &mut context.rng; // reserved for future DoF/barrel-distortion sampling
        let offset = uv * 2.0 - glam::Vec2::ONE;

        let right = self.local_to_world.x_axis.truncate();
        let up = self.local_to_world.y_axis.truncate();
        let forward = self.local_to_world.z_axis.truncate();
        let origin = self.local_to_world.w_axis.truncate();

        let direction = forward + (right * (offset.x * self.aspect_ratio) + up * offset.y) * self.tan_half_fov;
        shared_structs::Ray::new(origin, direction, f32::INFINITY)
    }

    /// `world_to_film` (spec.md section 8, round-trip property):
    /// perspective-projects a world point back to `[0, 1)` film
    /// coordinates. Returns `None` behind the camera.
    pub fn world_to_film(&self, world_position: Vec3) -> Option<glam::Vec2> {
        let world_to_local = self.local_to_world.inverse();
        let local = world_to_local.transform_point3(world_position);
        if local.z <= 0.0 {
            return None;
        }
        let offset = glam::Vec2::new(local.x / (local.z * self.tan_half_fov * self.aspect_ratio), local.y / (local.z * self.tan_half_fov));
        Some((offset + glam::Vec2::ONE) * 0.5)
    }
}
