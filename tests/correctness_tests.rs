//! End-to-end scenarios (spec.md section 8): a 32x32 viewport, `fov_y =
//! 10deg`, camera at `(0,0,-3)` facing `+z`, for a handful of scenes
//! whose converged radiance is known in closed form. Grounded on the
//! teacher's own `furnace_test` in this file (a diffuse sphere lit by a
//! uniform environment must converge back to `albedo * L_env`), extended
//! to the other closed-form scenes spec.md names: an empty scene, an
//! emissive sphere seen directly, a mirror, and an energy-conserving
//! dielectric.

use glam::{Quat, Vec3};
use lumentrace::camera::CameraTransform;
use lumentrace::scene::{SceneObject, Transform};
use lumentrace::{Camera, Renderer, Scene, Viewport};
use shared_structs::{BsdfKind, MaterialData};

const VIEWPORT_SIZE: u32 = 32;
const FOV_Y_DEGREES: f32 = 10.0;

fn new_camera() -> Camera {
    let mut camera = Camera::new();
    camera.set_transform(&CameraTransform { position: Vec3::new(0.0, 0.0, -3.0), rotation: Quat::IDENTITY });
    camera.set_perspective(1.0, FOV_Y_DEGREES.to_radians());
    camera
}

fn average_pixel(viewport: &Viewport, x: u32, y: u32) -> Vec3 {
    viewport.sum_buffer().pixel(x, y) / viewport.passes() as f32
}

fn unit_sphere_scene(material: MaterialData) -> Scene {
    let mut scene = Scene::new();
    let shape = scene.add_shape(kernels::shapes::Shape::Sphere(kernels::shapes::Sphere { center: Vec3::ZERO, radius: 1.0 }));
    let material = scene.add_material(material);
    scene.add_object(SceneObject::new(shape, material, Transform::identity()));
    scene
}

#[test]
fn empty_scene_renders_exactly_black() {
    let scene = Scene::new();
    let renderer = Renderer::create("Path Tracer MIS", &scene).unwrap();
    let mut viewport = Viewport::new(renderer, 1);
    viewport.resize(VIEWPORT_SIZE, VIEWPORT_SIZE);
    viewport.render(&new_camera());

    for y in 0..VIEWPORT_SIZE {
        for x in 0..VIEWPORT_SIZE {
            assert_eq!(average_pixel(&viewport, x, y), Vec3::ZERO);
        }
    }
}

#[test]
fn background_only_scene_renders_the_flat_environment() {
    let mut scene = Scene::new();
    scene.set_environment(Vec3::new(1.0, 2.0, 3.0));
    scene.build_bvh().unwrap();

    let renderer = Renderer::create("Path Tracer MIS", &scene).unwrap();
    let mut viewport = Viewport::new(renderer, 2);
    viewport.resize(VIEWPORT_SIZE, VIEWPORT_SIZE);
    viewport.render(&new_camera());

    for y in 0..VIEWPORT_SIZE {
        for x in 0..VIEWPORT_SIZE {
            let pixel = average_pixel(&viewport, x, y);
            assert!((pixel - Vec3::new(1.0, 2.0, 3.0)).abs().max_element() < 0.01);
        }
    }
}

#[test]
fn emissive_sphere_is_visible_against_the_background_on_the_first_pass() {
    let mut scene = unit_sphere_scene(MaterialData { bsdf: BsdfKind::Null, emission: Vec3::new(3.0, 2.0, 1.0), ..Default::default() });
    scene.set_environment(Vec3::new(1.0, 2.0, 3.0));
    scene.build_bvh().unwrap();

    let renderer = Renderer::create("Path Tracer MIS", &scene).unwrap();
    let mut viewport = Viewport::new(renderer, 3);
    viewport.resize(VIEWPORT_SIZE, VIEWPORT_SIZE);
    viewport.render(&new_camera());

    let center = VIEWPORT_SIZE / 2;
    let center_pixel = average_pixel(&viewport, center, center);
    assert!((center_pixel - Vec3::new(3.0, 2.0, 1.0)).length() < 0.2);

    let corner_pixel = average_pixel(&viewport, 0, 0);
    assert!((corner_pixel - Vec3::new(1.0, 2.0, 3.0)).length() < 0.1);
}

#[test]
fn diffuse_sphere_furnace_test_converges_to_albedo_times_environment() {
    let mut scene = unit_sphere_scene(MaterialData {
        bsdf: BsdfKind::Diffuse,
        base_color: Vec3::new(0.4, 0.6, 0.8),
        ..Default::default()
    });
    scene.set_environment(Vec3::new(1.0, 2.0, 3.0));
    scene.build_bvh().unwrap();

    let renderer = Renderer::create("Path Tracer MIS", &scene).unwrap();
    let mut viewport = Viewport::new(renderer, 4);
    viewport.resize(VIEWPORT_SIZE, VIEWPORT_SIZE);
    for _ in 0..100 {
        viewport.render(&new_camera());
    }

    let center = VIEWPORT_SIZE / 2;
    let pixel = average_pixel(&viewport, center, center);
    let expected = Vec3::new(0.4, 1.2, 2.4);
    assert!((pixel - expected).abs().max_element() < 0.05, "got {pixel:?}, expected {expected:?}");
}

#[test]
fn smooth_metal_sphere_mirrors_the_environment() {
    let mut scene = unit_sphere_scene(MaterialData {
        bsdf: BsdfKind::Metal,
        base_color: Vec3::new(0.4, 0.6, 0.8),
        roughness: 0.0,
        ior: 0.0,
        k: Vec3::splat(100.0),
        ..Default::default()
    });
    scene.set_environment(Vec3::new(1.0, 2.0, 3.0));
    scene.build_bvh().unwrap();

    let renderer = Renderer::create("Path Tracer MIS", &scene).unwrap();
    let mut viewport = Viewport::new(renderer, 5);
    viewport.resize(VIEWPORT_SIZE, VIEWPORT_SIZE);
    for _ in 0..20 {
        viewport.render(&new_camera());
    }

    let center = VIEWPORT_SIZE / 2;
    let pixel = average_pixel(&viewport, center, center);
    let expected = Vec3::new(0.4, 1.2, 2.4);
    assert!((pixel - expected).abs().max_element() < 0.05, "got {pixel:?}, expected {expected:?}");
}

#[test]
fn smooth_dielectric_sphere_conserves_energy_against_a_flat_background() {
    let mut scene = unit_sphere_scene(MaterialData { bsdf: BsdfKind::Dielectric, roughness: 0.0, ior: 1.5, ..Default::default() });
    scene.set_environment(Vec3::new(1.0, 2.0, 3.0));
    scene.build_bvh().unwrap();

    let renderer = Renderer::create("Path Tracer MIS", &scene).unwrap();
    let mut viewport = Viewport::new(renderer, 6);
    viewport.resize(VIEWPORT_SIZE, VIEWPORT_SIZE);
    for _ in 0..1000 {
        viewport.render(&new_camera());
    }

    let center = VIEWPORT_SIZE / 2;
    let pixel = average_pixel(&viewport, center, center);
    let expected = Vec3::new(1.0, 2.0, 3.0);
    assert!((pixel - expected).abs().max_element() < 0.075, "got {pixel:?}, expected {expected:?}");
}
