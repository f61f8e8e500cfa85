//! Light sources (spec.md section 4.6): area lights backed by a
//! [`crate::shapes::Shape`] and a single uniform environment light. The
//! teacher has no light abstraction of its own — every emitter is just a
//! triangle whose material has non-zero `emissive` — so this module is
//! grounded on `kernels/src/light_pick.rs`'s `calculate_light_pdf` (the
//! area-to-solid-angle conversion) generalized from "triangle" to "shape".

use glam::Vec3;

use crate::rng::Rng;
use crate::shapes::Shape;

/// A direction, distance and radiance sampled from a light, already
/// converted to a solid-angle PDF with respect to the shading point
/// (spec.md section 4.6).
#[derive(Debug, Clone, Copy)]
pub struct EmissionSample {
    pub direction: Vec3,
    pub distance: f32,
    pub radiance: Vec3,
    pub pdf_solid_angle: f32,
}

pub struct AreaLight {
    pub shape_index: u32,
    pub radiance: Vec3,
}

impl AreaLight {
    /// Samples a direction towards the backing shape as seen from
    /// `reference` (spec.md section 3, `sample_by_ref` / section 4.4.1's
    /// sphere solid-angle cone sampling, with the generic area+Jacobian
    /// fallback for every other shape).
    pub fn sample_emission(&self, shape: &Shape, reference: Vec3, rng: &mut Rng) -> Option<EmissionSample> {
        let sample = shape.sample_by_ref(reference, rng)?;
        Some(EmissionSample {
            direction: sample.direction,
            distance: sample.distance,
            radiance: self.radiance,
            pdf_solid_angle: sample.pdf_solid_angle,
        })
    }

    /// Converts an already-known hit on this light's shape (found via a
    /// BSDF-sampled ray that happened to land on it) into the PDF NEE
    /// would have produced, for MIS weighting (spec.md section 4.7).
    pub fn pdf_solid_angle(&self, shape: &Shape, reference: Vec3, hit_point: Vec3, hit_normal: Vec3) -> f32 {
        shape.pdf_by_ref(reference, hit_point, hit_normal)
    }
}

/// Uniform directional environment light (spec.md section 4.6): no
/// importance sampling over an HDRI, matching the teacher's procedural
/// `skybox::scatter` fallback rather than the full image-based env map
/// the original renderer eventually grew (spec.md Non-goals).
pub struct EnvironmentLight {
    pub radiance: Vec3,
}

impl EnvironmentLight {
    pub fn sample_emission(&self, rng: &mut Rng) -> EmissionSample {
        let u = rng.next_2f32();
        let direction = crate::sampling::uniform_sample_sphere(u.x, u.y);
        EmissionSample {
            direction,
            distance: f32::INFINITY,
            radiance: self.radiance,
            pdf_solid_angle: 1.0 / (4.0 * std::f32::consts::PI),
        }
    }

    pub fn evaluate(&self, _direction: Vec3) -> Vec3 {
        self.radiance
    }

    pub fn pdf_solid_angle(&self) -> f32 {
        1.0 / (4.0 * std::f32::consts::PI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Shape, Sphere};

    #[test]
    fn area_light_sample_converts_area_pdf_to_solid_angle() {
        let shape = Shape::Sphere(Sphere { center: Vec3::ZERO, radius: 1.0 });
        let light = AreaLight { shape_index: 0, radiance: Vec3::ONE };
        let mut rng = Rng::new_for_worker(3, 0);
        let reference = Vec3::new(0.0, 0.0, -5.0);
        let sample = light.sample_emission(&shape, reference, &mut rng).unwrap();
        assert!(sample.pdf_solid_angle > 0.0);
        assert!(sample.distance > 3.0);
    }

    #[test]
    fn environment_light_pdf_is_uniform_over_the_sphere() {
        let env = EnvironmentLight { radiance: Vec3::new(1.0, 2.0, 3.0) };
        let expected = 1.0 / (4.0 * std::f32::consts::PI);
        assert!((env.pdf_solid_angle() - expected).abs() < 1e-6);
        assert_eq!(env.evaluate(Vec3::X), Vec3::new(1.0, 2.0, 3.0));
    }
}
