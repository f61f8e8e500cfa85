//! Shared GGX microfacet core (spec.md section 4.5.8), grounded on
//! `original_source/Core/Material/BSDF/Microfacet.h`: a single `D`/`G1`/`G`/
//! `sample`/`pdf` implementation shared by rough dielectric, rough metal and
//! rough plastic, instead of each BSDF re-deriving its own copy the way the
//! teacher's `util::ggx_distribution`/`sample_ggx`/`geometry_schlick_ggx`
//! family does for its single PBR lobe.

use glam::Vec3;
use std::f32::consts::PI;

/// `alpha = roughness^2` everywhere in this module, per spec.md section 4.5.8.
#[derive(Debug, Clone, Copy)]
pub struct Microfacet {
    pub alpha: f32,
}

impl Microfacet {
    pub fn new(roughness: f32) -> Self {
        Self {
            alpha: (roughness * roughness).max(1e-4),
        }
    }

    /// Trowbridge-Reitz (GGX) normal distribution, `m` in local shading
    /// frame (`z` = macro-normal).
    pub fn d(&self, m: Vec3) -> f32 {
        let cos_theta_m = m.z;
        if cos_theta_m <= 0.0 {
            return 0.0;
        }
        let alpha2 = self.alpha * self.alpha;
        let cos2 = cos_theta_m * cos_theta_m;
        let tan2 = (1.0 - cos2).max(0.0) / cos2.max(1e-12);
        let denom = cos2 * cos2 * (alpha2 + tan2).powi(2);
        alpha2 / (PI * denom.max(1e-12))
    }

    /// Smith masking/shadowing for a single direction `v` (local frame).
    pub fn g1(&self, v: Vec3) -> f32 {
        let cos_theta_v = v.z;
        if cos_theta_v <= 0.0 {
            return 0.0;
        }
        let cos2 = cos_theta_v * cos_theta_v;
        let tan2 = (1.0 - cos2).max(0.0) / cos2.max(1e-12);
        2.0 / (1.0 + (1.0 + self.alpha * self.alpha * tan2).sqrt())
    }

    /// Separable Smith shadowing-masking term `G = G1(wo) * G1(wi)`.
    pub fn g(&self, wo: Vec3, wi: Vec3) -> f32 {
        self.g1(wo) * self.g1(wi)
    }

    /// Samples a microfacet normal `m` from the visible-normal-agnostic
    /// GGX distribution (spec.md section 4.5.8): `cos^2(theta) = (1-u.x) /
    /// (1 + (alpha^2-1) u.x)`, `phi = 2*pi*u.y`.
    pub fn sample_normal(&self, u1: f32, u2: f32) -> Vec3 {
        let alpha2 = self.alpha * self.alpha;
        let cos2_theta = (1.0 - u1) / (1.0 + (alpha2 - 1.0) * u1).max(1e-12);
        let cos_theta = cos2_theta.max(0.0).sqrt();
        let sin_theta = (1.0 - cos2_theta).max(0.0).sqrt();
        let phi = 2.0 * PI * u2;
        Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
    }

    /// PDF of the sampled microfacet normal itself, w.r.t. solid angle
    /// around `m`: `D(m) * cos(theta_m)`.
    pub fn pdf_normal(&self, m: Vec3) -> f32 {
        self.d(m) * m.z.max(0.0)
    }

    /// Converts a microfacet-normal PDF to a PDF over the reflected
    /// direction `wi`: Jacobian `1 / (4 |wo . m|)`.
    pub fn pdf_reflection(&self, wo: Vec3, m: Vec3) -> f32 {
        let denom = 4.0 * wo.dot(m).abs();
        if denom <= 0.0 {
            0.0
        } else {
            self.pdf_normal(m) / denom
        }
    }

    /// Converts a microfacet-normal PDF to a PDF over the refracted
    /// direction `wi`, per the Walter-Marschner refraction Jacobian
    /// (spec.md section 4.5.4): `|wi.m| / (eta wo.m + wi.m)^2`.
    pub fn pdf_refraction(&self, wo: Vec3, wi: Vec3, m: Vec3, eta: f32) -> f32 {
        let denom_term = eta * wo.dot(m) + wi.dot(m);
        let denom = denom_term * denom_term;
        if denom <= 1e-12 {
            0.0
        } else {
            self.pdf_normal(m) * wi.dot(m).abs() / denom
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smooth_limit_is_extremely_peaked() {
        let smooth = Microfacet::new(0.01);
        let rough = Microfacet::new(0.5);
        assert!(smooth.d(Vec3::Z) > rough.d(Vec3::Z));
    }

    #[test]
    fn g1_is_one_at_normal_incidence_in_smooth_limit() {
        let mf = Microfacet::new(0.001);
        assert!(mf.g1(Vec3::Z) > 0.99);
    }

    #[test]
    fn sampled_normal_pdf_integrates_towards_one() {
        let mf = Microfacet::new(0.4);
        let mut rng = crate::rng::Rng::new_for_worker(1, 0);
        let n = 20000;
        let mut sum = 0.0;
        for _ in 0..n {
            let u = rng.next_2f32();
            let m = mf.sample_normal(u.x, u.y);
            let pdf = mf.pdf_normal(m);
            if pdf > 0.0 {
                sum += mf.d(m) * m.z / pdf;
            }
        }
        let avg = sum / n as f32;
        assert!((avg - 1.0).abs() < 0.05, "avg {avg}");
    }
}
