//! The nine BSDF variants (spec.md section 4.5), dispatched through a
//! closed enum instead of the teacher's `dyn BSDF`/vtable `Lambertian`/`PBR`
//! pair (spec.md section 9, "Dynamic dispatch"). Local-frame convention:
//! `z` is the shading normal, `outgoing` points away from the surface
//! (toward the previous path vertex), `incoming` points into the surface
//! (toward the next vertex). `CosEpsilon` guards grazing samples the same
//! way the teacher's `Lambertian`/`PBR` pair silently produced near-zero
//! throughput instead of rejecting them.

use glam::Vec3;
use shared_structs::{BsdfKind, MaterialData};
use std::f32::consts::PI;

use crate::microfacet::Microfacet;
use crate::rng::Rng;
use crate::sampling;

pub const COS_EPSILON: f32 = 1e-6;

/// Tagged event type returned by every `sample` call (spec.md section 3).
/// Specular/Null events are Dirac deltas: `evaluate` on the matching
/// direction always returns zero value and zero PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    DiffuseReflection,
    GlossyReflection,
    GlossyRefraction,
    SpecularReflection,
    SpecularRefraction,
    Null,
}

impl EventType {
    pub fn is_specular(self) -> bool {
        matches!(
            self,
            EventType::SpecularReflection | EventType::SpecularRefraction | EventType::Null
        )
    }
}

/// Result of `sample`: `throughput` is already `f * cos_theta_i / pdf`,
/// ready to multiply directly into the path's running throughput
/// (spec.md section 4.7 integrator loop).
#[derive(Debug, Clone, Copy)]
pub struct BsdfSample {
    pub direction_local: Vec3,
    pub pdf: f32,
    pub throughput: Vec3,
    pub event: EventType,
}

/// `SamplingContext` (spec.md section 3): everything `sample` needs, plus
/// a wavelength that dispersive dielectrics may collapse to their hero
/// channel in place.
pub struct SamplingContext<'a> {
    pub material: &'a MaterialData,
    pub wavelength: &'a mut shared_structs::Wavelength,
    pub outgoing_local: Vec3,
}

/// `EvaluationContext` (spec.md section 3): used by next-event estimation
/// to weigh a BSDF against a light sample already chosen by direction.
pub struct EvaluationContext<'a> {
    pub material: &'a MaterialData,
    pub wavelength: &'a shared_structs::Wavelength,
    pub outgoing_local: Vec3,
    pub incoming_local: Vec3,
}

/// Samples a direction from `material`'s BSDF. Returns `None` for an
/// invalid sample (grazing, wrong-side, degenerate) — the integrator
/// terminates the path with zero contribution in that case (spec.md
/// section 7).
pub fn sample(ctx: &mut SamplingContext, rng: &mut Rng) -> Option<BsdfSample> {
    match ctx.material.bsdf {
        BsdfKind::Null => sample_null(ctx),
        BsdfKind::Diffuse => sample_diffuse(ctx, rng, false),
        BsdfKind::RoughDiffuse => sample_diffuse(ctx, rng, true),
        BsdfKind::Dielectric => sample_dielectric(ctx, rng),
        BsdfKind::RoughDielectric => sample_rough_dielectric(ctx, rng),
        BsdfKind::Metal => sample_metal(ctx),
        BsdfKind::RoughMetal => sample_rough_metal(ctx, rng),
        BsdfKind::Plastic => sample_plastic(ctx, rng, false),
        BsdfKind::RoughPlastic => sample_plastic(ctx, rng, true),
    }
}

/// Evaluates `material`'s BSDF for an already-chosen `incoming_local`
/// (used by NEE to weigh a direct light sample). Returns `(f * cos_theta_i,
/// pdf_solid_angle)`; both are zero for a Dirac-delta lobe.
pub fn evaluate(ctx: &EvaluationContext) -> (Vec3, f32) {
    match ctx.material.bsdf {
        BsdfKind::Null | BsdfKind::Dielectric | BsdfKind::Metal => (Vec3::ZERO, 0.0),
        BsdfKind::Diffuse => evaluate_diffuse(ctx, false),
        BsdfKind::RoughDiffuse => evaluate_diffuse(ctx, true),
        BsdfKind::RoughDielectric => evaluate_rough_dielectric(ctx),
        BsdfKind::RoughMetal => evaluate_rough_metal(ctx),
        BsdfKind::Plastic => evaluate_plastic(ctx),
        BsdfKind::RoughPlastic => evaluate_rough_plastic(ctx),
    }
}

fn local_normal(cos: f32) -> Vec3 {
    Vec3::new(0.0, 0.0, cos.signum())
}

// ---------------------------------------------------------------- Null

fn sample_null(ctx: &SamplingContext) -> Option<BsdfSample> {
    Some(BsdfSample {
        direction_local: -ctx.outgoing_local,
        pdf: 1.0,
        throughput: Vec3::ONE,
        event: EventType::Null,
    })
}

// ------------------------------------------------------------- Diffuse

fn sample_diffuse(ctx: &mut SamplingContext, rng: &mut Rng, rough: bool) -> Option<BsdfSample> {
    let cos_o = ctx.outgoing_local.z;
    if cos_o <= COS_EPSILON {
        return None;
    }
    let u = rng.next_2f32();
    let local = sampling::cosine_sample_hemisphere(u.x, u.y);
    let cos_i = local.z;
    if cos_i <= COS_EPSILON {
        return None;
    }

    let scale = if rough {
        oren_nayar_scale(ctx.material.roughness, ctx.outgoing_local, local)
    } else {
        1.0
    };

    Some(BsdfSample {
        direction_local: local,
        pdf: cos_i / PI,
        throughput: ctx.material.base_color * scale,
        event: EventType::DiffuseReflection,
    })
}

fn evaluate_diffuse(ctx: &EvaluationContext, rough: bool) -> (Vec3, f32) {
    let cos_o = ctx.outgoing_local.z;
    let cos_i = ctx.incoming_local.z;
    if cos_o <= COS_EPSILON || cos_i <= COS_EPSILON {
        return (Vec3::ZERO, 0.0);
    }
    let scale = if rough {
        oren_nayar_scale(ctx.material.roughness, ctx.outgoing_local, ctx.incoming_local)
    } else {
        1.0
    };
    let value = ctx.material.base_color * scale * cos_i / PI;
    (value, cos_i / PI)
}

/// Improved Oren-Nayar correction factor (spec.md section 4.5.2),
/// `sigma = roughness`.
fn oren_nayar_scale(roughness: f32, outgoing: Vec3, incoming: Vec3) -> f32 {
    let sigma2 = roughness * roughness;
    let a = 1.0 - 0.5 * sigma2 / (sigma2 + 0.33);
    let b = 0.45 * sigma2 / (sigma2 + 0.09);
    let s = incoming.dot(outgoing) - incoming.z * outgoing.z;
    if s > 0.0 {
        (a + b * s / incoming.z.max(outgoing.z)).max(0.0)
    } else {
        a.max(0.0)
    }
}

// ----------------------------------------------------------- Dielectric

/// Hero-wavelength IoR for a dispersive dielectric; collapses `ctx.wavelength`
/// to its single-channel state as a side effect (spec.md section 4.5.3).
fn dispersive_ior(material: &MaterialData, wavelength: &mut shared_structs::Wavelength) -> f32 {
    if !material.is_dispersive {
        return material.ior;
    }
    let lambda_nm = wavelength.channels()[0];
    wavelength.collapse_to_hero();
    sampling::cauchy_ior(material.ior, material.dispersion.c, material.dispersion.d, lambda_nm)
}

fn sample_dielectric(ctx: &mut SamplingContext, rng: &mut Rng) -> Option<BsdfSample> {
    let cos_o = ctx.outgoing_local.z;
    if cos_o.abs() <= COS_EPSILON {
        return None;
    }
    let eta0 = dispersive_ior(ctx.material, ctx.wavelength);
    let n = local_normal(cos_o);
    let f = sampling::fresnel_dielectric(cos_o, eta0);

    if rng.next_f32() < f {
        let dir = sampling::reflect(ctx.outgoing_local, n);
        Some(BsdfSample {
            direction_local: dir,
            pdf: f,
            throughput: Vec3::ONE,
            event: EventType::SpecularReflection,
        })
    } else {
        let eta_refract = if cos_o > 0.0 { 1.0 / eta0 } else { eta0 };
        let dir = sampling::refract(ctx.outgoing_local, n, eta_refract)?;
        Some(BsdfSample {
            direction_local: dir,
            pdf: 1.0 - f,
            throughput: ctx.material.base_color,
            event: EventType::SpecularRefraction,
        })
    }
}

// ------------------------------------------------------ Rough dielectric

fn sample_rough_dielectric(ctx: &mut SamplingContext, rng: &mut Rng) -> Option<BsdfSample> {
    if ctx.material.roughness < 0.01 {
        return sample_dielectric(ctx, rng);
    }
    let entering = ctx.outgoing_local.z > 0.0;
    let flip = if entering { 1.0 } else { -1.0 };
    let wo = ctx.outgoing_local * flip;
    if wo.z <= COS_EPSILON {
        return None;
    }

    let eta0 = dispersive_ior(ctx.material, ctx.wavelength);
    let mf = Microfacet::new(ctx.material.roughness);
    let u = rng.next_2f32();
    let m = mf.sample_normal(u.x, u.y);
    let cos_o_m = wo.dot(m);
    let eta_fresnel = if entering { eta0 } else { 1.0 / eta0 };
    let f = sampling::fresnel_dielectric(cos_o_m, eta_fresnel);

    if rng.next_f32() < f {
        let wi = sampling::reflect(wo, m);
        if wi.z <= COS_EPSILON {
            return None;
        }
        let g = mf.g(wo, wi);
        let throughput = g * cos_o_m.abs() / (wo.z * m.z);
        Some(BsdfSample {
            direction_local: wi * flip,
            pdf: f * mf.pdf_reflection(wo, m),
            throughput: Vec3::splat(throughput),
            event: EventType::GlossyReflection,
        })
    } else {
        let eta_refract = if entering { 1.0 / eta0 } else { eta0 };
        let wi = sampling::refract(wo, m, eta_refract)?;
        let g = mf.g(wo, wi);
        let throughput = g * cos_o_m.abs() / (wo.z * m.z);
        Some(BsdfSample {
            direction_local: wi * flip,
            pdf: (1.0 - f) * mf.pdf_refraction(wo, wi, m, eta_refract),
            throughput: ctx.material.base_color * throughput,
            event: EventType::GlossyRefraction,
        })
    }
}

fn evaluate_rough_dielectric(ctx: &EvaluationContext) -> (Vec3, f32) {
    if ctx.material.roughness < 0.01 {
        return (Vec3::ZERO, 0.0); // smooth limit is a delta, never hit by NEE
    }
    let wo = ctx.outgoing_local;
    let wi = ctx.incoming_local;
    if wo.z.abs() <= COS_EPSILON || wi.z.abs() <= COS_EPSILON {
        return (Vec3::ZERO, 0.0);
    }

    let eta0 = ctx.material.ior; // evaluate never mutates the shared wavelength
    let mf = Microfacet::new(ctx.material.roughness);
    let entering = wo.z > 0.0;
    let same_side = (wo.z > 0.0) == (wi.z > 0.0);
    let flip = if entering { 1.0 } else { -1.0 };
    let (wo, wi) = (wo * flip, wi * flip);

    if same_side {
        let m = (wo + wi).normalize();
        if m.z <= 0.0 {
            return (Vec3::ZERO, 0.0);
        }
        let eta_fresnel = if entering { eta0 } else { 1.0 / eta0 };
        let f = sampling::fresnel_dielectric(wo.dot(m), eta_fresnel);
        let d = mf.d(m);
        let g = mf.g(wo, wi);
        let value = Vec3::splat(f * d * g / (4.0 * wo.z));
        let pdf = f * mf.pdf_reflection(wo, m);
        (value, pdf)
    } else {
        let eta_refract = if entering { 1.0 / eta0 } else { eta0 };
        let m = -(wo + wi * eta_refract).normalize();
        if m.z <= 0.0 {
            return (Vec3::ZERO, 0.0);
        }
        let eta_fresnel = if entering { eta0 } else { 1.0 / eta0 };
        let f = sampling::fresnel_dielectric(wo.dot(m), eta_fresnel);
        let d = mf.d(m);
        let g = mf.g(wo, wi);
        let denom_term = eta_refract * wo.dot(m) + wi.dot(m);
        if denom_term.abs() <= 1e-9 {
            return (Vec3::ZERO, 0.0);
        }
        let value_scalar = (1.0 - f) * d * g * wi.dot(m).abs() * wo.dot(m).abs()
            / (wo.z * denom_term * denom_term);
        let value = ctx.material.base_color * value_scalar;
        let pdf = (1.0 - f) * mf.pdf_refraction(wo, wi, m, eta_refract);
        (value, pdf)
    }
}

// ------------------------------------------------------------- Metal

fn sample_metal(ctx: &SamplingContext) -> Option<BsdfSample> {
    let cos_o = ctx.outgoing_local.z;
    if cos_o <= COS_EPSILON {
        return None;
    }
    let n = local_normal(cos_o);
    let dir = sampling::reflect(ctx.outgoing_local, n);
    // The source's Fresnel weighting preserves a deliberate bug (spec.md
    // section 9): metal color should come from a wavelength-dependent IoR,
    // not from `baseColor` tinting a conductor Fresnel term.
    let f = conductor_fresnel_rgb(cos_o, ctx.material);
    Some(BsdfSample {
        direction_local: dir,
        pdf: 1.0,
        throughput: ctx.material.base_color * f,
        event: EventType::SpecularReflection,
    })
}

fn conductor_fresnel_rgb(cos_i: f32, material: &MaterialData) -> Vec3 {
    Vec3::new(
        sampling::fresnel_conductor(cos_i, material.ior, material.k.x),
        sampling::fresnel_conductor(cos_i, material.ior, material.k.y),
        sampling::fresnel_conductor(cos_i, material.ior, material.k.z),
    )
}

// -------------------------------------------------------- Rough metal

fn sample_rough_metal(ctx: &SamplingContext, rng: &mut Rng) -> Option<BsdfSample> {
    if ctx.material.roughness < 0.01 {
        return sample_metal(ctx);
    }
    let wo = ctx.outgoing_local;
    if wo.z <= COS_EPSILON {
        return None;
    }
    let mf = Microfacet::new(ctx.material.roughness);
    let u = rng.next_2f32();
    let m = mf.sample_normal(u.x, u.y);
    let wi = sampling::reflect(wo, m);
    if wi.z <= COS_EPSILON {
        return None;
    }
    let g = mf.g(wo, wi);
    let cos_o_m = wo.dot(m);
    let f = conductor_fresnel_rgb(cos_o_m, ctx.material);
    let throughput = ctx.material.base_color * f * (g * cos_o_m.abs() / (wo.z * m.z));
    Some(BsdfSample {
        direction_local: wi,
        pdf: mf.pdf_reflection(wo, m),
        throughput,
        event: EventType::GlossyReflection,
    })
}

fn evaluate_rough_metal(ctx: &EvaluationContext) -> (Vec3, f32) {
    if ctx.material.roughness < 0.01 {
        return (Vec3::ZERO, 0.0);
    }
    let wo = ctx.outgoing_local;
    let wi = ctx.incoming_local;
    if wo.z <= COS_EPSILON || wi.z <= COS_EPSILON {
        return (Vec3::ZERO, 0.0);
    }
    let m = (wo + wi).normalize();
    if m.z <= 0.0 {
        return (Vec3::ZERO, 0.0);
    }
    let mf = Microfacet::new(ctx.material.roughness);
    let d = mf.d(m);
    let g = mf.g(wo, wi);
    let f = conductor_fresnel_rgb(wo.dot(m), ctx.material);
    let value = ctx.material.base_color * f * (d * g / (4.0 * wo.z));
    let pdf = mf.pdf_normal(m) / (4.0 * wo.dot(m).abs().max(1e-9));
    (value, pdf)
}

// --------------------------------------------------------- Plastic

fn specular_pick_probability(f_o: f32, base_color: Vec3) -> f32 {
    let w_s = f_o;
    let w_d = (1.0 - f_o) * base_color.max_element();
    let sum = w_s + w_d;
    if sum <= 0.0 {
        0.0
    } else {
        (w_s / sum).clamp(0.0, 1.0)
    }
}

fn sample_plastic(ctx: &mut SamplingContext, rng: &mut Rng, rough: bool) -> Option<BsdfSample> {
    if rough && ctx.material.roughness < 0.01 {
        return sample_plastic(ctx, rng, false);
    }
    let wo = ctx.outgoing_local;
    if wo.z <= COS_EPSILON {
        return None;
    }
    let f_o = sampling::fresnel_dielectric(wo.z, ctx.material.ior);
    let p_specular = specular_pick_probability(f_o, ctx.material.base_color);

    if rng.next_f32() < p_specular {
        if rough {
            let mf = Microfacet::new(ctx.material.roughness);
            let u = rng.next_2f32();
            let m = mf.sample_normal(u.x, u.y);
            let wi = sampling::reflect(wo, m);
            if wi.z <= COS_EPSILON {
                return None;
            }
            let g = mf.g(wo, wi);
            let cos_o_m = wo.dot(m);
            let f_m = sampling::fresnel_dielectric(cos_o_m, ctx.material.ior);
            let scalar = f_m * g * cos_o_m.abs() / (wo.z * m.z * p_specular.max(1e-9));
            Some(BsdfSample {
                direction_local: wi,
                pdf: p_specular * (mf.pdf_normal(m) / (4.0 * cos_o_m.abs().max(1e-9))),
                throughput: Vec3::splat(scalar),
                event: EventType::GlossyReflection,
            })
        } else {
            let n = local_normal(wo.z);
            let dir = sampling::reflect(wo, n);
            Some(BsdfSample {
                direction_local: dir,
                pdf: p_specular,
                throughput: Vec3::ONE,
                event: EventType::SpecularReflection,
            })
        }
    } else {
        let u = rng.next_2f32();
        let local = sampling::cosine_sample_hemisphere(u.x, u.y);
        let cos_i = local.z;
        if cos_i <= COS_EPSILON {
            return None;
        }
        let f_i = sampling::fresnel_dielectric(cos_i, ctx.material.ior);
        let tint = (1.0 - f_o) * (1.0 - f_i);
        let p_diffuse = 1.0 - p_specular;
        Some(BsdfSample {
            direction_local: local,
            pdf: p_diffuse * cos_i / PI,
            throughput: ctx.material.base_color * (tint / p_diffuse.max(1e-9)),
            event: EventType::DiffuseReflection,
        })
    }
}

fn evaluate_plastic(ctx: &EvaluationContext) -> (Vec3, f32) {
    let wo = ctx.outgoing_local;
    let wi = ctx.incoming_local;
    if wo.z <= COS_EPSILON || wi.z <= COS_EPSILON {
        return (Vec3::ZERO, 0.0);
    }
    let f_o = sampling::fresnel_dielectric(wo.z, ctx.material.ior);
    let f_i = sampling::fresnel_dielectric(wi.z, ctx.material.ior);
    let tint = (1.0 - f_o) * (1.0 - f_i);
    let value = ctx.material.base_color * tint * wi.z / PI;
    let p_specular = specular_pick_probability(f_o, ctx.material.base_color);
    let pdf = (1.0 - p_specular) * wi.z / PI;
    (value, pdf)
}

fn evaluate_rough_plastic(ctx: &EvaluationContext) -> (Vec3, f32) {
    if ctx.material.roughness < 0.01 {
        return evaluate_plastic(ctx);
    }
    let wo = ctx.outgoing_local;
    let wi = ctx.incoming_local;
    if wo.z <= COS_EPSILON || wi.z <= COS_EPSILON {
        return (Vec3::ZERO, 0.0);
    }
    let f_o = sampling::fresnel_dielectric(wo.z, ctx.material.ior);
    let f_i = sampling::fresnel_dielectric(wi.z, ctx.material.ior);
    let tint = (1.0 - f_o) * (1.0 - f_i);
    let diffuse_value = ctx.material.base_color * tint * wi.z / PI;
    let diffuse_pdf = wi.z / PI;

    let p_specular = specular_pick_probability(f_o, ctx.material.base_color);
    let mut glossy_value = Vec3::ZERO;
    let mut glossy_pdf = 0.0;
    let m = (wo + wi).normalize();
    if m.z > 0.0 {
        let mf = Microfacet::new(ctx.material.roughness);
        let d = mf.d(m);
        let g = mf.g(wo, wi);
        let f_m = sampling::fresnel_dielectric(wo.dot(m), ctx.material.ior);
        glossy_value = Vec3::splat(f_m * d * g / (4.0 * wo.z));
        glossy_pdf = mf.pdf_normal(m) / (4.0 * wo.dot(m).abs().max(1e-9));
    }

    let value = diffuse_value + glossy_value;
    let pdf = (1.0 - p_specular) * diffuse_pdf + p_specular * glossy_pdf;
    (value, pdf)
}
