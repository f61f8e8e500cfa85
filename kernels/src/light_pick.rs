//! Light-picking alias table (spec.md section 4.6): binary choice between
//! two candidate lights per table entry, weighted by `ratio`, so a single
//! uniform table index plus one more uniform random number yields a light
//! proportional to its contribution. The teacher built this only for
//! emissive triangles; `light_index_a`/`light_index_b` here index into
//! whatever light list the scene built (area lights over any [`crate::shapes::Shape`],
//! not triangles specifically) — the picking math itself is unchanged.
//! Shadow-ray tracing and the actual NEE/MIS combination live in
//! [`crate::integrator`], which is the first module with scene access.

use shared_structs::{LightPickEntry, NextEventEstimation};
use glam::Vec3;

use crate::rng::Rng;
use crate::util;

pub fn pick_light(table: &[LightPickEntry], rng: &mut Rng) -> (u32, f32, f32) {
    let r = rng.next_2f32();
    let entry = table[((r.x * table.len() as f32) as usize).min(table.len() - 1)];
    if r.y < entry.ratio {
        (entry.light_index_a, entry.light_area_a, entry.light_pick_pdf_a)
    } else {
        (entry.light_index_b, entry.light_area_b, entry.light_pick_pdf_b)
    }
}

/// Converts a light's area-domain sampling PDF to the solid-angle domain
/// as seen from the shading point (spec.md section 4.6): `dw = (-wi . n)
/// / r^2 * dA`, so `pdf_solid_angle = pdf_area * r^2 / (-wi . n)` and with
/// uniform-area sampling `pdf_area = 1 / light_area`.
pub fn calculate_light_pdf(light_area: f32, light_distance: f32, light_normal: Vec3, light_direction: Vec3) -> f32 {
    let cos_theta = light_normal.dot(-light_direction);
    if cos_theta <= 0.0 {
        return 0.0;
    }
    light_distance * light_distance / (light_area * cos_theta)
}

/// Combines a BSDF-side and light-side PDF under the requested NEE mode.
/// MIS uses the balance heuristic by default (spec.md section 4.7). Specular
/// events never reach this function with a light-sample weight to combine:
/// [`crate::integrator::radiance`] special-cases `EventType::is_specular()`
/// and lets the BSDF term win unconditionally before a weight would be
/// computed, which is the finite-arithmetic-safe equivalent of the spec's
/// "specular events supply `pdf = infinity`" rule.
pub fn get_weight(nee_mode: NextEventEstimation, p1: f32, p2: f32) -> f32 {
    match nee_mode {
        NextEventEstimation::None => 1.0,
        NextEventEstimation::MultipleImportanceSampling => util::balance_heuristic(p1, p2),
        NextEventEstimation::DirectLightSampling => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_light_respects_the_ratio_split() {
        let table = [LightPickEntry::new(1, 1.0, 1.0, 1.0, 2, 1.0, 1.0)];
        let mut rng = Rng::new_for_worker(5, 0);
        for _ in 0..20 {
            let (idx, _, _) = pick_light(&table, &mut rng);
            assert_eq!(idx, 1);
        }
    }

    #[test]
    fn light_pdf_is_zero_when_facing_away() {
        let pdf = calculate_light_pdf(1.0, 2.0, Vec3::Z, Vec3::Z);
        assert_eq!(pdf, 0.0);
    }

    #[test]
    fn light_pdf_matches_closed_form() {
        let pdf = calculate_light_pdf(2.0, 3.0, Vec3::Z, -Vec3::Z);
        assert!((pdf - 9.0 / 2.0).abs() < 1e-6);
    }
}
