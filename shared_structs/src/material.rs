use glam::Vec3;

/// The nine BSDF variants, wire-compatible with the original renderer's
/// material selection string table (spec.md section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BsdfKind {
    Null,
    Diffuse,
    RoughDiffuse,
    Dielectric,
    RoughDielectric,
    Metal,
    RoughMetal,
    Plastic,
    RoughPlastic,
}

impl BsdfKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BsdfKind::Null => "null",
            BsdfKind::Diffuse => "diffuse",
            BsdfKind::RoughDiffuse => "roughDiffuse",
            BsdfKind::Dielectric => "dielectric",
            BsdfKind::RoughDielectric => "roughDielectric",
            BsdfKind::Metal => "metal",
            BsdfKind::RoughMetal => "roughMetal",
            BsdfKind::Plastic => "plastic",
            BsdfKind::RoughPlastic => "roughPlastic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "null" => BsdfKind::Null,
            "diffuse" => BsdfKind::Diffuse,
            "roughDiffuse" => BsdfKind::RoughDiffuse,
            "dielectric" => BsdfKind::Dielectric,
            "roughDielectric" => BsdfKind::RoughDielectric,
            "metal" => BsdfKind::Metal,
            "roughMetal" => BsdfKind::RoughMetal,
            "plastic" => BsdfKind::Plastic,
            "roughPlastic" => BsdfKind::RoughPlastic,
            _ => return None,
        })
    }
}

/// Cauchy's-equation dispersion coefficients for a dielectric:
/// `eta(lambda) = eta0 + C/lambda^2 + D/lambda^4`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DispersionParams {
    pub c: f32,
    pub d: f32,
}

/// Resolved per-surface material parameters, bound to a `BsdfKind`.
/// Textured parameters are resolved to their final value by the material
/// layer (spec.md section 4.5) before the BSDF ever sees them — the BSDF
/// itself is texture-agnostic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialData {
    pub bsdf: BsdfKind,
    pub base_color: Vec3,
    pub roughness: f32,
    pub metallic: f32,
    pub ior: f32,
    /// Conductor extinction coefficient, used by metal/roughMetal.
    pub k: Vec3,
    pub emission: Vec3,
    pub has_normal_map: bool,
    pub is_dispersive: bool,
    pub dispersion: DispersionParams,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            bsdf: BsdfKind::Diffuse,
            base_color: Vec3::splat(0.8),
            roughness: 1.0,
            metallic: 0.0,
            ior: 1.5,
            k: Vec3::ZERO,
            emission: Vec3::ZERO,
            has_normal_map: false,
            is_dispersive: false,
            dispersion: DispersionParams::default(),
        }
    }
}

impl MaterialData {
    pub fn is_emissive(&self) -> bool {
        self.emission != Vec3::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bsdf_kind_string_table_round_trips() {
        for kind in [
            BsdfKind::Null,
            BsdfKind::Diffuse,
            BsdfKind::RoughDiffuse,
            BsdfKind::Dielectric,
            BsdfKind::RoughDielectric,
            BsdfKind::Metal,
            BsdfKind::RoughMetal,
            BsdfKind::Plastic,
            BsdfKind::RoughPlastic,
        ] {
            assert_eq!(BsdfKind::from_str(kind.as_str()), Some(kind));
        }
    }
}
