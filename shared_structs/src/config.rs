use glam::{Vec3, Vec4};

/// Next-event-estimation mode, matching the teacher's `NextEventEstimation`
/// enum and its `to_u32`/`from_u32`/`uses_nee`/`uses_mis` helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextEventEstimation {
    None,
    DirectLightSampling,
    MultipleImportanceSampling,
}

impl NextEventEstimation {
    pub fn to_u32(self) -> u32 {
        match self {
            NextEventEstimation::None => 0,
            NextEventEstimation::DirectLightSampling => 1,
            NextEventEstimation::MultipleImportanceSampling => 2,
        }
    }

    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => NextEventEstimation::DirectLightSampling,
            2 => NextEventEstimation::MultipleImportanceSampling,
            _ => NextEventEstimation::None,
        }
    }

    pub fn uses_nee(self) -> bool {
        !matches!(self, NextEventEstimation::None)
    }

    pub fn uses_mis(self) -> bool {
        matches!(self, NextEventEstimation::MultipleImportanceSampling)
    }
}

/// Per-pass tracing configuration, passed down to every tile worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TracingConfig {
    pub width: u32,
    pub height: u32,
    pub max_bounces: u32,
    pub min_bounces: u32,
    pub nee: u32,
    pub cam_position: Vec4,
    pub cam_rotation: Vec3,
    pub sun_direction: Vec4,
    pub has_skybox: u32,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            max_bounces: 8,
            min_bounces: 3,
            nee: NextEventEstimation::MultipleImportanceSampling.to_u32(),
            cam_position: Vec4::new(0.0, 0.0, -3.0, 1.0),
            cam_rotation: Vec3::ZERO,
            sun_direction: Vec4::new(0.0, 1.0, 0.0, 1.0),
            has_skybox: 0,
        }
    }
}
