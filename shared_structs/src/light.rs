use bytemuck::{Pod, Zeroable};

/// One entry of the light-picking alias-style table: a binary choice
/// between two candidate lights (`a`/`b`), weighted by `ratio`, so that
/// picking a uniform table index plus one more uniform random number
/// yields a light proportional to its contribution. Mirrors the
/// teacher's `LightPickEntry` used by `kernels::light_pick::pick_light`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightPickEntry {
    pub light_index_a: u32,
    pub light_area_a: f32,
    pub light_pick_pdf_a: f32,
    pub ratio: f32,
    pub light_index_b: u32,
    pub light_area_b: f32,
    pub light_pick_pdf_b: f32,
    _pad: f32,
}

impl LightPickEntry {
    /// A scene with no lights stores a single sentinel entry so the
    /// integrator can bail out of NEE in one branch.
    pub const SENTINEL: Self = Self {
        light_index_a: u32::MAX,
        light_area_a: 0.0,
        light_pick_pdf_a: 0.0,
        ratio: 0.0,
        light_index_b: u32::MAX,
        light_area_b: 0.0,
        light_pick_pdf_b: 0.0,
        _pad: 0.0,
    };

    pub fn is_sentinel(&self) -> bool {
        self.light_index_a == u32::MAX
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        light_index_a: u32,
        light_area_a: f32,
        light_pick_pdf_a: f32,
        ratio: f32,
        light_index_b: u32,
        light_area_b: f32,
        light_pick_pdf_b: f32,
    ) -> Self {
        Self {
            light_index_a,
            light_area_a,
            light_pick_pdf_a,
            ratio,
            light_index_b,
            light_area_b,
            light_pick_pdf_b,
            _pad: 0.0,
        }
    }
}
