use bytemuck::{Pod, Zeroable};

/// The hot 16-byte hit-point record (spec.md section 3): `object_id` and
/// `sub_object_id` are laid out contiguously so they can be written as a
/// single 64-bit store, `distance` is the sentinel-or-real `t`, and the
/// barycentric `u`/`v` are packed into `u16` fixed point since both are
/// always in `[0, 1]` — that's what keeps the whole record at 16 bytes
/// instead of 20.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct HitPoint {
    pub object_id: u32,
    pub sub_object_id: u32,
    pub distance: f32,
    uv_packed: u32,
}

const UV_SCALE: f32 = 65535.0;

impl HitPoint {
    pub const NO_HIT: Self = Self {
        object_id: u32::MAX,
        sub_object_id: u32::MAX,
        distance: f32::INFINITY,
        uv_packed: 0,
    };

    pub fn new(object_id: u32, sub_object_id: u32, distance: f32, u: f32, v: f32) -> Self {
        let uq = (u.clamp(0.0, 1.0) * UV_SCALE).round() as u32;
        let vq = (v.clamp(0.0, 1.0) * UV_SCALE).round() as u32;
        Self {
            object_id,
            sub_object_id,
            distance,
            uv_packed: uq | (vq << 16),
        }
    }

    pub fn is_hit(&self) -> bool {
        self.distance.is_finite()
    }

    pub fn u(&self) -> f32 {
        (self.uv_packed & 0xFFFF) as f32 / UV_SCALE
    }

    pub fn v(&self) -> f32 {
        ((self.uv_packed >> 16) & 0xFFFF) as f32 / UV_SCALE
    }
}

impl Default for HitPoint {
    fn default() -> Self {
        Self::NO_HIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_no_hit() {
        assert!(!HitPoint::NO_HIT.is_hit());
    }

    #[test]
    fn uv_round_trips_within_quantization() {
        let hp = HitPoint::new(1, 0, 2.5, 0.3, 0.6);
        assert!((hp.u() - 0.3).abs() < 1e-4);
        assert!((hp.v() - 0.6).abs() < 1e-4);
    }

    #[test]
    fn struct_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<HitPoint>(), 16);
    }
}
