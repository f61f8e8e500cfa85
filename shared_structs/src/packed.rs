//! Packed storage formats (spec.md section 4, "Packed storage" / L2):
//! octahedral unit vectors, YCoCg-HDR color, half-float, and a
//! shared-exponent `Float3`. These trade a cheap decode for a much
//! smaller footprint in cold vertex/texture data.

use glam::Vec3;
use half::f16;

/// Octahedral encoding of a unit vector into two `i16`s (one `u32`).
/// Projects the sphere onto the octahedron, folds the lower hemisphere
/// into the unit square's corners, then quantizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedUnitVector3(u32);

impl PackedUnitVector3 {
    pub fn encode(v: Vec3) -> Self {
        let l1norm = v.x.abs() + v.y.abs() + v.z.abs();
        let mut p = Vec3::new(v.x, v.y, v.z) / l1norm.max(1e-20);
        if p.z < 0.0 {
            let signed = |x: f32| if x >= 0.0 { 1.0 } else { -1.0 };
            let (px, py) = (p.x, p.y);
            p.x = (1.0 - py.abs()) * signed(px);
            p.y = (1.0 - px.abs()) * signed(py);
        }
        let qx = quantize(p.x);
        let qy = quantize(p.y);
        Self((qx as u32 & 0xFFFF) | ((qy as u32 & 0xFFFF) << 16))
    }

    pub fn decode(self) -> Vec3 {
        let qx = (self.0 & 0xFFFF) as u16;
        let qy = ((self.0 >> 16) & 0xFFFF) as u16;
        let mut x = dequantize(qx);
        let mut y = dequantize(qy);
        let z = 1.0 - x.abs() - y.abs();
        if z < 0.0 {
            let signed = |v: f32| if v >= 0.0 { 1.0 } else { -1.0 };
            let (ox, oy) = (x, y);
            x = (1.0 - oy.abs()) * signed(ox);
            y = (1.0 - ox.abs()) * signed(oy);
        }
        Vec3::new(x, y, z).normalize()
    }
}

fn quantize(x: f32) -> i16 {
    (x.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

fn dequantize(q: u16) -> f32 {
    (q as i16) as f32 / i16::MAX as f32
}

/// YCoCg-HDR: a reversible color transform that packs an HDR RGB value
/// as 8-bit `Co`, `Cg`, a shared 8-bit exponent, and 8-bit `Y`, giving
/// much better precision per byte than straight RGBE for natural images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedColorRgbHdr {
    co: u8,
    cg: u8,
    y: u8,
    exponent: u8,
}

impl PackedColorRgbHdr {
    pub fn encode(color: Vec3) -> Self {
        let co = color.x - color.z;
        let t = color.z + co * 0.5;
        let cg = color.y - t;
        let y = t + cg * 0.5;

        let max_component = y.max(co.abs() * 2.0).max(cg.abs() * 2.0).max(1e-9);
        let exp = max_component.log2().ceil().clamp(-128.0, 127.0);
        let scale = 2f32.powf(-exp) * 127.0;

        PackedColorRgbHdr {
            co: quantize_signed(co * scale),
            cg: quantize_signed(cg * scale),
            y: (y * scale).round().clamp(0.0, 255.0) as u8,
            exponent: (exp + 128.0) as u8,
        }
    }

    pub fn decode(self) -> Vec3 {
        let exp = self.exponent as f32 - 128.0;
        let scale = 2f32.powf(exp) / 127.0;
        let co = dequantize_signed(self.co) * scale;
        let cg = dequantize_signed(self.cg) * scale;
        let y = self.y as f32 * scale;

        let t = y - cg * 0.5;
        let g = cg + t;
        let b = t - co * 0.5;
        let r = b + co;
        Vec3::new(r, g, b)
    }
}

fn quantize_signed(x: f32) -> u8 {
    (x.clamp(-127.0, 127.0).round() as i8) as u8
}

fn dequantize_signed(q: u8) -> f32 {
    (q as i8) as f32
}

/// Thin convenience wrappers over `half::f16` for this crate's packed
/// normal/vertex-data formats.
pub fn pack_half(v: f32) -> f16 {
    f16::from_f32(v)
}

pub fn unpack_half(v: f16) -> f32 {
    v.to_f32()
}

/// Shared-exponent `Float3` (RGBE-style): one exponent shared by three
/// 8-bit mantissas, used for HDR environment-map texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedExponentFloat3 {
    r: u8,
    g: u8,
    b: u8,
    e: u8,
}

impl SharedExponentFloat3 {
    pub fn encode(v: Vec3) -> Self {
        let max_c = v.x.max(v.y).max(v.z).max(1e-9);
        let exp = max_c.log2().ceil();
        let scale = 2f32.powf(-exp) * 255.0;
        SharedExponentFloat3 {
            r: (v.x * scale).round().clamp(0.0, 255.0) as u8,
            g: (v.y * scale).round().clamp(0.0, 255.0) as u8,
            b: (v.z * scale).round().clamp(0.0, 255.0) as u8,
            e: (exp + 128.0).clamp(0.0, 255.0) as u8,
        }
    }

    pub fn decode(self) -> Vec3 {
        let exp = self.e as f32 - 128.0;
        let scale = 2f32.powf(exp) / 255.0;
        Vec3::new(self.r as f32, self.g as f32, self.b as f32) * scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn sphere_fibonacci(n: usize) -> Vec<Vec3> {
        let golden = std::f32::consts::PI * (3.0 - 5f32.sqrt());
        (0..n)
            .map(|i| {
                let y = 1.0 - (i as f32 / (n - 1) as f32) * 2.0;
                let radius = (1.0 - y * y).max(0.0).sqrt();
                let theta = golden * i as f32;
                Vec3::new(theta.cos() * radius, y, theta.sin() * radius)
            })
            .collect()
    }

    #[test]
    fn octahedral_round_trip_within_one_degree() {
        for v in sphere_fibonacci(512) {
            let encoded = PackedUnitVector3::encode(v);
            let decoded = encoded.decode();
            let cos_angle = v.dot(decoded).clamp(-1.0, 1.0);
            let angle = cos_angle.acos();
            assert!(angle <= 0.017, "angle {angle} exceeds 1 degree for {v:?}");
        }
    }

    #[test]
    fn ycocg_hdr_round_trip_within_tolerance() {
        let samples = [
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.01, 0.5, 100.0),
            Vec3::new(500.0, 0.001, 0.3),
        ];
        for color in samples {
            let packed = PackedColorRgbHdr::encode(color);
            let decoded = packed.decode();
            for i in 0..3 {
                let relative_error = (decoded[i] - color[i]).abs() / color[i].max(1e-9);
                assert!(relative_error < 2e-2, "{decoded:?} vs {color:?}");
            }
        }
    }

    #[test]
    fn half_preserves_special_values() {
        assert!(unpack_half(pack_half(f32::INFINITY)).is_infinite());
        assert!(unpack_half(pack_half(f32::NEG_INFINITY)).is_infinite());
        assert!(unpack_half(pack_half(f32::NAN)).is_nan());
    }
}
