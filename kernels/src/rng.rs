//! Per-worker random number generation (spec.md section 5): a scalar
//! xoroshiro128+ generator plus 4-wide and 8-wide xorshift128+ SIMD
//! variants for batch sampling. Each worker forks its own stream by
//! mixing in its worker id against a single entropy seed, so no
//! generator state is ever shared across threads.

use glam::{Vec2, Vec3};
use wide::{f32x4, f32x8, u32x8, u64x4};

#[inline]
fn splitmix64(seed: &mut u64) -> u64 {
    *seed = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *seed;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Scalar xoroshiro128+.
#[derive(Debug, Clone, Copy)]
pub struct Rng {
    state: [u64; 2],
}

impl Rng {
    /// Derives a worker's stream from one shared entropy seed and its
    /// worker id, so results stay deterministic per-tile regardless of
    /// scheduling order (spec.md section 5, ordering guarantees).
    pub fn new_for_worker(entropy: u64, worker_id: u32) -> Self {
        let mut seed = entropy ^ (worker_id as u64).wrapping_mul(0x2545_F491_4F6C_DD1D);
        let s0 = splitmix64(&mut seed);
        let s1 = splitmix64(&mut seed);
        Self { state: [s0 | 1, s1 | 1] }
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);
        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);
        result
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        const SCALE: f32 = 1.0 / (1u64 << 24) as f32;
        ((self.next_u64() >> 40) as f32) * SCALE
    }

    pub fn next_2f32(&mut self) -> Vec2 {
        Vec2::new(self.next_f32(), self.next_f32())
    }

    pub fn next_3f32(&mut self) -> Vec3 {
        Vec3::new(self.next_f32(), self.next_f32(), self.next_f32())
    }
}

#[inline]
fn rotl64x4(x: u64x4, n: u32) -> u64x4 {
    let arr = x.to_array();
    u64x4::new(std::array::from_fn(|i| arr[i].rotate_left(n)))
}

/// 4-wide xoroshiro128+, one independent lane per ray in a width-4
/// packet.
#[derive(Debug, Clone, Copy)]
pub struct Rng4 {
    state: [u64x4; 2],
}

impl Rng4 {
    pub fn new_for_worker(entropy: u64, worker_id: u32) -> Self {
        let mut s0 = [0u64; 4];
        let mut s1 = [0u64; 4];
        for lane in 0..4 {
            let mut seed = entropy
                ^ (worker_id as u64).wrapping_mul(0x2545_F491_4F6C_DD1D)
                ^ (lane as u64).wrapping_mul(0xD1B5_4A32_D192_ED03);
            s0[lane] = splitmix64(&mut seed) | 1;
            s1[lane] = splitmix64(&mut seed) | 1;
        }
        Self { state: [u64x4::new(s0), u64x4::new(s1)] }
    }

    #[inline]
    fn next_u64x4(&mut self) -> u64x4 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0 + s1;
        s1 ^= s0;
        self.state[0] = rotl64x4(s0, 24) ^ s1 ^ (s1 << 16);
        self.state[1] = rotl64x4(s1, 37);
        result
    }

    /// 4 independent uniform floats in `[0, 1)`, one per lane.
    pub fn next_f32x4(&mut self) -> f32x4 {
        const SCALE: f32 = 1.0 / (1u64 << 24) as f32;
        let bits = self.next_u64x4().to_array();
        f32x4::new(std::array::from_fn(|i| ((bits[i] >> 40) as f32) * SCALE))
    }
}

/// 8-wide xorshift128+ for packet traversal RNG consumption (one lane per
/// ray in a width-8 packet group). Uses four interleaved 32-bit
/// Marsaglia xorshift generators per lane rather than widened 64-bit
/// arithmetic, since `wide` has no native `u64x8`.
#[derive(Debug, Clone, Copy)]
pub struct Rng8 {
    state: [u32x8; 4],
}

impl Rng8 {
    pub fn new_for_worker(entropy: u64, worker_id: u32) -> Self {
        let mut words = [[0u32; 8]; 4];
        for gen in 0..4 {
            for lane in 0..8 {
                let mut seed = entropy
                    ^ (worker_id as u64).wrapping_mul(0x2545_F491_4F6C_DD1D)
                    ^ (lane as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
                    ^ (gen as u64).wrapping_mul(0xA24B_AED4_963E_E407);
                words[gen][lane] = (splitmix64(&mut seed) | 1) as u32;
            }
        }
        Self {
            state: [
                u32x8::new(words[0]),
                u32x8::new(words[1]),
                u32x8::new(words[2]),
                u32x8::new(words[3]),
            ],
        }
    }

    /// Marsaglia xorshift step, combined into one uniform float per lane.
    pub fn next_f32x8(&mut self) -> f32x8 {
        let x0 = self.state[0];
        let y = self.state[1];
        let z = self.state[2];
        let w = self.state[3];

        let t = x0 ^ (x0 << 11);
        self.state[0] = y;
        self.state[1] = z;
        self.state[2] = w;
        let x = w ^ (w >> 19) ^ (t ^ (t >> 8));
        self.state[3] = x;

        let mantissa = x >> 9;
        let as_float: f32x8 = bytemuck::cast(mantissa | u32x8::splat(0x3F80_0000));
        as_float - f32x8::splat(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_stream_is_in_unit_range() {
        let mut rng = Rng::new_for_worker(12345, 0);
        for _ in 0..1000 {
            let f = rng.next_f32();
            assert!((0.0..1.0).contains(&f));
        }
    }

    #[test]
    fn different_workers_diverge() {
        let mut a = Rng::new_for_worker(1, 0);
        let mut b = Rng::new_for_worker(1, 1);
        assert_ne!(a.next_f32(), b.next_f32());
    }

    #[test]
    fn same_seed_same_worker_is_deterministic() {
        let mut a = Rng::new_for_worker(99, 4);
        let mut b = Rng::new_for_worker(99, 4);
        for _ in 0..16 {
            assert_eq!(a.next_f32(), b.next_f32());
        }
    }

    #[test]
    fn simd4_lanes_are_in_unit_range() {
        let mut rng = Rng4::new_for_worker(7, 1);
        for _ in 0..64 {
            for lane in rng.next_f32x4().to_array() {
                assert!((0.0..1.0).contains(&lane), "lane {lane} out of range");
            }
        }
    }

    #[test]
    fn simd8_lanes_are_in_unit_range() {
        let mut rng = Rng8::new_for_worker(7, 2);
        for _ in 0..64 {
            for lane in rng.next_f32x8().to_array() {
                assert!((0.0..1.0).contains(&lane), "lane {lane} out of range");
            }
        }
    }
}
