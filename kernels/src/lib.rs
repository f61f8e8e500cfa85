//! Hot-path algorithms: SIMD registers, intersection routines, BVH
//! traversal, shapes, BSDFs, lights and the path integrator (spec.md
//! section 1). This crate mirrors the teacher's `kernels` crate in name
//! and module boundaries, but drops `#![no_std]`/`spirv_std` — there is
//! no SPIR-V target here, just an ordinary `std` lib the root crate's
//! worker pool calls into per tile (spec.md section 1, "Crate layout").

pub mod bsdf;
pub mod bvh;
pub mod integrator;
pub mod intersection;
pub mod light;
pub mod light_pick;
pub mod microfacet;
pub mod rng;
pub mod sampling;
pub mod shapes;
pub mod simd;
pub mod util;
