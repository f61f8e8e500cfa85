//! Plain, `bytemuck::Pod` data that crosses the traversal/shading boundary.
//!
//! This crate deliberately holds no algorithms (see `kernels` for those) —
//! only the on-disk/in-memory layouts that the BVH, shapes, materials and
//! path integrator agree on, mirroring how the teacher's `shared_structs`
//! crate holds only GPU-interop POD types (`MyVec`, the `Image`/`Sampler`
//! CPU polyfill).

pub mod aabb;
pub mod bvh_node;
pub mod config;
pub mod error;
pub mod hitpoint;
pub mod light;
pub mod material;
pub mod packed;
pub mod ray;
pub mod vertex;
pub mod wavelength;

pub use aabb::Aabb;
pub use bvh_node::BvhNode;
pub use config::{NextEventEstimation, TracingConfig};
pub use error::SceneError;
pub use hitpoint::HitPoint;
pub use light::LightPickEntry;
pub use material::{BsdfKind, MaterialData};
pub use ray::Ray;
pub use vertex::{PerVertexData, VertexIndices};
pub use wavelength::Wavelength;
