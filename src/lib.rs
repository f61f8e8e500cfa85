//! Offline, physically-based Monte Carlo path tracer core.
//!
//! This crate owns scene construction (`scene`), the pinhole camera
//! (`camera`), and the tile-parallel film/renderer pair (`viewport`); the
//! actual traversal, shape, BSDF and integrator algorithms live in the
//! sibling `kernels` crate, with the plain data layouts shared between
//! them in `shared_structs`. Texture/bitmap I/O, scene file loading, a
//! CLI, logging setup and windowed preview are all deliberately absent —
//! this crate is a library other binaries build those around.

pub mod camera;
pub mod scene;
pub mod viewport;

pub use camera::{Camera, CameraTransform, RenderingContext};
pub use scene::{Scene, SceneObject, Transform};
pub use viewport::{Bitmap, Renderer, Viewport};
