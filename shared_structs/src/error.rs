use thiserror::Error;

/// The core's one surfaced, typed error boundary (spec.md section 7:
/// "Allocation failure (surfaced): ... surfaced to the caller with a typed
/// error"). Everything else on the hot path — invalid BSDF samples,
/// geometric degeneracy, NaN/Inf — is recovered locally and never reaches
/// this type; see `kernels::util::mask_nan` and the per-BSDF `CosEpsilon`
/// guards instead.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to allocate {requested} bytes for {what}")]
    AllocationFailure { what: &'static str, requested: usize },

    #[error("scene object references out-of-range material index {0}")]
    MaterialIndexOutOfRange(u32),

    #[error("malformed BVH file: {0}")]
    MalformedBvh(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("unsupported renderer \"{name}\"")]
    UnsupportedRenderer { name: String },
}
