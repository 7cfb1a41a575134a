//! Error taxonomy for scene construction.
//!
//! Only object construction can fail. Once an object exists, the culling
//! state machine never errors: a query result that is not yet available is a
//! routine outcome, not a failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    /// Occlusion queries were rejected by the graphics backend. Non-fatal:
    /// the owning object falls back to rendering unconditionally.
    #[error("occlusion queries unsupported by this device: {0}")]
    UnsupportedFeature(String),

    /// A mesh with no vertices cannot be bounded or drawn. Fatal at load time.
    #[error("mesh {0:?} contains no vertices")]
    InvalidMesh(String),

    /// A GPU buffer or query allocation failed. The caller decides whether to
    /// abort or skip the object.
    #[error("gpu resource allocation failed: {0}")]
    ResourceExhaustion(String),
}
