//! flyby-cull
//!
//! A small interactive 3D demo built around GPU occlusion-query culling.
//! Textured OBJ meshes are placed in a scene and flown through with a free
//! camera; every frame each object's bounding box is depth-tested against
//! the previous frame's scene, and objects whose box produced no visible
//! samples are skipped in the draw pass. Query results are polled without
//! ever blocking the CPU, so a visibility decision may lag by a frame but a
//! frame is never stalled.
//!
//! High-level modules
//! - `app`: winit event loop, frame driving and the `run` entry point
//! - `camera`: fly camera, controller and view/projection uniforms
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `culling`: the per-object occlusion query state machine and GPU probe
//! - `data_structures`: engine data models (meshes, bounds, objects, textures)
//! - `pipelines`: scene and depth-only proxy render pipelines
//! - `resources`: helpers to load textures/models from asset files
//! - `scene`: two-pass frame driver and view providers
//!

pub mod app;
pub mod camera;
pub mod context;
pub mod culling;
pub mod data_structures;
pub mod error;
pub mod pipelines;
pub mod resources;
pub mod scene;

// Re-exports commonly used types for convenience in downstream code.
pub use app::run;
pub use culling::{OcclusionState, QueryPhase, QueryProbe};
pub use error::SceneError;
pub use scene::{MonoView, ObjectDesc, ViewProvider};
