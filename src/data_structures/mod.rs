//! Engine data models: meshes, bounding volumes, textures and scene objects.

pub mod bounds;
pub mod mesh;
pub mod object;
pub mod texture;
