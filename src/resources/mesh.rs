//! Conversion from parsed OBJ models to engine mesh data.

use crate::{
    data_structures::mesh::{MeshData, MeshVertex},
    error::SceneError,
};

/// Merge all models of an OBJ file into one [`MeshData`].
///
/// Texture V coordinates are flipped for the wgpu coordinate system. Missing
/// texcoord/normal channels fall back to zero, matching how partially
/// attributed OBJ exports are handled elsewhere in the loader. A file with no
/// geometry at all is rejected.
pub fn merge_obj_models(models: &[tobj::Model], file_name: &str) -> Result<MeshData, SceneError> {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for m in models {
        let base = vertices.len() as u32;
        vertices.extend((0..m.mesh.positions.len() / 3).map(|i| MeshVertex {
            position: [
                m.mesh.positions[i * 3],
                m.mesh.positions[i * 3 + 1],
                m.mesh.positions[i * 3 + 2],
            ],
            tex_coords: [
                m.mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                1.0 - m.mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
            ],
            normal: [
                m.mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                m.mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                m.mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
            ],
        }));
        indices.extend(m.mesh.indices.iter().map(|i| i + base));
    }

    if vertices.is_empty() {
        return Err(SceneError::InvalidMesh(file_name.to_string()));
    }

    Ok(MeshData {
        name: file_name.to_string(),
        vertices,
        indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(positions: Vec<f32>, indices: Vec<u32>) -> tobj::Model {
        let mesh = tobj::Mesh {
            positions,
            indices,
            ..Default::default()
        };
        tobj::Model::new(mesh, "test".to_string())
    }

    #[test]
    fn empty_obj_is_rejected() {
        let result = merge_obj_models(&[], "empty.obj");
        assert!(matches!(result, Err(SceneError::InvalidMesh(_))));
    }

    #[test]
    fn indices_are_offset_per_model() {
        let a = model(vec![0.0; 9], vec![0, 1, 2]);
        let b = model(vec![1.0; 9], vec![0, 1, 2]);
        let data = merge_obj_models(&[a, b], "two.obj").unwrap();
        assert_eq!(data.vertices.len(), 6);
        assert_eq!(data.indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn missing_texcoords_default_to_flipped_zero() {
        let data = merge_obj_models(&[model(vec![0.0; 3], vec![0])], "one.obj").unwrap();
        assert_eq!(data.vertices[0].tex_coords, [0.0, 1.0]);
        assert_eq!(data.vertices[0].normal, [0.0, 0.0, 0.0]);
    }
}
