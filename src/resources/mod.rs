use std::io::{BufReader, Cursor};

use crate::data_structures::mesh::MeshData;

/**
 * This module contains all logic for loading meshes and textures from external files.
 */
pub mod mesh;
pub mod texture;

/// Load an OBJ file into CPU-side mesh data.
///
/// Triangulated with a single index per vertex, so positions, texcoords and
/// normals share one index stream. Materials referenced by the OBJ are parsed
/// but ignored; the demo binds its texture explicitly per object.
pub async fn load_mesh_obj(file_name: &str) -> anyhow::Result<MeshData> {
    let obj_text = texture::load_string(file_name).await?;
    let obj_cursor = Cursor::new(obj_text);
    let mut obj_reader = BufReader::new(obj_cursor);

    let (models, _materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| async move {
            let mat_text = texture::load_string(&p).await.unwrap_or_default();
            tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text)))
        },
    )
    .await?;

    let data = mesh::merge_obj_models(&models, file_name)?;
    log::info!(
        "loaded {:?}: {} vertices, {} triangles",
        file_name,
        data.vertices.len(),
        data.indices.len() / 3
    );
    Ok(data)
}
