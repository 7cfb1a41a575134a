//! Axis-aligned bounding volumes used as occlusion-query proxies.
//!
//! The box is computed once at load time from the raw vertex stream, with the
//! object's uniform scale already applied. It is never updated afterwards.

use crate::{data_structures::mesh::{MeshVertex, ProxyVertex}, error::SceneError};

/// Number of vertices in the expanded box surface (12 triangles).
pub const PROXY_VERTEX_COUNT: u32 = 36;

// Corner index i selects max over min on axis k when bit k of i is set.
// Six faces, two triangles each, consistently wound facing outward.
const BOX_TRIANGLES: [usize; PROXY_VERTEX_COUNT as usize] = [
    0, 4, 6, 0, 6, 2, // -x
    1, 3, 7, 1, 7, 5, // +x
    0, 1, 5, 0, 5, 4, // -y
    2, 6, 7, 2, 7, 3, // +y
    0, 2, 3, 0, 3, 1, // -z
    4, 5, 7, 4, 7, 6, // +z
];

/// Axis-aligned bounding box: six scalars, min and max per axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    /// Compute the box from a mesh vertex stream after applying `scale`.
    ///
    /// Only positions are considered. An empty vertex stream is rejected with
    /// [`SceneError::InvalidMesh`].
    pub fn from_vertices(name: &str, vertices: &[MeshVertex], scale: f32) -> Result<Self, SceneError> {
        let first = vertices
            .first()
            .ok_or_else(|| SceneError::InvalidMesh(name.to_string()))?;

        let mut min = first.scaled(scale).position;
        let mut max = min;
        for vertex in vertices.iter().skip(1) {
            let p = vertex.scaled(scale).position;
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }

        Ok(Self { min, max })
    }

    /// The eight distinct corner points. Corner `i` takes the max coordinate
    /// on axis `k` iff bit `k` of `i` is set.
    pub fn corners(&self) -> [[f32; 3]; 8] {
        let mut corners = [[0.0; 3]; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            for axis in 0..3 {
                corner[axis] = if i & (1 << axis) != 0 {
                    self.max[axis]
                } else {
                    self.min[axis]
                };
            }
        }
        corners
    }

    /// Expand the box into the 36 vertices (12 triangles) drawn as the
    /// occlusion proxy. Winding is consistent but irrelevant to the query:
    /// the proxy is rendered without backface culling.
    pub fn proxy_vertices(&self) -> [ProxyVertex; PROXY_VERTEX_COUNT as usize] {
        let corners = self.corners();
        let mut vertices = [ProxyVertex { position: [0.0; 3] }; PROXY_VERTEX_COUNT as usize];
        for (vertex, &corner_idx) in vertices.iter_mut().zip(BOX_TRIANGLES.iter()) {
            vertex.position = corners[corner_idx];
        }
        vertices
    }

    /// Whether a point lies inside the box (inclusive).
    pub fn contains(&self, point: [f32; 3]) -> bool {
        (0..3).all(|axis| self.min[axis] <= point[axis] && point[axis] <= self.max[axis])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(position: [f32; 3]) -> MeshVertex {
        MeshVertex {
            position,
            tex_coords: [0.0, 0.0],
            normal: [0.0, 1.0, 0.0],
        }
    }

    #[test]
    fn empty_mesh_is_rejected() {
        let result = Aabb::from_vertices("empty", &[], 1.0);
        assert!(matches!(result, Err(SceneError::InvalidMesh(_))));
    }

    #[test]
    fn bounds_contain_all_scaled_vertices() {
        let vertices = [
            vertex([-1.0, 2.0, 0.5]),
            vertex([3.0, -4.0, 0.0]),
            vertex([0.0, 0.0, -7.5]),
        ];
        let scale = 2.5;
        let aabb = Aabb::from_vertices("test", &vertices, scale).unwrap();

        for axis in 0..3 {
            assert!(aabb.min[axis] <= aabb.max[axis]);
        }
        for v in &vertices {
            assert!(aabb.contains(v.scaled(scale).position));
        }
        assert_eq!(aabb.min, [-2.5, -10.0, -18.75]);
        assert_eq!(aabb.max, [7.5, 5.0, 1.25]);
    }

    #[test]
    fn single_vertex_mesh_collapses_to_a_point() {
        let aabb = Aabb::from_vertices("point", &[vertex([1.0, 2.0, 3.0])], 1.0).unwrap();
        assert_eq!(aabb.min, aabb.max);
        assert_eq!(aabb.min, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn proxy_expansion_covers_exactly_the_eight_corners() {
        let aabb = Aabb {
            min: [-1.0, -2.0, -3.0],
            max: [4.0, 5.0, 6.0],
        };
        let corners = aabb.corners();
        let proxy = aabb.proxy_vertices();

        assert_eq!(proxy.len(), 36);
        // Every proxy vertex is one of the eight corners, and all eight are used.
        let mut used = [false; 8];
        for v in &proxy {
            let idx = corners
                .iter()
                .position(|c| *c == v.position)
                .expect("proxy vertex is not a box corner");
            used[idx] = true;
        }
        assert!(used.iter().all(|u| *u));
        // 12 triangles, none degenerate.
        for triangle in proxy.chunks(3) {
            assert_ne!(triangle[0], triangle[1]);
            assert_ne!(triangle[1], triangle[2]);
            assert_ne!(triangle[0], triangle[2]);
        }
    }

    #[test]
    fn corner_bit_pattern_selects_min_max_per_axis() {
        let aabb = Aabb {
            min: [0.0, 0.0, 0.0],
            max: [1.0, 1.0, 1.0],
        };
        let corners = aabb.corners();
        assert_eq!(corners[0], [0.0, 0.0, 0.0]);
        assert_eq!(corners[0b111], [1.0, 1.0, 1.0]);
        assert_eq!(corners[0b001], [1.0, 0.0, 0.0]);
        assert_eq!(corners[0b110], [0.0, 1.0, 1.0]);
    }
}
