//! Interleaved vertex data with u32 indices.

use crate::bounds::Aabb;
use crate::math::{Mat4, Vec3, transform_point, transform_vector};

/// Interleaved vertex: position, normal, texcoord (32 bytes).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Size in bytes of one vertex in a vertex buffer.
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }
}

/// CPU-side triangle-list mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuMesh {
    pub label: Option<String>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl CpuMesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            label: None,
            vertices,
            indices,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Vertex data as raw bytes for upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Object-space bounds; `None` for a mesh without vertices.
    pub fn bounds(&self) -> Option<Aabb> {
        let positions: Vec<Vec3> = self.vertices.iter().map(|v| Vec3::from(v.position)).collect();
        Aabb::from_points(positions.iter())
    }

    /// Copy of the mesh with positions and normals moved into another space.
    pub fn transformed(&self, m: &Mat4) -> CpuMesh {
        let vertices = self
            .vertices
            .iter()
            .map(|v| {
                let p = transform_point(m, &Vec3::from(v.position));
                let n = transform_vector(m, &Vec3::from(v.normal));
                let n = if n.norm() > f32::EPSILON { n.normalize() } else { n };
                Vertex::new([p.x, p.y, p.z], [n.x, n.y, n.z], v.uv)
            })
            .collect();
        CpuMesh {
            label: self.label.clone(),
            vertices,
            indices: self.indices.clone(),
        }
    }

    /// Append another mesh, rebasing its indices.
    pub fn append(&mut self, other: &CpuMesh) {
        let base = self.vertex_count();
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::generators::generate_quad;

    #[test]
    fn test_vertex_stride() {
        assert_eq!(Vertex::STRIDE, 32);
    }

    #[test]
    fn test_append_rebases_indices() {
        let mut merged = generate_quad(1.0, 1.0);
        let quad = generate_quad(1.0, 1.0);
        merged.append(&quad);
        assert_eq!(merged.vertex_count(), 8);
        assert_eq!(merged.indices[6..], [4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn test_transformed_moves_bounds() {
        let quad = generate_quad(1.0, 1.0);
        let moved = quad.transformed(&Mat4::new_translation(&Vec3::new(0.0, 3.0, 0.0)));
        let bounds = moved.bounds().unwrap();
        assert!((bounds.center().y - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        assert!(CpuMesh::default().bounds().is_none());
    }
}
