//! Mesh generators for common shapes.
//!
//! All generators emit [`Vertex`] data with u32 triangle-list indices and
//! counter-clockwise front faces.

use std::f32::consts::PI;

use super::data::{CpuMesh, Vertex};

/// Generate a UV sphere mesh.
///
/// # Arguments
///
/// * `radius` - Sphere radius
/// * `segments` - Number of longitudinal segments (around the equator)
/// * `rings` - Number of latitudinal rings (from pole to pole)
pub fn generate_sphere(radius: f32, segments: u32, rings: u32) -> CpuMesh {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);

    for ring in 0..=rings {
        let theta = ring as f32 * PI / rings as f32;
        for segment in 0..=segments {
            let phi = segment as f32 * 2.0 * PI / segments as f32;
            let normal = [theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()];
            vertices.push(Vertex::new(
                normal.map(|n| n * radius),
                normal,
                [segment as f32 / segments as f32, ring as f32 / rings as f32],
            ));
        }
    }

    for ring in 0..rings {
        for segment in 0..segments {
            let current = ring * (segments + 1) + segment;
            let next = current + segments + 1;
            indices.extend_from_slice(&[current, current + 1, next, current + 1, next + 1, next]);
        }
    }

    CpuMesh::new(vertices, indices).with_label("sphere")
}

/// Generate a quad on the XY plane facing +Z.
///
/// UV coordinates go from (0,0) at top-left to (1,1) at bottom-right.
pub fn generate_quad(half_width: f32, half_height: f32) -> CpuMesh {
    let normal = [0.0, 0.0, 1.0];
    let vertices = vec![
        Vertex::new([-half_width, half_height, 0.0], normal, [0.0, 0.0]),
        Vertex::new([-half_width, -half_height, 0.0], normal, [0.0, 1.0]),
        Vertex::new([half_width, -half_height, 0.0], normal, [1.0, 1.0]),
        Vertex::new([half_width, half_height, 0.0], normal, [1.0, 0.0]),
    ];
    CpuMesh::new(vertices, vec![0, 1, 2, 0, 2, 3]).with_label("quad")
}

/// Generate a ground plane on the XZ plane facing +Y.
pub fn generate_plane(half_extent: f32) -> CpuMesh {
    let normal = [0.0, 1.0, 0.0];
    let e = half_extent;
    let vertices = vec![
        Vertex::new([-e, 0.0, -e], normal, [0.0, 0.0]),
        Vertex::new([-e, 0.0, e], normal, [0.0, 1.0]),
        Vertex::new([e, 0.0, e], normal, [1.0, 1.0]),
        Vertex::new([e, 0.0, -e], normal, [1.0, 0.0]),
    ];
    CpuMesh::new(vertices, vec![0, 1, 2, 0, 2, 3]).with_label("plane")
}

/// Generate an axis-aligned cube with per-face normals (24 vertices).
pub fn generate_cube(half_extent: f32) -> CpuMesh {
    // (normal, tangent u, tangent v) per face
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let corners = [(-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0), (1.0, 1.0)];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in FACES {
        let base = vertices.len() as u32;
        for (su, sv) in corners {
            let position = [0, 1, 2].map(|i| (normal[i] + u[i] * su + v[i] * sv) * half_extent);
            let uv = [(su + 1.0) * 0.5, (1.0 - sv) * 0.5];
            vertices.push(Vertex::new(position, normal, uv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    CpuMesh::new(vertices, indices).with_label("cube")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_counts() {
        let cube = generate_cube(0.5);
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.index_count(), 36);
        let bounds = cube.bounds().unwrap();
        assert!((bounds.extents().x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_sphere_indices_in_range() {
        let sphere = generate_sphere(1.0, 8, 4);
        assert!(sphere.indices.iter().all(|&i| i < sphere.vertex_count()));
        assert_eq!(sphere.index_count(), 8 * 4 * 6);
    }

    #[test]
    fn test_plane_faces_up() {
        let plane = generate_plane(2.0);
        assert!(plane.vertices.iter().all(|v| v.normal == [0.0, 1.0, 0.0]));
    }
}
