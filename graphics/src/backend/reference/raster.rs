//! Triangle rasterisation for fragment kernels.
//!
//! Vertices are transformed with the `u_world` and `u_vp` (or `u_skyVP`)
//! uniforms when the program declares them. Triangles with a vertex behind
//! the eye are dropped rather than clipped. Depth testing is less-or-equal.

use lumen_core::math::{Mat4, Vec3, Vec4};

use super::kernel::{Fragment, ShadeContext};
use super::texels::{Texel, quantize};
use crate::backend::DrawGeometry;
use crate::types::TextureFormat;

/// Colour and depth buffers a pass draws into.
pub(super) struct Framebuffer<'a> {
    pub width: u32,
    pub height: u32,
    pub colors: Vec<(TextureFormat, &'a mut Vec<Texel>)>,
    pub depth: Option<&'a mut Vec<Texel>>,
}

#[derive(Clone, Copy)]
struct ClipVertex {
    clip: Vec4,
    world: Vec3,
    normal: Vec3,
    uv: [f32; 2],
}

fn full_screen_triangle() -> [ClipVertex; 3] {
    // Matches the vertex-index construction of the image vertex stage.
    let vertex = |u: f32, v: f32| ClipVertex {
        clip: Vec4::new(u * 2.0 - 1.0, 1.0 - v * 2.0, 0.0, 1.0),
        world: Vec3::zeros(),
        normal: Vec3::new(0.0, 0.0, 1.0),
        uv: [u, v],
    };
    [vertex(0.0, 0.0), vertex(2.0, 0.0), vertex(0.0, 2.0)]
}

fn mesh_triangles(ctx: &ShadeContext<'_>, geometry: &DrawGeometry) -> Vec<[ClipVertex; 3]> {
    let DrawGeometry::Mesh(mesh) = geometry else {
        return vec![full_screen_triangle()];
    };
    let world = ctx.mat4("u_world").unwrap_or_else(Mat4::identity);
    let (view_projection, pin_to_far) = match (ctx.mat4("u_vp"), ctx.mat4("u_skyVP")) {
        (Some(vp), _) => (vp, false),
        (None, Some(sky)) => (sky, true),
        (None, None) => (Mat4::identity(), false),
    };

    let data = mesh.data();
    let vertices: Vec<ClipVertex> = data
        .vertices
        .iter()
        .map(|v| {
            let p = world * Vec4::new(v.position[0], v.position[1], v.position[2], 1.0);
            let n = world * Vec4::new(v.normal[0], v.normal[1], v.normal[2], 0.0);
            let mut clip = view_projection * p;
            if pin_to_far {
                clip.z = clip.w;
            }
            ClipVertex {
                clip,
                world: p.xyz(),
                normal: n.xyz(),
                uv: v.uv,
            }
        })
        .collect();

    data.indices
        .chunks_exact(3)
        .filter_map(|tri| {
            let get = |i: u32| vertices.get(i as usize).copied();
            Some([get(tri[0])?, get(tri[1])?, get(tri[2])?])
        })
        .collect()
}

/// Rasterise `geometry` and shade every covered pixel with `shade`.
///
/// Returns the number of fragments written.
pub(super) fn draw(
    ctx: &ShadeContext<'_>,
    geometry: &DrawGeometry,
    target: &mut Framebuffer<'_>,
    shade: &dyn Fn(&ShadeContext<'_>, &Fragment) -> Vec<Texel>,
) -> usize {
    let mut written = 0;
    for triangle in mesh_triangles(ctx, geometry) {
        written += draw_triangle(ctx, &triangle, target, shade);
    }
    written
}

fn edge(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

fn draw_triangle(
    ctx: &ShadeContext<'_>,
    triangle: &[ClipVertex; 3],
    target: &mut Framebuffer<'_>,
    shade: &dyn Fn(&ShadeContext<'_>, &Fragment) -> Vec<Texel>,
) -> usize {
    if triangle.iter().any(|v| v.clip.w <= 1e-6) {
        return 0;
    }
    let (w, h) = (target.width as f32, target.height as f32);
    let screen: [[f32; 2]; 3] = std::array::from_fn(|i| {
        let c = triangle[i].clip;
        [(c.x / c.w * 0.5 + 0.5) * w, (0.5 - c.y / c.w * 0.5) * h]
    });
    let ndc_z: [f32; 3] = std::array::from_fn(|i| triangle[i].clip.z / triangle[i].clip.w);
    let area = edge(screen[0], screen[1], screen[2]);
    if area.abs() <= f32::EPSILON {
        return 0;
    }

    let face_normal = (triangle[1].world - triangle[0].world)
        .cross(&(triangle[2].world - triangle[0].world))
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(|| Vec3::new(0.0, 0.0, 1.0));

    let min_x = screen.iter().map(|p| p[0]).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let max_x = screen.iter().map(|p| p[0]).fold(f32::NEG_INFINITY, f32::max).ceil().min(w) as u32;
    let min_y = screen.iter().map(|p| p[1]).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let max_y = screen.iter().map(|p| p[1]).fold(f32::NEG_INFINITY, f32::max).ceil().min(h) as u32;

    let mut written = 0;
    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = [x as f32 + 0.5, y as f32 + 0.5];
            let b = [
                edge(screen[1], screen[2], p) / area,
                edge(screen[2], screen[0], p) / area,
                edge(screen[0], screen[1], p) / area,
            ];
            if b.iter().any(|&weight| weight < 0.0) {
                continue;
            }

            let depth = b[0] * ndc_z[0] + b[1] * ndc_z[1] + b[2] * ndc_z[2];
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }
            let index = (y * target.width + x) as usize;
            if let Some(depth_buffer) = target.depth.as_deref() {
                if depth > depth_buffer[index][0] {
                    continue;
                }
            }

            // Perspective-correct weights.
            let pw: [f32; 3] = std::array::from_fn(|i| b[i] / triangle[i].clip.w);
            let sum = pw[0] + pw[1] + pw[2];
            let pw = pw.map(|v| v / sum);
            let interpolate = |f: &dyn Fn(&ClipVertex) -> Vec3| {
                f(&triangle[0]) * pw[0] + f(&triangle[1]) * pw[1] + f(&triangle[2]) * pw[2]
            };

            let fragment = Fragment {
                pixel: [x, y],
                depth,
                world_position: interpolate(&|v| v.world),
                normal: interpolate(&|v| v.normal),
                face_normal,
                uv: [
                    triangle[0].uv[0] * pw[0]
                        + triangle[1].uv[0] * pw[1]
                        + triangle[2].uv[0] * pw[2],
                    triangle[0].uv[1] * pw[0]
                        + triangle[1].uv[1] * pw[1]
                        + triangle[2].uv[1] * pw[2],
                ],
            };

            let outputs = shade(ctx, &fragment);
            for ((format, buffer), value) in target.colors.iter_mut().zip(outputs) {
                buffer[index] = quantize(*format, value);
            }
            if let Some(depth_buffer) = target.depth.as_deref_mut() {
                depth_buffer[index] = [depth, 0.0, 0.0, 0.0];
            }
            written += 1;
        }
    }
    written
}
