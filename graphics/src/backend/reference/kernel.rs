//! Host kernels standing in for fragment and compute programs.
//!
//! A fragment kernel is called once per covered pixel and returns one colour
//! per colour attachment. A compute kernel is called once per dispatch and
//! writes its storage outputs through [`KernelContext::write`].

use std::collections::HashMap;
use std::sync::Arc;

use lumen_core::math::{Mat4, Vec3};

use super::texels::{SoftTexture, Texel, quantize};
use crate::backend::{GpuTextureId, ProgramBindings};
use crate::types::{SamplerDescriptor, TextureFormat};

/// Interpolated inputs of one fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    /// Pixel centre in framebuffer coordinates.
    pub pixel: [u32; 2],
    pub depth: f32,
    pub world_position: Vec3,
    pub normal: Vec3,
    pub face_normal: Vec3,
    pub uv: [f32; 2],
}

pub type FragmentKernel = Arc<dyn Fn(&ShadeContext<'_>, &Fragment) -> Vec<Texel> + Send + Sync>;
pub type ComputeKernel = Arc<dyn Fn(&mut KernelContext<'_>) + Send + Sync>;

/// Host implementation of one effect.
#[derive(Clone)]
pub enum ReferenceKernel {
    Fragment(FragmentKernel),
    Compute(ComputeKernel),
}

impl ReferenceKernel {
    pub fn fragment(
        f: impl Fn(&ShadeContext<'_>, &Fragment) -> Vec<Texel> + Send + Sync + 'static,
    ) -> Self {
        Self::Fragment(Arc::new(f))
    }

    pub fn compute(f: impl Fn(&mut KernelContext<'_>) + Send + Sync + 'static) -> Self {
        Self::Compute(Arc::new(f))
    }
}

impl std::fmt::Debug for ReferenceKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fragment(_) => f.write_str("ReferenceKernel::Fragment"),
            Self::Compute(_) => f.write_str("ReferenceKernel::Compute"),
        }
    }
}

/// Read access to the bindings of the program being executed.
///
/// Texture reads only see committed contents.
pub struct ShadeContext<'a> {
    pub(super) label: &'a str,
    pub(super) variant_key: &'a str,
    pub(super) bindings: &'a ProgramBindings,
    pub(super) textures: &'a HashMap<GpuTextureId, SoftTexture>,
}

impl ShadeContext<'_> {
    /// Label of the effect being run.
    pub fn label(&self) -> &str {
        self.label
    }

    /// Whether the running variant has switch `name` enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.variant_key.split(',').any(|entry| entry == format!("{name}=1"))
    }

    pub fn uniform(&self, name: &str) -> Option<&[f32]> {
        self.bindings.uniform(name).map(|value| value.as_slice())
    }

    pub fn scalar(&self, name: &str, default: f32) -> f32 {
        self.uniform(name).and_then(|v| v.first().copied()).unwrap_or(default)
    }

    pub fn vec3(&self, name: &str, default: Vec3) -> Vec3 {
        match self.uniform(name) {
            Some(v) if v.len() >= 3 => Vec3::new(v[0], v[1], v[2]),
            _ => default,
        }
    }

    pub fn vec4(&self, name: &str, default: [f32; 4]) -> [f32; 4] {
        match self.uniform(name) {
            Some(v) if v.len() >= 4 => [v[0], v[1], v[2], v[3]],
            _ => default,
        }
    }

    pub fn mat4(&self, name: &str) -> Option<Mat4> {
        self.uniform(name)
            .filter(|v| v.len() == 16)
            .map(Mat4::from_column_slice)
    }

    fn texture(&self, slot: &str) -> Option<&SoftTexture> {
        let bound = self.bindings.texture(slot)?;
        self.textures.get(&bound.texture)
    }

    fn sampler(&self) -> SamplerDescriptor {
        self.bindings
            .samplers
            .first()
            .map(|s| s.descriptor.clone())
            .unwrap_or_default()
    }

    /// Size of the texture bound to `slot`.
    pub fn texture_size(&self, slot: &str) -> Option<(u32, u32)> {
        self.texture(slot).map(|t| (t.width(), t.height()))
    }

    /// Unfiltered read; out-of-range coordinates clamp to the edge.
    pub fn load(&self, slot: &str, x: i64, y: i64) -> Texel {
        self.texture(slot).map_or([0.0; 4], |t| t.load(0, x, y))
    }

    /// Filtered read through the program's first sampler.
    pub fn sample(&self, slot: &str, uv: [f32; 2]) -> Texel {
        self.texture(slot)
            .map_or([0.0; 4], |t| t.sample(0, uv[0], uv[1], &self.sampler()))
    }

    pub fn sample_cube(&self, slot: &str, direction: &Vec3) -> Texel {
        self.texture(slot)
            .map_or([0.0; 4], |t| t.sample_cube(direction, &self.sampler()))
    }
}

/// A storage output being written by a compute kernel.
pub(super) struct OutputImage {
    pub texture: GpuTextureId,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub texels: Vec<Texel>,
}

/// Execution context of a compute kernel.
pub struct KernelContext<'a> {
    pub(super) shade: ShadeContext<'a>,
    pub(super) outputs: HashMap<String, OutputImage>,
    pub(super) extent: (u32, u32),
}

impl<'a> KernelContext<'a> {
    /// Read access to uniforms and input textures.
    pub fn shade(&self) -> &ShadeContext<'a> {
        &self.shade
    }

    /// Resolution the dispatch grid was sized for.
    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    pub fn output_size(&self, slot: &str) -> Option<(u32, u32)> {
        self.outputs.get(slot).map(|o| (o.width, o.height))
    }

    /// Store `value` at `(x, y)` of output `slot`; out-of-range writes are dropped.
    pub fn write(&mut self, slot: &str, x: u32, y: u32, value: Texel) {
        if let Some(output) = self.outputs.get_mut(slot) {
            if x < output.width && y < output.height {
                let index = (y * output.width + x) as usize;
                output.texels[index] = quantize(output.format, value);
            }
        }
    }

    /// Run `f` for every pixel of the dispatch extent and store its result in `slot`.
    pub fn for_each_pixel(&mut self, slot: &str, f: impl Fn(&ShadeContext<'a>, u32, u32) -> Texel) {
        let (width, height) = self.extent;
        for y in 0..height {
            for x in 0..width {
                let value = f(&self.shade, x, y);
                self.write(slot, x, y, value);
            }
        }
    }
}

fn mul(a: Texel, b: Texel) -> Texel {
    std::array::from_fn(|i| a[i] * b[i])
}

fn rgb(v: Vec3, a: f32) -> Texel {
    [v.x, v.y, v.z, a]
}

const RT_AMBIENT: f32 = 0.1;
const RT_BACKGROUND: [f32; 3] = [0.05, 0.05, 0.08];

fn noise(x: f32, y: f32) -> f32 {
    ((x * 12.9898 + y * 78.233).sin() * 43758.545).fract()
}

/// Kernels for the built-in effects, keyed by effect label.
pub(super) fn builtin_kernels() -> HashMap<String, ReferenceKernel> {
    let mut kernels = HashMap::new();

    kernels.insert(
        "green".to_string(),
        ReferenceKernel::fragment(|_, _| vec![[0.0, 1.0, 0.0, 1.0]]),
    );

    kernels.insert(
        "unlit".to_string(),
        ReferenceKernel::fragment(|ctx, frag| {
            let color = ctx.vec4("u_color", [1.0; 4]);
            if ctx.is_enabled("USE_TEXCOORD_0") {
                vec![mul(color, ctx.sample("u_texture", frag.uv))]
            } else {
                vec![color]
            }
        }),
    );

    kernels.insert(
        "skybox".to_string(),
        ReferenceKernel::fragment(|ctx, frag| {
            let (s, c) = ctx.scalar("u_rotation", 0.0).sin_cos();
            let d = frag.world_position;
            let dir = Vec3::new(c * d.x + s * d.z, d.y, c * d.z - s * d.x);
            let sky = ctx.sample_cube("u_cubemap", &dir);
            let tint = ctx.vec4("u_color", [0.0, 0.0, 0.0, 1.0]);
            let factor = ctx.scalar("u_factor", 0.0);
            let exposure = ctx.scalar("u_exposure", 1.0);
            let channel = |i: usize| (sky[i] + (tint[i] - sky[i]) * factor) * exposure;
            vec![[channel(0), channel(1), channel(2), 1.0]]
        }),
    );

    kernels.insert(
        "rt_gbuffer".to_string(),
        ReferenceKernel::fragment(|ctx, frag| {
            let surface = ctx.vec4("u_surface", [0.0, 0.0, 0.0, 0.5]);
            let diffuse = ctx.vec4("u_diffuse", [0.8, 0.8, 0.8, 1.0]);
            let normal = frag.normal.try_normalize(f32::EPSILON).unwrap_or(frag.face_normal);
            vec![
                rgb(frag.world_position, surface[2]),
                [diffuse[0], diffuse[1], diffuse[2], surface[3]],
                rgb(normal, surface[0]),
                rgb(frag.face_normal, surface[1]),
            ]
        }),
    );

    kernels.insert(
        "gbuffer_show".to_string(),
        ReferenceKernel::fragment(|ctx, frag| {
            let local = [(frag.uv[0] * 2.0).fract(), (frag.uv[1] * 2.0).fract()];
            let scale = ctx.scalar("u_positionScale", 0.1);
            let left = frag.uv[0] < 0.5;
            let top = frag.uv[1] < 0.5;
            let color = match (top, left) {
                (true, true) => {
                    let p = ctx.sample("u_positionMetal", local);
                    [
                        (p[0] * scale).rem_euclid(1.0),
                        (p[1] * scale).rem_euclid(1.0),
                        (p[2] * scale).rem_euclid(1.0),
                        1.0,
                    ]
                }
                (true, false) => {
                    let d = ctx.sample("u_diffuseRough", local);
                    [d[0], d[1], d[2], 1.0]
                }
                (false, true) => {
                    let n = ctx.sample("u_normalMeshIndex", local);
                    [n[0] * 0.5 + 0.5, n[1] * 0.5 + 0.5, n[2] * 0.5 + 0.5, 1.0]
                }
                (false, false) => {
                    let f = ctx.sample("u_faceNormalMatIndex", local);
                    [f[0] * 0.5 + 0.5, f[1] * 0.5 + 0.5, f[2] * 0.5 + 0.5, 1.0]
                }
            };
            vec![color]
        }),
    );

    kernels.insert(
        "blit".to_string(),
        ReferenceKernel::fragment(|ctx, frag| vec![ctx.sample("u_texture", frag.uv)]),
    );

    kernels.insert(
        "rt_shade".to_string(),
        ReferenceKernel::compute(|ctx| {
            ctx.for_each_pixel("u_output", |shade, x, y| {
                let (x, y) = (i64::from(x), i64::from(y));
                let position = shade.load("u_positionMetal", x, y);
                let diffuse = shade.load("u_diffuseRough", x, y);
                let normal = shade.load("u_normalMeshIndex", x, y);
                let face = shade.load("u_faceNormalMatIndex", x, y);

                let n = Vec3::new(normal[0], normal[1], normal[2]);
                if n.norm_squared() < 0.25 {
                    return [RT_BACKGROUND[0], RT_BACKGROUND[1], RT_BACKGROUND[2], 1.0];
                }
                let face = Vec3::new(face[0], face[1], face[2]);
                let n = (if n.dot(&face) < 0.0 { face } else { n }).normalize();

                let light_pos = shade.vec4("u_lightPos", [0.0; 4]);
                let to_light = if light_pos[3] > 0.5 {
                    Vec3::new(
                        light_pos[0] - position[0],
                        light_pos[1] - position[1],
                        light_pos[2] - position[2],
                    )
                } else {
                    -shade.vec3("u_lightDir", Vec3::new(0.0, -1.0, 0.0))
                };
                let to_light = to_light.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros);
                let lambert = n.dot(&to_light).max(0.0);
                let light = shade.vec3("u_lightColor", Vec3::new(1.0, 1.0, 1.0));
                let seed = shade.vec4("u_randomSeed", [0.0; 4]);
                let jitter = (noise(x as f32 + seed[0], y as f32 + seed[1]) - 0.5) / 255.0;

                let channel = |i: usize| {
                    (diffuse[i] * (RT_AMBIENT + lambert * light[i]) + jitter).clamp(0.0, 1.0)
                };
                [channel(0), channel(1), channel(2), 1.0]
            });
        }),
    );

    kernels.insert(
        "simple_blur".to_string(),
        ReferenceKernel::compute(|ctx| {
            let radius: i64 = ctx
                .shade()
                .label()
                .split_once('@')
                .and_then(|(_, radius)| radius.parse().ok())
                .unwrap_or(0);
            let window = 2 * radius + 1;
            ctx.for_each_pixel("u_output", |shade, x, y| {
                let weights = shade.uniform("u_kernel").unwrap_or_default();
                let mut sum = [0.0f32; 4];
                let mut total = 0.0f32;
                for dy in 0..window {
                    for dx in 0..window {
                        let w = weights.get((dy * window + dx) as usize).copied().unwrap_or(0.0);
                        let texel = shade.load(
                            "u_input",
                            i64::from(x) + dx - radius,
                            i64::from(y) + dy - radius,
                        );
                        for (acc, value) in sum.iter_mut().zip(texel) {
                            *acc += value * w;
                        }
                        total += w;
                    }
                }
                sum.map(|v| v / total.max(1e-6))
            });
        }),
    );

    kernels
}
