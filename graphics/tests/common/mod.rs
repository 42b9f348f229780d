//! Common utilities for integration tests.
//!
//! Tests are parameterized over [`Backend`] with `rstest`; backends that are
//! not compiled in are skipped.

#![allow(dead_code)]

use std::sync::Arc;

use lumen_core::Camera;
use lumen_core::math::Vec3;
use lumen_graphics::backend::{ReferenceKernel, Texel};
use lumen_graphics::{
    BackendType, DeviceParameters, EffectDescriptor, EffectRegistry, FrameConfig, FrameOrchestrator,
    GpuTextureId, GraphicsDevice, ReferenceBackend, ResourceSet, SharedResourceSet,
    TextureSlotDescriptor, UniformSlotDescriptor, builtin,
};

/// Full-screen triangle shared by the raster test effects.
pub const IMAGE_VS: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    var out: VertexOutput;
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    out.clip_position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    out.uv = uv;
    return out;
}
"#;

/// Writes `u_value` to every pixel.
pub const FILL_FS: &str = r#"
@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return uniforms.u_value;
}
"#;

/// Copies `u_input` into `u_output` texel by texel.
pub const COPY_CS: &str = r#"
@group(0) @binding(1) var u_input: texture_2d<f32>;
@group(0) @binding(2) var u_output: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    let size = vec2<u32>(textureDimensions(u_input));
    if (id.x >= size.x || id.y >= size.y) {
        return;
    }
    textureStore(u_output, vec2<i32>(id.xy), textureLoad(u_input, vec2<i32>(id.xy), 0));
}
"#;

pub const FILL: &str = "fill";
pub const COPY: &str = "copy";

/// Available backends for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Dummy backend (no actual GPU operations).
    Dummy,
    /// CPU reference executor.
    Reference,
}

impl Backend {
    pub fn backend_type(self) -> BackendType {
        match self {
            Backend::Dummy => BackendType::Dummy,
            Backend::Reference => BackendType::Reference,
        }
    }

    /// Whether the backend writes real texel data that can be read back.
    pub fn executes(self) -> bool {
        self == Backend::Reference
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Device plus a registry with the built-in textures, effects and the test effects.
pub struct TestContext {
    pub backend: Backend,
    pub device: Arc<GraphicsDevice>,
    pub registry: EffectRegistry,
}

impl TestContext {
    pub fn new(backend: Backend) -> Self {
        init_logging();
        let device =
            GraphicsDevice::new(DeviceParameters::new().with_backend(backend.backend_type()))
                .expect("Failed to create device");
        let mut registry = EffectRegistry::new(Arc::clone(&device));
        builtin::register_builtin_textures(&mut registry)
            .expect("Failed to register built-in textures");
        builtin::register_builtin_effects(&mut registry)
            .expect("Failed to register built-in effects");

        registry
            .build(
                FILL,
                EffectDescriptor::raster(FILL, IMAGE_VS, FILL_FS)
                    .with_uniform(UniformSlotDescriptor::vec4("u_value", [0.0; 4])),
            )
            .expect("Failed to build fill effect");
        registry
            .build(
                COPY,
                EffectDescriptor::compute(COPY, COPY_CS)
                    .with_texture(TextureSlotDescriptor::new("u_input", builtin::BLACK))
                    .with_texture(TextureSlotDescriptor::output("u_output")),
            )
            .expect("Failed to build copy effect");

        device.with_backend::<ReferenceBackend, _>(|reference| {
            reference.register_kernel(
                FILL,
                ReferenceKernel::fragment(|ctx, _| vec![ctx.vec4("u_value", [0.0; 4])]),
            );
            reference.register_kernel(
                COPY,
                ReferenceKernel::compute(|ctx| {
                    ctx.for_each_pixel("u_output", |shade, x, y| {
                        shade.load("u_input", i64::from(x), i64::from(y))
                    })
                }),
            );
        });

        Self {
            backend,
            device,
            registry,
        }
    }

    pub fn frame(&self, width: u32, height: u32) -> FrameOrchestrator {
        FrameOrchestrator::new(Arc::clone(&self.device), FrameConfig::new(width, height))
            .expect("Failed to create frame orchestrator")
    }

    /// A `fill` material writing `value`.
    pub fn fill_material(&self, value: [f32; 4]) -> SharedResourceSet {
        let mut set = ResourceSet::new(self.registry.effect(FILL).expect("fill effect"));
        set.set_uniform("u_value", value).expect("Failed to set fill value");
        set.shared()
    }

    /// Committed texels of `id`, `None` on backends that do not execute work.
    pub fn readback(&self, id: GpuTextureId) -> Option<Vec<Texel>> {
        self.device
            .with_backend::<ReferenceBackend, _>(|reference| reference.readback(id))
            .flatten()
    }
}

pub fn test_camera() -> Camera {
    Camera::perspective(60f32.to_radians(), 1.0, 0.1, 100.0)
        .with_position(Vec3::new(0.0, 2.0, 6.0))
        .with_target(Vec3::zeros())
}

/// Assert every texel of `texels` equals `expected` within one 8-bit step.
pub fn assert_all_texels(texels: &[Texel], expected: Texel) {
    const TOLERANCE: f32 = 1.0 / 255.0 + 1e-4;
    for (index, texel) in texels.iter().enumerate() {
        for (channel, (actual, expected)) in texel.iter().zip(expected).enumerate() {
            assert!(
                (actual - expected).abs() <= TOLERANCE,
                "texel {index} channel {channel}: expected {expected}, got {actual}"
            );
        }
    }
}
