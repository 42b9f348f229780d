//! # Lumen Graphics
//!
//! Effect-driven rendering core: shader programs with typed uniform schemas,
//! bindable resource sets, multi-attachment render textures and a frame
//! orchestrator that sequences raster passes, compute dispatches and image
//! passes.
//!
//! ## Overview
//!
//! - [`EffectRegistry`] - builds immutable [`Effect`]s, parametric families and named textures
//! - [`ResourceSet`] - per-use values for an effect's slots ([`Material`] / [`ComputeUnit`])
//! - [`RenderTexture`] - off-screen target with named colour channels
//! - [`FrameOrchestrator`] - per-frame state machine with automatic barriers
//! - [`pipeline`] - the deferred ray-tracing frame built on top of them
//! - Backends: Dummy, a CPU reference executor and headless wgpu
//!
//! ## Example
//!
//! ```ignore
//! use lumen_graphics::*;
//!
//! let device = GraphicsDevice::new(DeviceParameters::new().with_backend(BackendType::Reference))?;
//! let mut registry = EffectRegistry::new(device.clone());
//! builtin::register_builtin_textures(&mut registry)?;
//! builtin::register_builtin_effects(&mut registry)?;
//!
//! let mut frame = FrameOrchestrator::new(device, FrameConfig::new(640, 360))?;
//! let mut deferred = DeferredRayTracing::new(&registry, DeferredRayTracingConfig::new(640, 360))?;
//! let stats = deferred.render_frame(&mut frame, &registry, &scene, &camera)?;
//! ```

pub mod backend;
pub mod device;
pub mod effects;
pub mod error;
pub mod frame;
pub mod materials;
pub mod pipeline;
pub mod resources;
pub mod scene;
pub mod targets;
pub mod types;

pub use backend::{BackendError, BackendType, GpuBackend, GpuTextureId};
#[cfg(feature = "dummy")]
pub use backend::DummyBackend;
#[cfg(feature = "reference")]
pub use backend::ReferenceBackend;
pub use device::{DeviceParameters, GraphicsDevice};
pub use effects::{
    Effect, EffectDescriptor, EffectKind, EffectRegistry, MacroSet, SamplerSlotDescriptor,
    TextureSlotDescriptor, UniformKind, UniformSchema, UniformSlotDescriptor, UniformValue, builtin,
};
pub use error::{GraphicsError, Result, SlotCategory};
pub use frame::{FrameConfig, FrameOrchestrator, FrameState, FrameStats};
pub use materials::{ComputeUnit, Material, ResourceSet, SharedResourceSet, TextureSource};
pub use pipeline::{
    DeferredRayTracing, DeferredRayTracingConfig, FrameView, RayTracingManager, RayTracingStage,
    RefreshPolicy, ScreenSpaceTracer,
};
pub use resources::{Mesh, Texture};
pub use scene::{DrawItem, Drawable, Scene, SceneNode};
pub use targets::{ChannelView, RenderTexture, RenderTextureDescriptor};
pub use types::{
    AddressMode, ClearValue, Extent3d, FilterMode, LoadOp, SamplerDescriptor, TextureDescriptor,
    TextureFormat, TextureUsage,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_backend_is_reference() {
        assert_eq!(DeviceParameters::default().backend, BackendType::Reference);
    }
}
