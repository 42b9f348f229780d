//! GPU backend abstraction.
//!
//! A [`GpuBackend`] executes the commands the frame orchestrator records.
//! Three implementations are provided:
//!
//! - [`DummyBackend`] - accepts everything and only counts work
//! - [`ReferenceBackend`] - deterministic CPU executor used by tests and headless demos
//! - `WgpuBackend` - headless wgpu device (feature `wgpu-backend`)

pub mod commands;
#[cfg(feature = "dummy")]
pub mod dummy;
pub mod error;
#[cfg(feature = "reference")]
pub mod reference;
#[cfg(feature = "wgpu-backend")]
pub mod wgpu_impl;

use std::any::Any;
use std::fmt;

pub use commands::{
    BoundSampler, BoundTexture, ColorAttachment, ComputeDispatch, DepthAttachment, DrawCall,
    DrawGeometry, GpuTextureId, ProgramBindings, RasterPass, ResourceSetId, TextureAccessMode,
    TextureBarrier,
};
#[cfg(feature = "dummy")]
pub use dummy::DummyBackend;
pub use error::BackendError;
#[cfg(feature = "reference")]
pub use reference::{
    Fragment, KernelContext, ReferenceBackend, ReferenceEvent, ReferenceKernel, ShadeContext, Texel,
};
#[cfg(feature = "wgpu-backend")]
pub use wgpu_impl::WgpuBackend;

use crate::types::TextureDescriptor;

/// Backend selection for [`crate::DeviceParameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// No-op backend.
    Dummy,
    /// CPU reference executor.
    #[default]
    Reference,
    /// Headless wgpu device.
    Wgpu,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dummy => "dummy",
            Self::Reference => "reference",
            Self::Wgpu => "wgpu",
        })
    }
}

impl std::str::FromStr for BackendType {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dummy" => Ok(Self::Dummy),
            "reference" | "cpu" => Ok(Self::Reference),
            "wgpu" => Ok(Self::Wgpu),
            other => Err(BackendError::InvalidParameter(format!("unknown backend '{other}'"))),
        }
    }
}

/// Executes textures uploads, passes and dispatches.
///
/// Commands arrive in program order. A backend must make a texture write
/// visible to later reads once a [`TextureBarrier`] naming that texture has
/// been issued, or once the frame ends.
pub trait GpuBackend: Send + Any {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    fn create_texture(
        &mut self,
        id: GpuTextureId,
        descriptor: &TextureDescriptor,
    ) -> Result<(), BackendError>;

    /// Replace the full contents of a texture with tightly packed texel data.
    fn write_texture(&mut self, id: GpuTextureId, data: &[u8]) -> Result<(), BackendError>;

    fn destroy_texture(&mut self, id: GpuTextureId);

    fn begin_frame(&mut self, frame_index: u64) -> Result<(), BackendError>;

    fn texture_barriers(&mut self, barriers: &[TextureBarrier]);

    fn render_pass(&mut self, pass: &RasterPass) -> Result<(), BackendError>;

    fn dispatch(&mut self, dispatch: &ComputeDispatch) -> Result<(), BackendError>;

    /// Submit the frame's work.
    fn end_frame(&mut self) -> Result<(), BackendError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Create the backend named by `backend_type`.
pub fn create_backend(backend_type: BackendType) -> Result<Box<dyn GpuBackend>, BackendError> {
    match backend_type {
        #[cfg(feature = "dummy")]
        BackendType::Dummy => Ok(Box::new(DummyBackend::new())),
        #[cfg(feature = "reference")]
        BackendType::Reference => Ok(Box::new(ReferenceBackend::new())),
        #[cfg(feature = "wgpu-backend")]
        BackendType::Wgpu => Ok(Box::new(WgpuBackend::new()?)),
        #[allow(unreachable_patterns)]
        other => Err(BackendError::FeatureNotSupported(format!(
            "backend '{other}' is not compiled in"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_parse() {
        assert_eq!("wgpu".parse::<BackendType>().unwrap(), BackendType::Wgpu);
        assert_eq!("CPU".parse::<BackendType>().unwrap(), BackendType::Reference);
        assert!("vulkan".parse::<BackendType>().is_err());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_create_dummy_backend() {
        let backend = create_backend(BackendType::Dummy).unwrap();
        assert_eq!(backend.name(), "Dummy");
    }
}
