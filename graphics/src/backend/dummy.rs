//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations but provides
//! a valid implementation for testing the graphics API without
//! requiring GPU hardware.

use std::any::Any;
use std::collections::HashSet;

use crate::types::TextureDescriptor;

use super::{BackendError, ComputeDispatch, GpuBackend, GpuTextureId, RasterPass, TextureBarrier};

/// Counters of the work a [`DummyBackend`] accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DummyCounters {
    pub frames: u64,
    pub render_passes: u64,
    pub draws: u64,
    pub dispatches: u64,
    pub barriers: u64,
}

/// Dummy GPU backend.
#[derive(Debug, Default)]
pub struct DummyBackend {
    textures: HashSet<GpuTextureId>,
    counters: DummyCounters,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> DummyCounters {
        self.counters
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn check(&self, id: GpuTextureId) -> Result<(), BackendError> {
        if self.textures.contains(&id) {
            Ok(())
        } else {
            Err(BackendError::UnknownTexture(id.raw()))
        }
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_texture(
        &mut self,
        id: GpuTextureId,
        descriptor: &TextureDescriptor,
    ) -> Result<(), BackendError> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth
        );
        self.textures.insert(id);
        Ok(())
    }

    fn write_texture(&mut self, id: GpuTextureId, data: &[u8]) -> Result<(), BackendError> {
        log::trace!("DummyBackend: writing {} bytes to texture {}", data.len(), id.raw());
        self.check(id)
    }

    fn destroy_texture(&mut self, id: GpuTextureId) {
        self.textures.remove(&id);
    }

    fn begin_frame(&mut self, frame_index: u64) -> Result<(), BackendError> {
        log::trace!("DummyBackend: begin frame {frame_index}");
        Ok(())
    }

    fn texture_barriers(&mut self, barriers: &[TextureBarrier]) {
        self.counters.barriers += barriers.len() as u64;
    }

    fn render_pass(&mut self, pass: &RasterPass) -> Result<(), BackendError> {
        for attachment in &pass.colors {
            self.check(attachment.texture)?;
        }
        log::trace!("DummyBackend: render pass '{}' with {} draws", pass.label, pass.draws.len());
        self.counters.render_passes += 1;
        self.counters.draws += pass.draws.len() as u64;
        Ok(())
    }

    fn dispatch(&mut self, dispatch: &ComputeDispatch) -> Result<(), BackendError> {
        log::trace!(
            "DummyBackend: dispatch '{}' with {:?} workgroups",
            dispatch.label,
            dispatch.workgroups
        );
        self.counters.dispatches += 1;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        self.counters.frames += 1;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
