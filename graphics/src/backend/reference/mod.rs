//! CPU reference backend.
//!
//! Executes passes and dispatches on the host so that frames can be
//! rendered and read back without a GPU. Effects are run by host kernels
//! registered under the effect label; family members such as
//! `simple_blur@2` fall back to the kernel registered for the family name.
//!
//! Writes go to a pending copy of each texture. Shader reads only see
//! committed contents, so a read that is not preceded by a barrier naming
//! the texture observes the data from before the write.

mod kernel;
mod raster;
mod texels;

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

pub use kernel::{
    ComputeKernel, Fragment, FragmentKernel, KernelContext, ReferenceKernel, ShadeContext,
};
pub use texels::Texel;

use kernel::OutputImage;
use raster::Framebuffer;
use texels::{SoftTexture, decode, quantize};

use super::{
    BackendError, ComputeDispatch, GpuBackend, GpuTextureId, ProgramBindings, RasterPass,
    TextureBarrier,
};
use crate::effects::CompiledProgram;
use crate::types::{LoadOp, TextureDescriptor};

/// Work observed by a [`ReferenceBackend`] during the current frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceEvent {
    Barrier(TextureBarrier),
    RenderPass { label: String, draws: usize },
    Dispatch { label: String },
}

/// Deterministic host executor.
pub struct ReferenceBackend {
    textures: HashMap<GpuTextureId, SoftTexture>,
    kernels: HashMap<String, ReferenceKernel>,
    events: Vec<ReferenceEvent>,
}

impl ReferenceBackend {
    /// Create a backend with kernels for every built-in effect.
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            kernels: kernel::builtin_kernels(),
            events: Vec::new(),
        }
    }

    /// Register or replace the kernel run for effects labelled `label`.
    pub fn register_kernel(&mut self, label: impl Into<String>, kernel: ReferenceKernel) {
        self.kernels.insert(label.into(), kernel);
    }

    pub fn has_kernel(&self, label: &str) -> bool {
        self.find_kernel(label).is_some()
    }

    /// Committed contents of a texture as RGBA f32 texels.
    pub fn readback(&self, id: GpuTextureId) -> Option<Vec<Texel>> {
        self.textures.get(&id).map(|texture| texture.committed.clone())
    }

    /// Events recorded since the current frame began.
    pub fn events(&self) -> &[ReferenceEvent] {
        &self.events
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn find_kernel(&self, label: &str) -> Option<&ReferenceKernel> {
        self.kernels.get(label).or_else(|| {
            let (family, _) = label.split_once('@')?;
            self.kernels.get(family)
        })
    }

    fn shade_context<'a>(
        &'a self,
        program: &'a CompiledProgram,
        bindings: &'a ProgramBindings,
    ) -> ShadeContext<'a> {
        ShadeContext {
            label: program.effect_label(),
            variant_key: program.variant_key(),
            bindings,
            textures: &self.textures,
        }
    }

    fn texture_mut(&mut self, id: GpuTextureId) -> Result<&mut SoftTexture, BackendError> {
        self.textures.get_mut(&id).ok_or(BackendError::UnknownTexture(id.raw()))
    }

    /// Working copy of an attachment with its load operation applied.
    fn open_attachment(
        &mut self,
        id: GpuTextureId,
        load: LoadOp,
    ) -> Result<Vec<Texel>, BackendError> {
        let texture = self.texture_mut(id)?;
        let mut texels = texture.take_working_copy();
        if let LoadOp::Clear(value) = load {
            let fill = quantize(texture.format(), value.to_rgba());
            texels.fill(fill);
        }
        Ok(texels)
    }
}

impl Default for ReferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReferenceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceBackend")
            .field("textures", &self.textures.len())
            .field("kernels", &self.kernels.len())
            .field("events", &self.events.len())
            .finish()
    }
}

impl GpuBackend for ReferenceBackend {
    fn name(&self) -> &'static str {
        "Reference"
    }

    fn create_texture(
        &mut self,
        id: GpuTextureId,
        descriptor: &TextureDescriptor,
    ) -> Result<(), BackendError> {
        if descriptor.size.width == 0 || descriptor.size.height == 0 {
            return Err(BackendError::ResourceCreationFailed(format!(
                "texture {:?} has zero size",
                descriptor.label
            )));
        }
        self.textures.insert(id, SoftTexture::new(descriptor));
        Ok(())
    }

    fn write_texture(&mut self, id: GpuTextureId, data: &[u8]) -> Result<(), BackendError> {
        let texture = self.texture_mut(id)?;
        let expected = texture.descriptor.byte_size();
        if data.len() != expected {
            return Err(BackendError::InvalidParameter(format!(
                "upload of {} bytes to a texture of {expected} bytes",
                data.len()
            )));
        }
        texture.committed = decode(texture.format(), data)?;
        texture.pending = None;
        Ok(())
    }

    fn destroy_texture(&mut self, id: GpuTextureId) {
        self.textures.remove(&id);
    }

    fn begin_frame(&mut self, frame_index: u64) -> Result<(), BackendError> {
        log::trace!("ReferenceBackend: begin frame {frame_index}");
        self.events.clear();
        Ok(())
    }

    fn texture_barriers(&mut self, barriers: &[TextureBarrier]) {
        for barrier in barriers {
            if let Some(texture) = self.textures.get_mut(&barrier.texture) {
                texture.commit();
            }
            self.events.push(ReferenceEvent::Barrier(*barrier));
        }
    }

    fn render_pass(&mut self, pass: &RasterPass) -> Result<(), BackendError> {
        let mut shaders = Vec::with_capacity(pass.draws.len());
        for draw in &pass.draws {
            let label = draw.program.effect_label();
            let Some(ReferenceKernel::Fragment(shade)) = self.find_kernel(label) else {
                return Err(BackendError::FeatureNotSupported(format!(
                    "no fragment kernel for effect '{label}'"
                )));
            };
            shaders.push(Arc::clone(shade));
        }

        let mut colors = Vec::with_capacity(pass.colors.len());
        for attachment in &pass.colors {
            let texels = self.open_attachment(attachment.texture, attachment.load)?;
            colors.push((attachment.format, texels));
        }
        let mut depth = match &pass.depth {
            Some(attachment) => Some(self.open_attachment(attachment.texture, attachment.load)?),
            None => None,
        };

        for (draw, shade) in pass.draws.iter().zip(shaders) {
            let label = draw.program.effect_label();
            let ctx = self.shade_context(&draw.program, &draw.bindings);
            let mut framebuffer = Framebuffer {
                width: pass.width,
                height: pass.height,
                colors: colors.iter_mut().map(|(format, texels)| (*format, texels)).collect(),
                depth: depth.as_mut(),
            };
            let fragments = raster::draw(&ctx, &draw.geometry, &mut framebuffer, &*shade);
            log::trace!("ReferenceBackend: '{label}' shaded {fragments} fragment(s)");
        }

        for (attachment, (_, texels)) in pass.colors.iter().zip(colors) {
            self.texture_mut(attachment.texture)?.pending = Some(texels);
        }
        if let (Some(attachment), Some(texels)) = (&pass.depth, depth) {
            self.texture_mut(attachment.texture)?.pending = Some(texels);
        }

        self.events.push(ReferenceEvent::RenderPass {
            label: pass.label.clone(),
            draws: pass.draws.len(),
        });
        Ok(())
    }

    fn dispatch(&mut self, dispatch: &ComputeDispatch) -> Result<(), BackendError> {
        let label = dispatch.program.effect_label();
        let Some(ReferenceKernel::Compute(run)) = self.find_kernel(label).cloned() else {
            return Err(BackendError::FeatureNotSupported(format!(
                "no compute kernel for effect '{label}'"
            )));
        };

        let mut outputs = HashMap::new();
        for bound in dispatch.bindings.storage_textures() {
            let texture = self.texture_mut(bound.texture)?;
            outputs.insert(
                bound.slot.clone(),
                OutputImage {
                    texture: bound.texture,
                    format: texture.format(),
                    width: texture.width(),
                    height: texture.height(),
                    texels: texture.take_working_copy(),
                },
            );
        }

        let mut ctx = KernelContext {
            shade: self.shade_context(&dispatch.program, &dispatch.bindings),
            outputs,
            extent: dispatch.extent,
        };
        run(&mut ctx);
        let outputs = ctx.outputs;

        for output in outputs.into_values() {
            self.texture_mut(output.texture)?.pending = Some(output.texels);
        }
        self.events.push(ReferenceEvent::Dispatch {
            label: dispatch.label.clone(),
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        for texture in self.textures.values_mut() {
            texture.commit();
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
