//! Headless wgpu backend.
//!
//! Programs are handed to the driver as the WGSL the effect compiler
//! produced; bind group layouts come from the program reflection. All work
//! of a frame is recorded into one command encoder and submitted at
//! `end_frame`. wgpu tracks resource states itself, so barriers are only
//! logged.

pub(crate) mod conversion;
mod pass_encoding;
mod resources;

use std::any::Any;
use std::collections::HashMap;

use crate::effects::ProgramId;
use crate::resources::MeshId;
use crate::types::{SamplerDescriptor, TextureDescriptor};

use super::{
    BackendError, ComputeDispatch, GpuBackend, GpuTextureId, RasterPass, ResourceSetId,
    TextureBarrier,
};
use resources::{MeshBuffers, WgpuTexture};

/// Key of a cached render or compute pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    program: ProgramId,
    colors: Vec<wgpu::TextureFormat>,
    depth: Option<wgpu::TextureFormat>,
    /// Full-screen draws have no vertex buffer.
    vertex_input: bool,
}

/// A pipeline with the layouts of its bind groups, indexed by group.
pub(crate) struct CachedPipeline {
    pipeline: PipelineHandle,
    bind_group_layouts: Vec<(u32, wgpu::BindGroupLayout)>,
}

pub(crate) enum PipelineHandle {
    Render(wgpu::RenderPipeline),
    Compute(wgpu::ComputePipeline),
}

/// wgpu-based GPU backend.
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: HashMap<GpuTextureId, WgpuTexture>,
    samplers: HashMap<SamplerDescriptor, wgpu::Sampler>,
    pipelines: HashMap<PipelineKey, CachedPipeline>,
    meshes: HashMap<MeshId, MeshBuffers>,
    /// One uniform buffer per use of a set within a frame.
    uniform_buffers: HashMap<(ResourceSetId, u32), wgpu::Buffer>,
    uniform_uses: HashMap<ResourceSetId, u32>,
    encoder: Option<wgpu::CommandEncoder>,
    frame_index: u64,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter.get_info().name)
            .field("textures", &self.textures.len())
            .field("pipelines", &self.pipelines.len())
            .finish()
    }
}

impl WgpuBackend {
    /// Create a headless device on the best available adapter.
    pub fn new() -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| {
            BackendError::InitializationFailed(format!("no compatible GPU adapter: {e}"))
        })?;

        log::info!("wgpu adapter: {:?}", adapter.get_info());

        // Filtering of 32-bit float textures is optional.
        let required_features = adapter.features() & wgpu::Features::FLOAT32_FILTERABLE;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Lumen Device"),
            required_features,
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .map_err(|e| BackendError::InitializationFailed(format!("device creation failed: {e}")))?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            textures: HashMap::new(),
            samplers: HashMap::new(),
            pipelines: HashMap::new(),
            meshes: HashMap::new(),
            uniform_buffers: HashMap::new(),
            uniform_uses: HashMap::new(),
            encoder: None,
            frame_index: 0,
        })
    }

    /// Get the wgpu adapter.
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Get the wgpu device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get the wgpu queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Native texture behind `id`, if it is alive.
    pub fn texture(&self, id: GpuTextureId) -> Option<&wgpu::Texture> {
        self.textures.get(&id).map(|texture| &texture.texture)
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Lumen Frame Encoder"),
            })
        })
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_texture(
        &mut self,
        id: GpuTextureId,
        descriptor: &TextureDescriptor,
    ) -> Result<(), BackendError> {
        let texture = self.create_native_texture(descriptor)?;
        self.textures.insert(id, texture);
        Ok(())
    }

    fn write_texture(&mut self, id: GpuTextureId, data: &[u8]) -> Result<(), BackendError> {
        let texture = self.textures.get(&id).ok_or(BackendError::UnknownTexture(id.raw()))?;
        let expected = texture.descriptor.byte_size();
        if data.len() != expected {
            return Err(BackendError::InvalidParameter(format!(
                "texture {} expects {expected} bytes, got {}",
                id.raw(),
                data.len()
            )));
        }
        let size = texture.descriptor.size;
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.width * texture.descriptor.format.block_size()),
                rows_per_image: Some(size.height),
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: size.depth,
            },
        );
        Ok(())
    }

    fn destroy_texture(&mut self, id: GpuTextureId) {
        if let Some(texture) = self.textures.remove(&id) {
            texture.texture.destroy();
        }
    }

    fn begin_frame(&mut self, frame_index: u64) -> Result<(), BackendError> {
        self.frame_index = frame_index;
        self.uniform_uses.clear();
        // Meshes unused for a couple of frames are released.
        self.meshes.retain(|_, mesh| mesh.last_used + 2 >= frame_index);
        self.encoder();
        Ok(())
    }

    fn texture_barriers(&mut self, barriers: &[TextureBarrier]) {
        for barrier in barriers {
            log::trace!(
                "wgpu: texture {} {:?} -> {:?}",
                barrier.texture.raw(),
                barrier.before,
                barrier.after
            );
        }
    }

    fn render_pass(&mut self, pass: &RasterPass) -> Result<(), BackendError> {
        self.encode_raster_pass(pass)
    }

    fn dispatch(&mut self, dispatch: &ComputeDispatch) -> Result<(), BackendError> {
        self.encode_dispatch(dispatch)
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
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
