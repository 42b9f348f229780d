//! Commands recorded by the frame orchestrator and executed by a backend.
//!
//! Commands only carry ids and plain data, never owning resource handles,
//! so a backend can execute them while the device lock is held.

use std::sync::Arc;

use crate::effects::{CompiledProgram, ResourceBinding, UniformValue};
use crate::resources::Mesh;
use crate::types::{LoadOp, SamplerDescriptor, TextureDimension, TextureFormat};

/// Backend identifier of a texture allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuTextureId(u64);

impl GpuTextureId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Identifier of a resource set, stable for its whole lifetime.
///
/// Backends key per-set GPU state (uniform buffers) by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceSetId(pub(crate) u64);

/// How a pass accesses a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureAccessMode {
    /// Written as color render target (color attachment).
    RenderTargetWrite,
    /// Written as depth/stencil render target (depth attachment).
    DepthStencilWrite,
    /// Sampled in a shader (texture read).
    ShaderRead,
    /// Written as a storage texture by a compute program.
    StorageWrite,
    /// Destination of an upload.
    TransferWrite,
}

impl TextureAccessMode {
    /// Check if this access mode is a write operation.
    pub fn is_write(self) -> bool {
        !matches!(self, Self::ShaderRead)
    }
}

/// Makes prior writes to a texture visible to the access that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBarrier {
    pub texture: GpuTextureId,
    /// Previous access, `None` on first use.
    pub before: Option<TextureAccessMode>,
    pub after: TextureAccessMode,
}

/// A texture bound to a program slot.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundTexture {
    pub slot: String,
    /// Shader binding, `None` when no stage references the slot.
    pub binding: Option<ResourceBinding>,
    pub texture: GpuTextureId,
    pub format: TextureFormat,
    pub dimension: TextureDimension,
    pub width: u32,
    pub height: u32,
    /// Bound as a write-only storage texture.
    pub storage: bool,
}

/// A sampler bound to a program slot.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSampler {
    pub slot: String,
    pub binding: Option<ResourceBinding>,
    pub descriptor: SamplerDescriptor,
}

/// Everything a program needs besides geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramBindings {
    pub set: ResourceSetId,
    /// Packed uniform block, laid out for the program's `EffectUniforms`.
    pub uniform_payload: Vec<u8>,
    /// Whether the payload changed since the set was last submitted.
    pub uniforms_dirty: bool,
    /// Named uniform values, for backends that interpret programs on the host.
    pub uniforms: Vec<(String, UniformValue)>,
    pub textures: Vec<BoundTexture>,
    pub samplers: Vec<BoundSampler>,
}

impl ProgramBindings {
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.iter().find(|(slot, _)| slot == name).map(|(_, value)| value)
    }

    pub fn texture(&self, slot: &str) -> Option<&BoundTexture> {
        self.textures.iter().find(|bound| bound.slot == slot)
    }

    /// Textures written by the program.
    pub fn storage_textures(&self) -> impl Iterator<Item = &BoundTexture> {
        self.textures.iter().filter(|bound| bound.storage)
    }
}

/// Geometry of a draw.
#[derive(Debug, Clone)]
pub enum DrawGeometry {
    Mesh(Arc<Mesh>),
    /// A single triangle covering the target, generated from vertex indices.
    FullScreen,
}

#[derive(Debug, Clone)]
pub struct DrawCall {
    pub program: Arc<CompiledProgram>,
    pub geometry: DrawGeometry,
    pub bindings: ProgramBindings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorAttachment {
    pub channel: String,
    pub texture: GpuTextureId,
    pub format: TextureFormat,
    pub load: LoadOp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthAttachment {
    pub texture: GpuTextureId,
    pub format: TextureFormat,
    pub load: LoadOp,
}

/// A raster pass over one render texture.
#[derive(Debug, Clone)]
pub struct RasterPass {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub colors: Vec<ColorAttachment>,
    pub depth: Option<DepthAttachment>,
    pub draws: Vec<DrawCall>,
}

/// One compute program dispatch.
#[derive(Debug, Clone)]
pub struct ComputeDispatch {
    pub label: String,
    pub program: Arc<CompiledProgram>,
    pub bindings: ProgramBindings,
    pub workgroups: [u32; 3],
    /// Resolution of the output the grid was sized for.
    pub extent: (u32, u32),
}
