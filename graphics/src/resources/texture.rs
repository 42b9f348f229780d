//! GPU texture resource.

use std::sync::Arc;

use crate::backend::GpuTextureId;
use crate::device::GraphicsDevice;
use crate::types::{Extent3d, TextureDescriptor, TextureDimension, TextureFormat};

/// A GPU texture resource.
///
/// Textures are created by [`GraphicsDevice::create_texture`] and hold a strong
/// reference to their parent device, keeping it alive. Dropping the texture
/// frees the backend allocation.
///
/// # Example
///
/// ```ignore
/// let texture = device.create_texture(&TextureDescriptor::new_2d(
///     1920, 1080,
///     TextureFormat::Rgba8Unorm,
///     TextureUsage::RENDER_ATTACHMENT,
/// ))?;
/// println!("Texture size: {}x{}", texture.width(), texture.height());
/// ```
pub struct Texture {
    device: Arc<GraphicsDevice>,
    id: GpuTextureId,
    descriptor: TextureDescriptor,
}

impl Texture {
    /// Create a new texture (called by GraphicsDevice).
    pub(crate) fn new(
        device: Arc<GraphicsDevice>,
        id: GpuTextureId,
        descriptor: TextureDescriptor,
    ) -> Self {
        Self { device, id, descriptor }
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Backend id of the allocation.
    pub fn id(&self) -> GpuTextureId {
        self.id
    }

    /// Get the texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    pub fn size(&self) -> Extent3d {
        self.descriptor.size
    }

    pub fn width(&self) -> u32 {
        self.descriptor.size.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.size.height
    }

    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    pub fn dimension(&self) -> TextureDimension {
        self.descriptor.dimension
    }

    /// Get the texture label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        log::trace!("Releasing texture {:?} ({})", self.descriptor.label, self.id.raw());
        self.device.release_texture(self.id);
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("label", &self.descriptor.label)
            .field("size", &self.descriptor.size)
            .field("format", &self.descriptor.format)
            .finish()
    }
}

static_assertions::assert_impl_all!(Texture: Send, Sync);
