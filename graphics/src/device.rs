//! Graphics device.
//!
//! The [`GraphicsDevice`] owns the GPU backend and is the main interface
//! for creating GPU resources. It is shared as `Arc<GraphicsDevice>`;
//! every resource keeps its device alive.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::backend::{BackendType, GpuBackend, GpuTextureId, create_backend};
use crate::error::{GraphicsError, Result};
use crate::resources::Texture;
use crate::types::TextureDescriptor;

/// Parameters for creating a [`GraphicsDevice`].
///
/// # Example
///
/// ```ignore
/// let device = GraphicsDevice::new(
///     DeviceParameters::new()
///         .with_backend(BackendType::Reference)
///         .with_label("headless"),
/// )?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceParameters {
    pub backend: BackendType,
    pub label: String,
    /// Maximum width or height of any texture.
    pub max_texture_dimension: u32,
}

impl Default for DeviceParameters {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            label: String::from("device"),
            max_texture_dimension: 8192,
        }
    }
}

impl DeviceParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_max_texture_dimension(mut self, max: u32) -> Self {
        self.max_texture_dimension = max;
        self
    }
}

/// A graphics device for creating GPU resources.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync`. The backend sits behind a mutex;
/// resources must not be dropped from inside [`GraphicsDevice::with_backend`]
/// callbacks, since releasing them locks the backend again.
pub struct GraphicsDevice {
    parameters: DeviceParameters,
    backend_name: &'static str,
    backend: Mutex<Box<dyn GpuBackend>>,
    next_texture_id: AtomicU64,
    live_textures: Mutex<HashSet<GpuTextureId>>,
}

impl GraphicsDevice {
    /// Create a device on the backend named in `parameters`.
    pub fn new(parameters: DeviceParameters) -> Result<Arc<Self>> {
        let backend = create_backend(parameters.backend)?;
        Ok(Self::from_backend(parameters, backend))
    }

    /// Create a device around an already constructed backend.
    pub fn from_backend(parameters: DeviceParameters, backend: Box<dyn GpuBackend>) -> Arc<Self> {
        let backend_name = backend.name();
        log::info!("Created graphics device '{}' on {} backend", parameters.label, backend_name);
        Arc::new(Self {
            parameters,
            backend_name,
            backend: Mutex::new(backend),
            next_texture_id: AtomicU64::new(1),
            live_textures: Mutex::new(HashSet::new()),
        })
    }

    /// Get the device label.
    pub fn label(&self) -> &str {
        &self.parameters.label
    }

    pub fn parameters(&self) -> &DeviceParameters {
        &self.parameters
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Create a GPU texture.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero or exceeds device limits, or the backend fails.
    pub fn create_texture(self: &Arc<Self>, descriptor: &TextureDescriptor) -> Result<Texture> {
        let max = self.parameters.max_texture_dimension;
        let size = descriptor.size;
        if size.width == 0 || size.height == 0 || size.depth == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} has a zero dimension",
                descriptor.label
            )));
        }
        if size.width > max || size.height > max {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} of {}x{} exceeds maximum dimension {max}",
                descriptor.label, size.width, size.height
            )));
        }

        let id = GpuTextureId::new(self.next_texture_id.fetch_add(1, Ordering::Relaxed));
        self.backend.lock().create_texture(id, descriptor)?;
        self.live_textures.lock().insert(id);
        Ok(Texture::new(Arc::clone(self), id, descriptor.clone()))
    }

    /// Create a texture and upload tightly packed texel data.
    pub fn create_texture_with_data(
        self: &Arc<Self>,
        descriptor: &TextureDescriptor,
        data: &[u8],
    ) -> Result<Texture> {
        if data.len() != descriptor.byte_size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} expects {} bytes, got {}",
                descriptor.label,
                descriptor.byte_size(),
                data.len()
            )));
        }
        let texture = self.create_texture(descriptor)?;
        let uploaded = self.backend.lock().write_texture(texture.id(), data);
        uploaded?;
        Ok(texture)
    }

    /// Called by [`Texture`] on drop.
    pub(crate) fn release_texture(&self, id: GpuTextureId) {
        if self.live_textures.lock().remove(&id) {
            self.backend.lock().destroy_texture(id);
        }
    }

    pub fn is_texture_alive(&self, id: GpuTextureId) -> bool {
        self.live_textures.lock().contains(&id)
    }

    pub fn live_texture_count(&self) -> usize {
        self.live_textures.lock().len()
    }

    /// Lock the backend for command submission.
    pub(crate) fn backend(&self) -> MutexGuard<'_, Box<dyn GpuBackend>> {
        self.backend.lock()
    }

    /// Run `f` against the backend if it is a `B`.
    ///
    /// Returns `None` when the device runs a different backend.
    pub fn with_backend<B: GpuBackend, R>(&self, f: impl FnOnce(&mut B) -> R) -> Option<R> {
        let mut guard = self.backend.lock();
        guard.as_any_mut().downcast_mut::<B>().map(f)
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("label", &self.parameters.label)
            .field("backend", &self.backend_name)
            .field("live_textures", &self.live_texture_count())
            .finish()
    }
}

// Ensure GraphicsDevice is Send + Sync
static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);
