//! Multi-attachment render textures.
//!
//! A [`RenderTexture`] owns one GPU texture per declared colour channel plus
//! an optional depth/stencil texture. Its size is fixed at creation; a new
//! target must be created for a new size.
//!
//! Channels are handed out as [`ChannelView`]s, which do not own the
//! underlying texture. Once the target is destroyed every view reports
//! itself dead and the frame orchestrator refuses to bind it.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::GpuTextureId;
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, Result};
use crate::resources::Texture;
use crate::types::{TextureDescriptor, TextureFormat, TextureUsage};

/// A named colour channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorChannelDescriptor {
    pub name: String,
    pub format: TextureFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepthStencilDescriptor {
    pub need_stencil: bool,
}

/// Construction parameters of a [`RenderTexture`].
///
/// # Example
///
/// ```ignore
/// let gbuffer = RenderTexture::new(
///     &device,
///     RenderTextureDescriptor::new("gbuffer", 256, 256)
///         .with_color("positionMetal", TextureFormat::Rgba16Float)
///         .with_color("diffuseRough", TextureFormat::Rgba16Float)
///         .with_depth_stencil(false),
/// )?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTextureDescriptor {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub colors: Vec<ColorChannelDescriptor>,
    pub depth_stencil: Option<DepthStencilDescriptor>,
    /// Channels can be bound as compute storage outputs.
    pub for_compute: bool,
}

impl RenderTextureDescriptor {
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            colors: Vec::new(),
            depth_stencil: None,
            for_compute: false,
        }
    }

    pub fn with_color(mut self, name: impl Into<String>, format: TextureFormat) -> Self {
        self.colors.push(ColorChannelDescriptor {
            name: name.into(),
            format,
        });
        self
    }

    pub fn with_depth_stencil(mut self, need_stencil: bool) -> Self {
        self.depth_stencil = Some(DepthStencilDescriptor { need_stencil });
        self
    }

    pub fn for_compute(mut self) -> Self {
        self.for_compute = true;
        self
    }

    fn validate(&self) -> Result<()> {
        let invalid = |message: String| {
            GraphicsError::InvalidParameter(format!("render texture '{}': {message}", self.label))
        };
        if self.width == 0 || self.height == 0 {
            return Err(invalid(format!(
                "size {}x{} has a zero dimension",
                self.width, self.height
            )));
        }
        if self.colors.is_empty() {
            return Err(invalid("at least one colour channel is required".into()));
        }
        let mut names = HashSet::new();
        for color in &self.colors {
            if !names.insert(color.name.as_str()) {
                return Err(invalid(format!("duplicate channel '{}'", color.name)));
            }
            if color.format.is_depth_stencil() {
                return Err(invalid(format!(
                    "colour channel '{}' uses depth format {}",
                    color.name, color.format
                )));
            }
            if self.for_compute && !color.format.supports_storage() {
                return Err(invalid(format!(
                    "channel '{}' format {} cannot be written by compute programs",
                    color.name, color.format
                )));
            }
        }
        Ok(())
    }
}

struct ColorChannel {
    name: String,
    texture: Texture,
}

/// An off-screen target with named colour channels and optional depth/stencil.
pub struct RenderTexture {
    descriptor: RenderTextureDescriptor,
    colors: Vec<ColorChannel>,
    depth: Option<Texture>,
    alive: Arc<AtomicBool>,
}

impl RenderTexture {
    /// Allocate every channel of `descriptor`.
    pub fn new(device: &Arc<GraphicsDevice>, descriptor: RenderTextureDescriptor) -> Result<Self> {
        descriptor.validate()?;

        let mut usage = TextureUsage::RENDER_ATTACHMENT
            | TextureUsage::TEXTURE_BINDING
            | TextureUsage::COPY_SRC;
        if descriptor.for_compute {
            usage |= TextureUsage::STORAGE_BINDING;
        }

        let colors = descriptor
            .colors
            .iter()
            .map(|color| {
                let texture = device.create_texture(
                    &TextureDescriptor::new_2d(
                        descriptor.width,
                        descriptor.height,
                        color.format,
                        usage,
                    )
                        .with_label(format!("{}.{}", descriptor.label, color.name)),
                )?;
                Ok(ColorChannel {
                    name: color.name.clone(),
                    texture,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let depth = descriptor
            .depth_stencil
            .map(|depth| {
                let format = if depth.need_stencil {
                    TextureFormat::Depth24PlusStencil8
                } else {
                    TextureFormat::Depth24Plus
                };
                device.create_texture(
                    &TextureDescriptor::new_2d(
                        descriptor.width,
                        descriptor.height,
                        format,
                        TextureUsage::RENDER_ATTACHMENT,
                    )
                    .with_label(format!("{}.depth", descriptor.label)),
                )
            })
            .transpose()?;

        log::info!(
            "Created render texture '{}' {}x{} with {} channel(s){}",
            descriptor.label,
            descriptor.width,
            descriptor.height,
            colors.len(),
            if descriptor.for_compute { " for compute" } else { "" }
        );

        Ok(Self {
            descriptor,
            colors,
            depth,
            alive: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn descriptor(&self) -> &RenderTextureDescriptor {
        &self.descriptor
    }

    pub fn label(&self) -> &str {
        &self.descriptor.label
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    pub fn is_for_compute(&self) -> bool {
        self.descriptor.for_compute
    }

    pub fn has_depth(&self) -> bool {
        self.depth.is_some()
    }

    /// Channel names in declaration order.
    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.colors.iter().map(|c| c.name.as_str())
    }

    /// View of the channel `name`.
    pub fn channel(&self, name: &str) -> Result<ChannelView> {
        self.colors
            .iter()
            .find(|c| c.name == name)
            .map(|c| self.view(c))
            .ok_or_else(|| GraphicsError::UnknownChannel {
                target: self.descriptor.label.clone(),
                channel: name.to_string(),
            })
    }

    /// Views of every channel, in declaration order.
    pub fn channels(&self) -> Vec<ChannelView> {
        self.colors.iter().map(|c| self.view(c)).collect()
    }

    /// Release all GPU memory. Views taken from this target become dead.
    pub fn destroy(self) {
        log::debug!("Destroying render texture '{}'", self.descriptor.label);
    }

    fn view(&self, channel: &ColorChannel) -> ChannelView {
        ChannelView {
            target: self.descriptor.label.clone(),
            channel: channel.name.clone(),
            texture: channel.texture.id(),
            format: channel.texture.format(),
            width: self.descriptor.width,
            height: self.descriptor.height,
            storage: self.descriptor.for_compute,
            alive: Arc::clone(&self.alive),
        }
    }

    /// Attachment snapshot used to record passes against this target.
    pub(crate) fn attachments(&self) -> TargetAttachments {
        TargetAttachments {
            label: self.descriptor.label.clone(),
            width: self.descriptor.width,
            height: self.descriptor.height,
            colors: self
                .colors
                .iter()
                .map(|c| TargetColor {
                    channel: c.name.clone(),
                    texture: c.texture.id(),
                    format: c.texture.format(),
                })
                .collect(),
            depth: self.depth.as_ref().map(|d| TargetDepth {
                texture: d.id(),
                format: d.format(),
            }),
            alive: Arc::clone(&self.alive),
        }
    }
}

impl Drop for RenderTexture {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for RenderTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTexture")
            .field("label", &self.descriptor.label)
            .field("width", &self.descriptor.width)
            .field("height", &self.descriptor.height)
            .field("channels", &self.channel_names().collect::<Vec<_>>())
            .field("depth", &self.depth.as_ref().map(Texture::format))
            .field("for_compute", &self.descriptor.for_compute)
            .finish()
    }
}

static_assertions::assert_impl_all!(RenderTexture: Send, Sync);

/// Handle to one colour channel of a [`RenderTexture`].
///
/// Only used for binding into a resource set. It does not keep the target
/// alive.
#[derive(Debug, Clone)]
pub struct ChannelView {
    target: String,
    channel: String,
    texture: GpuTextureId,
    format: TextureFormat,
    width: u32,
    height: u32,
    storage: bool,
    alive: Arc<AtomicBool>,
}

impl ChannelView {
    pub fn target_label(&self) -> &str {
        &self.target
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn texture_id(&self) -> GpuTextureId {
        self.texture
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The owning target was created for compute output.
    pub fn is_storage(&self) -> bool {
        self.storage
    }

    /// `false` once the owning target has been destroyed.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl PartialEq for ChannelView {
    fn eq(&self, other: &Self) -> bool {
        self.texture == other.texture
    }
}

impl Eq for ChannelView {}

#[derive(Debug, Clone)]
pub(crate) struct TargetColor {
    pub channel: String,
    pub texture: GpuTextureId,
    pub format: TextureFormat,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TargetDepth {
    pub texture: GpuTextureId,
    pub format: TextureFormat,
}

#[derive(Debug, Clone)]
pub(crate) struct TargetAttachments {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub colors: Vec<TargetColor>,
    pub depth: Option<TargetDepth>,
    pub alive: Arc<AtomicBool>,
}

impl TargetAttachments {
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn contains(&self, texture: GpuTextureId) -> bool {
        self.colors.iter().any(|c| c.texture == texture)
            || self.depth.is_some_and(|d| d.texture == texture)
    }
}
