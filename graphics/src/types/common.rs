//! Common types shared across the graphics system.

// ============================================================================
// Extent3d
// ============================================================================

/// 3D extent for textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth or array layer count (1 for 2D textures, 6 for cube maps).
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 2D extent.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Number of texels across all layers.
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize * self.depth.max(1) as usize
    }
}

// ============================================================================
// Attachment load operations
// ============================================================================

/// Clear value for render pass attachments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Clear color attachment with RGBA values.
    Color { r: f32, g: f32, b: f32, a: f32 },
    /// Clear depth attachment, and stencil when present.
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    /// Create a color clear value.
    pub fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Color { r, g, b, a }
    }

    /// Create a color clear value from an RGBA array.
    pub fn from_rgba(rgba: [f32; 4]) -> Self {
        Self::color(rgba[0], rgba[1], rgba[2], rgba[3])
    }

    /// Create a depth clear value with stencil zero.
    pub fn depth(depth: f32) -> Self {
        Self::DepthStencil { depth, stencil: 0 }
    }

    /// The value as RGBA; depth clears spread the depth into the red channel.
    pub fn to_rgba(&self) -> [f32; 4] {
        match *self {
            Self::Color { r, g, b, a } => [r, g, b, a],
            Self::DepthStencil { depth, .. } => [depth, 0.0, 0.0, 0.0],
        }
    }
}

/// What happens to an attachment's previous contents at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp {
    /// Keep the existing contents.
    Load,
    /// Overwrite with a clear value.
    Clear(ClearValue),
}
