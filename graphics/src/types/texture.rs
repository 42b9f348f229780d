//! Texture types and descriptors.

use std::fmt;
use std::str::FromStr;

use super::Extent3d;
use crate::error::GraphicsError;
use bitflags::bitflags;

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 32-bit red channel, float.
    R32Float,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 8-bit BGRA channels, sRGB.
    Bgra8UnormSrgb,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
    /// 24-bit depth.
    Depth24Plus,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(self, Self::Depth24Plus | Self::Depth24PlusStencil8 | Self::Depth32Float)
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8)
    }

    /// Returns the size in bytes per pixel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R32Float
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Depth24Plus
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }

    /// Whether the format can back a write-only storage texture.
    pub fn supports_storage(&self) -> bool {
        matches!(self, Self::Rgba8Unorm | Self::Rgba16Float | Self::Rgba32Float | Self::R32Float)
    }

    /// Number of colour components.
    pub fn components(&self) -> usize {
        match self {
            Self::R8Unorm
            | Self::R32Float
            | Self::Depth24Plus
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 1,
            Self::Rg16Float => 2,
            _ => 4,
        }
    }

    /// WGSL spelling of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::R8Unorm => "r8unorm",
            Self::R32Float => "r32float",
            Self::Rg16Float => "rg16float",
            Self::Rgba8Unorm => "rgba8unorm",
            Self::Rgba8UnormSrgb => "rgba8unorm-srgb",
            Self::Bgra8Unorm => "bgra8unorm",
            Self::Bgra8UnormSrgb => "bgra8unorm-srgb",
            Self::Rgba16Float => "rgba16float",
            Self::Rgba32Float => "rgba32float",
            Self::Depth24Plus => "depth24plus",
            Self::Depth24PlusStencil8 => "depth24plus-stencil8",
            Self::Depth32Float => "depth32float",
        }
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextureFormat {
    type Err = GraphicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [TextureFormat; 12] = [
            TextureFormat::R8Unorm,
            TextureFormat::R32Float,
            TextureFormat::Rg16Float,
            TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float,
            TextureFormat::Rgba32Float,
            TextureFormat::Depth24Plus,
            TextureFormat::Depth24PlusStencil8,
            TextureFormat::Depth32Float,
        ];
        ALL.into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| GraphicsError::InvalidParameter(format!("unknown texture format '{s}'")))
    }
}

/// Texture dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    #[default]
    D2,
    /// Six square layers sampled as a cube map.
    Cube,
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be copied from.
        const COPY_SRC = 1 << 0;
        /// Texture can be copied to.
        const COPY_DST = 1 << 1;
        /// Texture can be sampled in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// Texture can be used as a storage texture.
        const STORAGE_BINDING = 1 << 3;
        /// Texture can be used as a render attachment.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Size of the texture; `depth` is the layer count.
    pub size: Extent3d,
    pub dimension: TextureDimension,
    /// Texture format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            size: Extent3d::new_2d(width, height),
            dimension: TextureDimension::D2,
            format,
            usage,
        }
    }

    /// Create a cube texture descriptor with square faces.
    pub fn new_cube(face_size: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            size: Extent3d {
                width: face_size,
                height: face_size,
                depth: 6,
            },
            dimension: TextureDimension::Cube,
            format,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Size in bytes of the full texel data across all layers.
    pub fn byte_size(&self) -> usize {
        self.size.texel_count() * self.format.block_size() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_format_detection() {
        assert!(TextureFormat::Depth24Plus.is_depth_stencil());
        assert!(!TextureFormat::Depth24Plus.has_stencil());
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(!TextureFormat::Rgba16Float.is_depth_stencil());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("rgba16float".parse::<TextureFormat>().unwrap(), TextureFormat::Rgba16Float);
        assert!("rgb565".parse::<TextureFormat>().is_err());
    }

    #[test]
    fn test_cube_descriptor() {
        let desc = TextureDescriptor::new_cube(
            1,
            TextureFormat::Rgba8Unorm,
            TextureUsage::TEXTURE_BINDING,
        );
        assert_eq!(desc.size.depth, 6);
        assert_eq!(desc.byte_size(), 24);
    }
}
