//! Host texel storage and sampling.

use lumen_core::math::Vec3;

use crate::backend::BackendError;
use crate::types::{AddressMode, FilterMode, SamplerDescriptor, TextureDescriptor, TextureFormat};

pub type Texel = [f32; 4];

/// A texture held as RGBA f32 texels, layer-major then row-major.
#[derive(Debug, Clone)]
pub(super) struct SoftTexture {
    pub descriptor: TextureDescriptor,
    /// Contents visible to shader reads.
    pub committed: Vec<Texel>,
    /// Writes not yet made visible by a barrier.
    pub pending: Option<Vec<Texel>>,
}

impl SoftTexture {
    pub fn new(descriptor: &TextureDescriptor) -> Self {
        let fill = if descriptor.format.is_depth_stencil() {
            [1.0, 0.0, 0.0, 0.0]
        } else {
            [0.0; 4]
        };
        Self {
            committed: vec![fill; descriptor.size.texel_count()],
            pending: None,
            descriptor: descriptor.clone(),
        }
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

    /// Contents a write should start from: pending writes win over committed ones.
    pub fn take_working_copy(&mut self) -> Vec<Texel> {
        self.pending.take().unwrap_or_else(|| self.committed.clone())
    }

    pub fn commit(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                self.committed = pending;
                true
            }
            None => false,
        }
    }

    /// Committed texel at integer coordinates, clamped to the edge.
    pub fn load(&self, layer: u32, x: i64, y: i64) -> Texel {
        let (w, h) = (self.width() as i64, self.height() as i64);
        let x = x.clamp(0, w - 1);
        let y = y.clamp(0, h - 1);
        let index = (layer as i64 * w * h + y * w + x) as usize;
        self.committed.get(index).copied().unwrap_or([0.0; 4])
    }

    /// Filtered read at normalised coordinates of one layer.
    pub fn sample(&self, layer: u32, u: f32, v: f32, sampler: &SamplerDescriptor) -> Texel {
        let (w, h) = (self.width() as f32, self.height() as f32);
        let x = address(u, sampler.address_mode_u) * w;
        let y = address(v, sampler.address_mode_v) * h;
        match sampler.mag_filter {
            FilterMode::Nearest => self.load(layer, x.floor() as i64, y.floor() as i64),
            FilterMode::Linear => {
                let (fx, fy) = (x - 0.5, y - 0.5);
                let (x0, y0) = (fx.floor(), fy.floor());
                let (tx, ty) = (fx - x0, fy - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);
                let top = lerp(self.load(layer, x0, y0), self.load(layer, x0 + 1, y0), tx);
                let bottom = lerp(
                    self.load(layer, x0, y0 + 1),
                    self.load(layer, x0 + 1, y0 + 1),
                    tx,
                );
                lerp(top, bottom, ty)
            }
        }
    }

    /// Nearest read of a cube texture along `direction`.
    pub fn sample_cube(&self, direction: &Vec3, sampler: &SamplerDescriptor) -> Texel {
        let (x, y, z) = (direction.x, direction.y, direction.z);
        let (ax, ay, az) = (x.abs(), y.abs(), z.abs());
        let (layer, u, v, major) = if ax >= ay && ax >= az {
            if x > 0.0 { (0, -z, -y, ax) } else { (1, z, -y, ax) }
        } else if ay >= az {
            if y > 0.0 { (2, x, z, ay) } else { (3, x, -z, ay) }
        } else if z > 0.0 {
            (4, x, -y, az)
        } else {
            (5, -x, -y, az)
        };
        if major <= f32::EPSILON {
            return [0.0; 4];
        }
        let clamp = SamplerDescriptor {
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            ..sampler.clone()
        };
        self.sample(layer, (u / major + 1.0) * 0.5, (v / major + 1.0) * 0.5, &clamp)
    }
}

fn address(coord: f32, mode: AddressMode) -> f32 {
    match mode {
        AddressMode::ClampToEdge => coord.clamp(0.0, 1.0),
        AddressMode::Repeat => coord.rem_euclid(1.0),
        AddressMode::MirrorRepeat => {
            let t = coord.rem_euclid(2.0);
            if t > 1.0 { 2.0 - t } else { t }
        }
    }
}

fn lerp(a: Texel, b: Texel, t: f32) -> Texel {
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}

/// Round a value to what `format` can store.
pub(super) fn quantize(format: TextureFormat, value: Texel) -> Texel {
    let unorm = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() / 255.0;
    let half = |c: f32| half::f16::from_f32(c).to_f32();
    match format {
        TextureFormat::Rgba8Unorm
        | TextureFormat::Rgba8UnormSrgb
        | TextureFormat::Bgra8Unorm
        | TextureFormat::Bgra8UnormSrgb => value.map(unorm),
        TextureFormat::R8Unorm => [unorm(value[0]), 0.0, 0.0, 1.0],
        TextureFormat::R32Float => [value[0], 0.0, 0.0, 1.0],
        TextureFormat::Rg16Float => [half(value[0]), half(value[1]), 0.0, 1.0],
        TextureFormat::Rgba16Float => value.map(half),
        TextureFormat::Rgba32Float => value,
        TextureFormat::Depth24Plus
        | TextureFormat::Depth24PlusStencil8
        | TextureFormat::Depth32Float => {
            [value[0].clamp(0.0, 1.0), 0.0, 0.0, 0.0]
        }
    }
}

/// Decode tightly packed upload bytes.
pub(super) fn decode(format: TextureFormat, data: &[u8]) -> Result<Vec<Texel>, BackendError> {
    let unorm = |b: u8| f32::from(b) / 255.0;
    let f16_at = |bytes: &[u8]| half::f16::from_le_bytes([bytes[0], bytes[1]]).to_f32();
    let f32_at = |bytes: &[u8]| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

    let block = format.block_size() as usize;
    let texels = data.chunks_exact(block).map(|b| match format {
        TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => {
            Ok([unorm(b[0]), unorm(b[1]), unorm(b[2]), unorm(b[3])])
        }
        TextureFormat::Bgra8Unorm | TextureFormat::Bgra8UnormSrgb => {
            Ok([unorm(b[2]), unorm(b[1]), unorm(b[0]), unorm(b[3])])
        }
        TextureFormat::R8Unorm => Ok([unorm(b[0]), 0.0, 0.0, 1.0]),
        TextureFormat::R32Float => Ok([f32_at(b), 0.0, 0.0, 1.0]),
        TextureFormat::Rg16Float => Ok([f16_at(&b[0..2]), f16_at(&b[2..4]), 0.0, 1.0]),
        TextureFormat::Rgba16Float => Ok([
            f16_at(&b[0..2]),
            f16_at(&b[2..4]),
            f16_at(&b[4..6]),
            f16_at(&b[6..8]),
        ]),
        TextureFormat::Rgba32Float => Ok([
            f32_at(&b[0..4]),
            f32_at(&b[4..8]),
            f32_at(&b[8..12]),
            f32_at(&b[12..16]),
        ]),
        TextureFormat::Depth32Float => Ok([f32_at(b), 0.0, 0.0, 0.0]),
        TextureFormat::Depth24Plus | TextureFormat::Depth24PlusStencil8 => Err(
            BackendError::FeatureNotSupported(format!("uploads to {format} textures")),
        ),
    });
    texels.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextureUsage;

    #[test]
    fn test_quantize_rgba8() {
        let q = quantize(TextureFormat::Rgba8Unorm, [0.5, 1.5, -1.0, 0.2]);
        assert_eq!(q, [128.0 / 255.0, 1.0, 0.0, 51.0 / 255.0]);
    }

    #[test]
    fn test_decode_bgra_swaps_channels() {
        let texels = decode(TextureFormat::Bgra8Unorm, &[0, 0, 255, 255]).unwrap();
        assert_eq!(texels, vec![[1.0, 0.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_linear_sample_at_texel_centre_is_exact() {
        let desc = TextureDescriptor::new_2d(
            2,
            1,
            TextureFormat::Rgba32Float,
            TextureUsage::TEXTURE_BINDING,
        );
        let mut texture = SoftTexture::new(&desc);
        texture.committed = vec![[0.0; 4], [1.0; 4]];
        let sampler = SamplerDescriptor::linear();
        assert_eq!(texture.sample(0, 0.25, 0.5, &sampler), [0.0; 4]);
        assert_eq!(texture.sample(0, 0.75, 0.5, &sampler), [1.0; 4]);
        assert_eq!(texture.sample(0, 0.5, 0.5, &sampler), [0.5; 4]);
    }

    #[test]
    fn test_pending_writes_hidden_until_commit() {
        let desc = TextureDescriptor::new_2d(
            1,
            1,
            TextureFormat::Rgba32Float,
            TextureUsage::TEXTURE_BINDING,
        );
        let mut texture = SoftTexture::new(&desc);
        let mut working = texture.take_working_copy();
        working[0] = [1.0; 4];
        texture.pending = Some(working);
        assert_eq!(texture.load(0, 0, 0), [0.0; 4]);
        assert!(texture.commit());
        assert_eq!(texture.load(0, 0, 0), [1.0; 4]);
    }
}
