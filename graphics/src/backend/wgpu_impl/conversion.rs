//! Type conversion utilities for the wgpu backend.

use crate::effects::{ReflectedTexture, StageMask};
use crate::types::{
    AddressMode, ClearValue, FilterMode, LoadOp, SamplerDescriptor, TextureDimension, TextureFormat,
    TextureUsage,
};

/// Convert TextureFormat to wgpu texture format.
pub fn convert_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
        TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        TextureFormat::Rg16Float => wgpu::TextureFormat::Rg16Float,
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::Depth24Plus => wgpu::TextureFormat::Depth24Plus,
        TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

/// Convert TextureUsage to wgpu texture usages.
pub fn convert_texture_usage(usage: TextureUsage) -> wgpu::TextureUsages {
    let mut result = wgpu::TextureUsages::empty();

    if usage.contains(TextureUsage::COPY_SRC) {
        result |= wgpu::TextureUsages::COPY_SRC;
    }
    if usage.contains(TextureUsage::COPY_DST) {
        result |= wgpu::TextureUsages::COPY_DST;
    }
    if usage.contains(TextureUsage::TEXTURE_BINDING) {
        result |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.contains(TextureUsage::STORAGE_BINDING) {
        result |= wgpu::TextureUsages::STORAGE_BINDING;
    }
    if usage.contains(TextureUsage::RENDER_ATTACHMENT) {
        result |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }

    result
}

pub fn convert_view_dimension(dimension: TextureDimension) -> wgpu::TextureViewDimension {
    match dimension {
        TextureDimension::D2 => wgpu::TextureViewDimension::D2,
        TextureDimension::Cube => wgpu::TextureViewDimension::Cube,
    }
}

fn convert_address_mode(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

fn convert_filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

/// Build a wgpu sampler descriptor; the label is borrowed from `descriptor`.
pub fn convert_sampler(descriptor: &SamplerDescriptor) -> wgpu::SamplerDescriptor<'_> {
    wgpu::SamplerDescriptor {
        label: descriptor.label.as_deref(),
        address_mode_u: convert_address_mode(descriptor.address_mode_u),
        address_mode_v: convert_address_mode(descriptor.address_mode_v),
        address_mode_w: convert_address_mode(descriptor.address_mode_w),
        mag_filter: convert_filter_mode(descriptor.mag_filter),
        min_filter: convert_filter_mode(descriptor.min_filter),
        mipmap_filter: convert_filter_mode(descriptor.mipmap_filter),
        ..Default::default()
    }
}

/// Convert a colour LoadOp; depth clear values load instead.
pub fn convert_load_op(op: &LoadOp) -> wgpu::LoadOp<wgpu::Color> {
    match op {
        LoadOp::Load => wgpu::LoadOp::Load,
        LoadOp::Clear(ClearValue::Color { r, g, b, a }) => wgpu::LoadOp::Clear(wgpu::Color {
            r: *r as f64,
            g: *g as f64,
            b: *b as f64,
            a: *a as f64,
        }),
        LoadOp::Clear(ClearValue::DepthStencil { .. }) => wgpu::LoadOp::Load,
    }
}

/// Convert a depth LoadOp.
pub fn convert_depth_load_op(op: &LoadOp) -> wgpu::LoadOp<f32> {
    match op {
        LoadOp::Load => wgpu::LoadOp::Load,
        LoadOp::Clear(ClearValue::DepthStencil { depth, .. }) => wgpu::LoadOp::Clear(*depth),
        LoadOp::Clear(ClearValue::Color { r, .. }) => wgpu::LoadOp::Clear(*r),
    }
}

/// Convert a stencil LoadOp.
pub fn convert_stencil_load_op(op: &LoadOp) -> wgpu::LoadOp<u32> {
    match op {
        LoadOp::Clear(ClearValue::DepthStencil { stencil, .. }) => wgpu::LoadOp::Clear(*stencil),
        _ => wgpu::LoadOp::Load,
    }
}

/// Convert reflected stage visibility to wgpu shader stages.
pub fn convert_shader_stages(stages: StageMask) -> wgpu::ShaderStages {
    let mut result = wgpu::ShaderStages::empty();

    if stages.contains(StageMask::VERTEX) {
        result |= wgpu::ShaderStages::VERTEX;
    }
    if stages.contains(StageMask::FRAGMENT) {
        result |= wgpu::ShaderStages::FRAGMENT;
    }
    if stages.contains(StageMask::COMPUTE) {
        result |= wgpu::ShaderStages::COMPUTE;
    }

    result
}

/// Binding type of a reflected texture slot.
pub fn convert_texture_binding(texture: &ReflectedTexture) -> wgpu::BindingType {
    let view_dimension = if texture.cube {
        wgpu::TextureViewDimension::Cube
    } else {
        wgpu::TextureViewDimension::D2
    };
    match texture.storage_format {
        Some(format) => wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: convert_texture_format(format),
            view_dimension,
        },
        None => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
    }
}
