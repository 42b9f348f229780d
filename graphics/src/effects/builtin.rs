//! Built-in textures and effects.
//!
//! Registration order matters: [`register_builtin_textures`] provides the
//! defaults the effects of [`register_builtin_effects`] name.

use super::effect::EffectDescriptor;
use super::preprocess::specialize;
use super::registry::EffectRegistry;
use super::uniform::{
    SamplerSlotDescriptor, TextureSlotDescriptor, UniformKind, UniformSlotDescriptor,
};
use crate::error::{GraphicsError, Result};
use crate::types::{SamplerDescriptor, TextureDescriptor, TextureFormat, TextureUsage};

pub const WHITE: &str = "white";
pub const BLACK: &str = "black";
pub const CUBE_WHITE: &str = "cube_white";

pub const GREEN: &str = "green";
pub const UNLIT: &str = "unlit";
pub const SKYBOX: &str = "skybox";
pub const RT_GBUFFER: &str = "rt_gbuffer";
pub const GBUFFER_SHOW: &str = "gbuffer_show";
pub const BLIT: &str = "blit";
pub const RT_SHADE: &str = "rt_shade";
pub const SIMPLE_BLUR: &str = "simple_blur";

/// Vertex attribute switches understood by mesh effects.
pub const MODEL_SWITCHES: [&str; 5] = [
    "USE_TEXCOORD_0",
    "USE_NORMAL",
    "USE_TANGENT",
    "USE_COLOR_0",
    "USE_TEXCOORD_1",
];

const MODEL_VS: &str = include_str!("../../shaders/model.vert.wgsl");
const GREEN_FS: &str = include_str!("../../shaders/green.frag.wgsl");
const UNLIT_FS: &str = include_str!("../../shaders/unlit.frag.wgsl");
const SKYBOX_VS: &str = include_str!("../../shaders/skybox.vert.wgsl");
const SKYBOX_FS: &str = include_str!("../../shaders/skybox.frag.wgsl");
const GBUFFER_FS: &str = include_str!("../../shaders/gbuffer.frag.wgsl");
const IMAGE_VS: &str = include_str!("../../shaders/image.vert.wgsl");
const BLIT_FS: &str = include_str!("../../shaders/blit.frag.wgsl");
const GBUFFER_SHOW_FS: &str = include_str!("../../shaders/gbuffer_show.frag.wgsl");
const RT_SHADE_CS: &str = include_str!("../../shaders/rt_shade.comp.wgsl");
const BLUR_CS: &str = include_str!("../../shaders/blur.comp.wgsl");

/// G-buffer channel names, in attachment order.
pub const GBUFFER_CHANNELS: [&str; 4] = [
    "positionMetal",
    "diffuseRough",
    "normalMeshIndex",
    "faceNormalMatIndex",
];

/// Register `white`, `black` and `cube_white`.
pub fn register_builtin_textures(registry: &mut EffectRegistry) -> Result<()> {
    let device = std::sync::Arc::clone(registry.device());
    let usage = TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST;

    let white = device.create_texture_with_data(
        &TextureDescriptor::new_2d(1, 1, TextureFormat::Rgba8Unorm, usage).with_label(WHITE),
        &[255, 255, 255, 255],
    )?;
    registry.register_texture(WHITE, white)?;

    let black = device.create_texture_with_data(
        &TextureDescriptor::new_2d(1, 1, TextureFormat::Rgba8Unorm, usage).with_label(BLACK),
        &[0, 0, 0, 255],
    )?;
    registry.register_texture(BLACK, black)?;

    let cube = device.create_texture_with_data(
        &TextureDescriptor::new_cube(1, TextureFormat::Rgba8Unorm, usage).with_label(CUBE_WHITE),
        &[255; 24],
    )?;
    registry.register_texture(CUBE_WHITE, cube)?;
    Ok(())
}

/// Largest kernel that fits a 64 KiB uniform binding.
pub const MAX_KERNEL_WEIGHTS: u32 = 16 * 1024;

/// Number of kernel weights stored for a blur of `radius`, padded to a multiple of 4.
///
/// Fails with [`GraphicsError::InvalidParameter`] when the padded kernel
/// exceeds [`MAX_KERNEL_WEIGHTS`].
pub fn kernel_size_for_radius(radius: u32) -> Result<u32> {
    radius
        .checked_mul(2)
        .and_then(|diameter| diameter.checked_add(1))
        .and_then(|window| window.checked_mul(window))
        .and_then(|weights| weights.checked_next_multiple_of(4))
        .filter(|weights| *weights <= MAX_KERNEL_WEIGHTS)
        .ok_or_else(|| {
            GraphicsError::InvalidParameter(format!(
                "blur radius {radius} exceeds the {MAX_KERNEL_WEIGHTS}-weight kernel limit"
            ))
        })
}

fn with_model_switches(mut descriptor: EffectDescriptor) -> EffectDescriptor {
    for switch in MODEL_SWITCHES {
        descriptor = descriptor.with_macro(switch, false);
    }
    descriptor
}

fn linear_sampler() -> SamplerSlotDescriptor {
    SamplerSlotDescriptor::new("u_sampler", SamplerDescriptor::linear())
}

/// Descriptor of the `simple_blur` family for one radius.
pub fn simple_blur_descriptor(radius: u32) -> Result<EffectDescriptor> {
    let weights = kernel_size_for_radius(radius)?;
    let source = specialize(BLUR_CS, &[("RADIUS", radius.to_string())]).map_err(|message| {
        GraphicsError::Compile {
            effect: SIMPLE_BLUR.into(),
            message,
        }
    })?;
    Ok(EffectDescriptor::compute(SIMPLE_BLUR, source)
        .with_uniform(UniformSlotDescriptor::array(
            "u_kernel",
            UniformKind::Vec4,
            weights / 4,
            vec![1.0; weights as usize],
        ))
        .with_texture(TextureSlotDescriptor::new("u_input", BLACK))
        .with_texture(TextureSlotDescriptor::output("u_output")))
}

/// Build every built-in effect and register the `simple_blur` family.
pub fn register_builtin_effects(registry: &mut EffectRegistry) -> Result<()> {
    registry.build(
        GREEN,
        with_model_switches(EffectDescriptor::raster(GREEN, MODEL_VS, GREEN_FS))
            .with_uniform(UniformSlotDescriptor::mat4("u_world"))
            .with_uniform(UniformSlotDescriptor::mat4("u_vp")),
    )?;

    registry.build(
        UNLIT,
        with_model_switches(EffectDescriptor::raster(UNLIT, MODEL_VS, UNLIT_FS))
            .with_uniform(UniformSlotDescriptor::mat4("u_world"))
            .with_uniform(UniformSlotDescriptor::mat4("u_vp"))
            .with_uniform(UniformSlotDescriptor::vec4("u_color", [1.0; 4]))
            .with_texture(TextureSlotDescriptor::new("u_texture", WHITE))
            .with_sampler(linear_sampler()),
    )?;

    registry.build(
        SKYBOX,
        EffectDescriptor::raster(SKYBOX, SKYBOX_VS, SKYBOX_FS)
            .with_uniform(UniformSlotDescriptor::mat4("u_skyVP"))
            .with_uniform(UniformSlotDescriptor::vec4("u_color", [0.0, 0.0, 0.0, 1.0]))
            .with_uniform(UniformSlotDescriptor::scalar("u_factor", 0.0))
            .with_uniform(UniformSlotDescriptor::scalar("u_rotation", 0.0))
            .with_uniform(UniformSlotDescriptor::scalar("u_exposure", 1.0))
            .with_texture(TextureSlotDescriptor::new("u_cubemap", CUBE_WHITE))
            .with_sampler(linear_sampler()),
    )?;

    registry.build(
        RT_GBUFFER,
        with_model_switches(EffectDescriptor::raster(RT_GBUFFER, MODEL_VS, GBUFFER_FS))
            .with_macro("USE_NORMAL", true)
            .with_uniform(UniformSlotDescriptor::mat4("u_world"))
            .with_uniform(UniformSlotDescriptor::mat4("u_vp"))
            .with_uniform(UniformSlotDescriptor::vec4("u_diffuse", [0.8, 0.8, 0.8, 1.0]))
            .with_uniform(UniformSlotDescriptor::vec4("u_surface", [0.0, 0.0, 0.0, 0.5])),
    )?;

    let mut show = EffectDescriptor::raster(GBUFFER_SHOW, IMAGE_VS, GBUFFER_SHOW_FS)
        .with_uniform(UniformSlotDescriptor::scalar("u_positionScale", 0.1));
    for channel in GBUFFER_CHANNELS {
        show = show.with_texture(TextureSlotDescriptor::new(format!("u_{channel}"), BLACK));
    }
    registry.build(GBUFFER_SHOW, show.with_sampler(linear_sampler()))?;

    registry.build(
        BLIT,
        EffectDescriptor::raster(BLIT, IMAGE_VS, BLIT_FS)
            .with_texture(TextureSlotDescriptor::new("u_texture", BLACK))
            .with_sampler(linear_sampler()),
    )?;

    let mut shade = EffectDescriptor::compute(RT_SHADE, RT_SHADE_CS)
        .with_uniform(UniformSlotDescriptor::vec2("u_screenSize", [1.0, 1.0]))
        .with_uniform(UniformSlotDescriptor::vec4("u_randomSeed", [0.0; 4]))
        .with_uniform(UniformSlotDescriptor::mat4("u_view"))
        .with_uniform(UniformSlotDescriptor::mat4("u_proj"))
        .with_uniform(UniformSlotDescriptor::mat4("u_vp"))
        .with_uniform(UniformSlotDescriptor::vec4("u_lightPos", [0.0; 4]))
        .with_uniform(UniformSlotDescriptor::vec3("u_lightDir", [0.0, -1.0, 0.0]))
        .with_uniform(UniformSlotDescriptor::vec3("u_lightColor", [1.0, 1.0, 1.0]));
    for channel in GBUFFER_CHANNELS {
        shade = shade.with_texture(TextureSlotDescriptor::new(format!("u_{channel}"), BLACK));
    }
    registry.build(RT_SHADE, shade.with_texture(TextureSlotDescriptor::output("u_output")))?;

    registry.register_family(SIMPLE_BLUR, simple_blur_descriptor)?;

    log::info!("Registered built-in effects");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_size_padding() {
        assert_eq!(kernel_size_for_radius(0).unwrap(), 4);
        assert_eq!(kernel_size_for_radius(1).unwrap(), 12);
        assert_eq!(kernel_size_for_radius(2).unwrap(), 28);
        assert_eq!(kernel_size_for_radius(3).unwrap(), 52);
    }

    #[test]
    fn test_oversized_radius_rejected() {
        assert_eq!(kernel_size_for_radius(63).unwrap(), 16132);
        assert!(matches!(
            kernel_size_for_radius(64),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert!(matches!(
            kernel_size_for_radius(40000),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert!(matches!(
            kernel_size_for_radius(u32::MAX),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert!(matches!(
            simple_blur_descriptor(40000),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_blur_descriptor_shape() {
        let desc = simple_blur_descriptor(2).unwrap();
        let kernel = &desc.schema.uniforms[0];
        assert_eq!(kernel.array_len, Some(7));
        assert_eq!(kernel.float_count(), 28);
        assert!(desc.compute.unwrap().contains("const RADIUS: i32 = 2;"));
    }
}
