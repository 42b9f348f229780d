//! Integration tests for render textures and the frame orchestrator.
//!
//! The ordering tests need a backend that executes work and only check
//! texel data on [`Backend::Reference`]; the rest run everywhere.

mod common;

use std::collections::HashSet;

use rstest::rstest;

use common::{Backend, COPY, FILL_FS, IMAGE_VS, TestContext, assert_all_texels, test_camera};
use lumen_graphics::frame::OUTPUT_CHANNEL;
use lumen_graphics::{
    BackendError, DrawItem, EffectDescriptor, GraphicsError, RenderTexture, RenderTextureDescriptor,
    ResourceSet, TextureFormat, TextureSlotDescriptor, UniformSlotDescriptor, builtin,
};

const FILL_VALUE: [f32; 4] = [0.25, 0.5, 0.75, 1.0];

/// Writes opaque white to two storage outputs.
const SPLIT_CS: &str = r#"
@group(0) @binding(1) var u_first: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(2) var u_second: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    textureStore(u_first, vec2<i32>(id.xy), vec4<f32>(1.0));
    textureStore(u_second, vec2<i32>(id.xy), vec4<f32>(1.0));
}
"#;

fn storage_target(ctx: &TestContext, label: &str, width: u32, height: u32) -> RenderTexture {
    RenderTexture::new(
        &ctx.device,
        RenderTextureDescriptor::new(label, width, height)
            .with_color("color", TextureFormat::Rgba8Unorm)
            .for_compute(),
    )
    .unwrap()
}

// ============================================================================
// Render textures
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_channels_have_distinct_handles(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let target = RenderTexture::new(
        &ctx.device,
        RenderTextureDescriptor::new("mrt", 256, 256)
            .with_color("a", TextureFormat::Rgba16Float)
            .with_color("b", TextureFormat::Rgba16Float),
    )
    .unwrap();

    let a = target.channel("a").unwrap();
    let b = target.channel("b").unwrap();
    assert_ne!(a.texture_id(), b.texture_id());
    assert_eq!(a.format(), TextureFormat::Rgba16Float);
    assert_eq!((a.width(), a.height()), (256, 256));
    assert!(!a.is_storage());
    assert!(matches!(
        target.channel("c"),
        Err(GraphicsError::UnknownChannel { .. })
    ));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_every_channel_gets_its_own_texture(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let mut descriptor = RenderTextureDescriptor::new("g_buffer", 64, 32).with_depth_stencil(false);
    for channel in builtin::GBUFFER_CHANNELS {
        descriptor = descriptor.with_color(channel, TextureFormat::Rgba16Float);
    }
    let target = RenderTexture::new(&ctx.device, descriptor).unwrap();

    let ids: HashSet<_> = target.channels().iter().map(|view| view.texture_id()).collect();
    assert_eq!(ids.len(), builtin::GBUFFER_CHANNELS.len());
    let names: Vec<&str> = target.channel_names().collect();
    assert_eq!(names, builtin::GBUFFER_CHANNELS);
    assert!(target.has_depth());

    let view = target.channel("normalMeshIndex").unwrap();
    assert!(view.is_alive());
    target.destroy();
    assert!(!view.is_alive());
    assert!(!ctx.device.is_texture_alive(view.texture_id()));
}

// ============================================================================
// Frame lifecycle
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_frame_lifecycle_errors(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let mut frame = ctx.frame(16, 16);
    let camera = test_camera();

    assert!(matches!(frame.end_frame(), Err(GraphicsError::InvalidFrameState(_))));
    assert!(matches!(
        frame.render_images(&[], None),
        Err(GraphicsError::InvalidFrameState(_))
    ));
    assert!(matches!(
        frame.compute_units(&[], &camera, &[]),
        Err(GraphicsError::InvalidFrameState(_))
    ));

    frame.start_frame().unwrap();
    assert!(matches!(frame.start_frame(), Err(GraphicsError::InvalidFrameState(_))));
    let stats = frame.end_frame().unwrap();
    assert_eq!(stats.frame_index, 0);
    assert_eq!(frame.frame_count(), 1);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_unbound_output_is_rejected(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let mut frame = ctx.frame(16, 16);
    let unit = ResourceSet::new(ctx.registry.effect(COPY).unwrap()).shared();

    frame.start_frame().unwrap();
    let err = frame.compute_units(&[unit], &test_camera(), &[]).unwrap_err();
    assert!(matches!(err, GraphicsError::InvalidBinding(_)), "got {err:?}");
    let stats = frame.end_frame().unwrap();
    assert_eq!(stats.compute_dispatches, 0);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_unit_reading_its_own_output_is_rejected(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let mut frame = ctx.frame(16, 16);
    let target = RenderTexture::new(
        &ctx.device,
        RenderTextureDescriptor::new("loop", 16, 16)
            .with_color("color", TextureFormat::Rgba8Unorm)
            .for_compute(),
    )
    .unwrap();
    let unit = ResourceSet::new(ctx.registry.effect(COPY).unwrap()).shared();
    {
        let mut unit = unit.write();
        unit.set_render_texture("u_output", &target).unwrap();
        unit.set_render_texture("u_input", &target).unwrap();
    }

    frame.start_frame().unwrap();
    assert!(matches!(
        frame.compute_units(&[unit], &test_camera(), &[]),
        Err(GraphicsError::InvalidBinding(_))
    ));
    frame.end_frame().unwrap();
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_outputs_of_different_sizes_are_rejected(#[case] backend: Backend) {
    let mut ctx = TestContext::new(backend);
    ctx.registry
        .build(
            "split",
            EffectDescriptor::compute("split", SPLIT_CS)
                .with_texture(TextureSlotDescriptor::output("u_first"))
                .with_texture(TextureSlotDescriptor::output("u_second")),
        )
        .unwrap();
    let small = storage_target(&ctx, "small", 8, 8);
    let large = storage_target(&ctx, "large", 16, 16);
    let unit = ResourceSet::new(ctx.registry.effect("split").unwrap()).shared();
    {
        let mut unit = unit.write();
        unit.set_render_texture("u_first", &small).unwrap();
        unit.set_render_texture("u_second", &large).unwrap();
    }

    let mut frame = ctx.frame(16, 16);
    frame.start_frame().unwrap();
    let err = frame.compute_units(&[unit], &test_camera(), &[]).unwrap_err();
    assert!(matches!(err, GraphicsError::InvalidBinding(_)), "got {err:?}");
    assert_eq!(frame.end_frame().unwrap().compute_dispatches, 0);
}

// ============================================================================
// Ordering
// ============================================================================

/// A raster pass writes a target, a compute unit copies it into a second
/// target within the same frame; the copy must see the raster result.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_compute_sees_raster_output_of_same_frame(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let mut frame = ctx.frame(16, 16);

    let src = RenderTexture::new(
        &ctx.device,
        RenderTextureDescriptor::new("src", 16, 16).with_color("c", TextureFormat::Rgba8Unorm),
    )
    .unwrap();
    let dst = RenderTexture::new(
        &ctx.device,
        RenderTextureDescriptor::new("dst", 16, 16)
            .with_color("color", TextureFormat::Rgba8Unorm)
            .for_compute(),
    )
    .unwrap();

    let copy = ResourceSet::new(ctx.registry.effect(COPY).unwrap()).shared();
    {
        let mut copy = copy.write();
        copy.set_channel("u_input", &src, "c").unwrap();
        copy.set_render_texture("u_output", &dst).unwrap();
    }

    frame.start_frame().unwrap();
    frame.set_render_target(Some(&src)).unwrap();
    frame
        .render_images(&[DrawItem::image(ctx.fill_material(FILL_VALUE))], None)
        .unwrap();
    frame.compute_units(&[copy], &test_camera(), &[]).unwrap();
    let stats = frame.end_frame().unwrap();

    assert_eq!(stats.image_passes, 1);
    assert_eq!(stats.compute_dispatches, 1);
    assert!(stats.barriers >= 2, "expected barriers between the passes, got {}", stats.barriers);

    if backend.executes() {
        let texels = ctx.readback(dst.channel("color").unwrap().texture_id()).unwrap();
        assert_eq!(texels.len(), 16 * 16);
        assert_all_texels(&texels, FILL_VALUE);
    }
}

/// The blit of a compute result into the frame output observes the result.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_blit_sees_compute_output(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let mut frame = ctx.frame(8, 8);

    let src = RenderTexture::new(
        &ctx.device,
        RenderTextureDescriptor::new("src", 8, 8).with_color("color", TextureFormat::Rgba8Unorm),
    )
    .unwrap();
    let dst = RenderTexture::new(
        &ctx.device,
        RenderTextureDescriptor::new("dst", 8, 8)
            .with_color("color", TextureFormat::Rgba8Unorm)
            .for_compute(),
    )
    .unwrap();
    let copy = ResourceSet::new(ctx.registry.effect(COPY).unwrap()).shared();
    {
        let mut copy = copy.write();
        copy.set_render_texture("u_input", &src).unwrap();
        copy.set_render_texture("u_output", &dst).unwrap();
    }
    let mut blit = ResourceSet::new(ctx.registry.effect(builtin::BLIT).unwrap());
    blit.set_render_texture("u_texture", &dst).unwrap();
    let blit = blit.shared();

    frame.start_frame().unwrap();
    frame.set_render_target(Some(&src)).unwrap();
    frame
        .render_images(&[DrawItem::image(ctx.fill_material(FILL_VALUE))], None)
        .unwrap();
    frame.compute_units(&[copy], &test_camera(), &[]).unwrap();
    frame.set_render_target(None).unwrap();
    frame.render_images(&[DrawItem::image(blit)], None).unwrap();
    let stats = frame.end_frame().unwrap();
    assert_eq!(stats.image_passes, 2);

    if backend.executes() {
        let output = frame.output().channel(OUTPUT_CHANNEL).unwrap();
        let texels = ctx.readback(output.texture_id()).unwrap();
        assert_all_texels(&texels, FILL_VALUE);
    }
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_second_image_pass_keeps_contents(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let mut frame = ctx.frame(4, 4);

    frame.start_frame().unwrap();
    frame
        .render_images(&[DrawItem::image(ctx.fill_material(FILL_VALUE))], None)
        .unwrap();
    frame.render_images(&[], None).unwrap();
    frame.end_frame().unwrap();

    if backend.executes() {
        let output = frame.output().channel(OUTPUT_CHANNEL).unwrap();
        assert_all_texels(&ctx.readback(output.texture_id()).unwrap(), FILL_VALUE);
    }
}

/// A channel written in one frame is read in the next without being rewritten.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_previous_frame_channel_is_readable(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let mut frame = ctx.frame(8, 8);

    let history = RenderTexture::new(
        &ctx.device,
        RenderTextureDescriptor::new("history", 8, 8)
            .with_color("color", TextureFormat::Rgba8Unorm),
    )
    .unwrap();
    let resolved = storage_target(&ctx, "resolved", 8, 8);
    let copy = ResourceSet::new(ctx.registry.effect(COPY).unwrap()).shared();
    {
        let mut copy = copy.write();
        copy.set_channel("u_input", &history, "color").unwrap();
        copy.set_render_texture("u_output", &resolved).unwrap();
    }
    let mut blit = ResourceSet::new(ctx.registry.effect(builtin::BLIT).unwrap());
    blit.set_channel("u_texture", &history, "color").unwrap();
    let blit = blit.shared();

    frame.start_frame().unwrap();
    frame.set_render_target(Some(&history)).unwrap();
    frame
        .render_images(&[DrawItem::image(ctx.fill_material(FILL_VALUE))], None)
        .unwrap();
    frame.end_frame().unwrap();

    frame.start_frame().unwrap();
    frame.compute_units(&[copy], &test_camera(), &[]).unwrap();
    frame.set_render_target(None).unwrap();
    frame.render_images(&[DrawItem::image(blit)], None).unwrap();
    let stats = frame.end_frame().unwrap();
    assert_eq!(stats.frame_index, 1);
    assert_eq!(stats.compute_dispatches, 1);
    assert_eq!(stats.image_passes, 1);

    if backend.executes() {
        let resolved = resolved.channel("color").unwrap();
        assert_all_texels(&ctx.readback(resolved.texture_id()).unwrap(), FILL_VALUE);
        let output = frame.output().channel(OUTPUT_CHANNEL).unwrap();
        assert_all_texels(&ctx.readback(output.texture_id()).unwrap(), FILL_VALUE);
    }
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_raster_effect_without_host_kernel(#[case] backend: Backend) {
    let mut ctx = TestContext::new(backend);
    ctx.registry
        .build(
            "unshaded",
            EffectDescriptor::raster("unshaded", IMAGE_VS, FILL_FS)
                .with_uniform(UniformSlotDescriptor::vec4("u_value", [0.0; 4])),
        )
        .unwrap();
    let unshaded = ResourceSet::new(ctx.registry.effect("unshaded").unwrap()).shared();
    let mut frame = ctx.frame(4, 4);

    frame.start_frame().unwrap();
    let result = frame.render_images(&[DrawItem::image(unshaded)], None);
    if backend.executes() {
        assert!(
            matches!(
                result,
                Err(GraphicsError::Backend(BackendError::FeatureNotSupported(_)))
            ),
            "got {result:?}"
        );
    } else {
        result.unwrap();
    }
    frame.end_frame().unwrap();
}
