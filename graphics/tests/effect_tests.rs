//! Integration tests for effects and resource sets.
//!
//! Covers schema enumeration, slot lookup errors, uniform packing, the
//! `simple_blur` family and macro variants. Tests run against every backend
//! compiled in; none of them submit work.

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{Backend, COPY, IMAGE_VS, TestContext};
use lumen_graphics::{
    EffectDescriptor, GraphicsError, RenderTexture, RenderTextureDescriptor, ResourceSet,
    SamplerDescriptor, SamplerSlotDescriptor, SlotCategory, TextureFormat, TextureSlotDescriptor,
    UniformKind, UniformSlotDescriptor, builtin,
};

const TINT: &str = "tint";

const TINT_FS: &str = r#"
@group(0) @binding(1) var u_texture: texture_2d<f32>;
@group(0) @binding(2) var u_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let coords = uv * uniforms.u_scale + uniforms.u_offset;
    return textureSample(u_texture, u_sampler, coords) * uniforms.u_color;
}
"#;

fn build_tint(ctx: &mut TestContext) {
    ctx.registry
        .build(
            TINT,
            EffectDescriptor::raster(TINT, IMAGE_VS, TINT_FS)
                .with_uniform(UniformSlotDescriptor::vec4("u_color", [1.0; 4]))
                .with_uniform(UniformSlotDescriptor::scalar("u_scale", 1.0))
                .with_uniform(UniformSlotDescriptor::vec2("u_offset", [0.0, 0.0]))
                .with_texture(TextureSlotDescriptor::new("u_texture", builtin::WHITE))
                .with_sampler(SamplerSlotDescriptor::new("u_sampler", SamplerDescriptor::linear())),
        )
        .expect("Failed to build tint effect");
}

// ============================================================================
// Schema
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_schema_enumerates_slots_in_declaration_order(#[case] backend: Backend) {
    let mut ctx = TestContext::new(backend);
    build_tint(&mut ctx);
    let effect = ctx.registry.effect(TINT).unwrap();
    let schema = effect.schema();

    let uniforms: Vec<&str> = schema.uniforms.iter().map(|slot| slot.name.as_str()).collect();
    assert_eq!(uniforms, ["u_color", "u_scale", "u_offset"]);
    assert_eq!(schema.textures.len(), 1);
    assert_eq!(schema.textures[0].name, "u_texture");
    assert_eq!(schema.samplers.len(), 1);
    assert_eq!(schema.samplers[0].name, "u_sampler");

    let set = ResourceSet::new(Arc::clone(&effect));
    assert_eq!(set.uniform("u_scale").unwrap().as_slice(), &[1.0]);
    assert!(set.texture("u_texture").is_some());
    assert_eq!(set.sampler("u_sampler"), Some(&SamplerDescriptor::linear()));
    assert!(set.is_dirty());
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_unknown_slots_report_their_category(#[case] backend: Backend) {
    let mut ctx = TestContext::new(backend);
    build_tint(&mut ctx);
    let mut set = ResourceSet::new(ctx.registry.effect(TINT).unwrap());
    let white = ctx.registry.texture(builtin::WHITE).unwrap();

    let category = |err: GraphicsError| match err {
        GraphicsError::UnknownSlot { category, .. } => category,
        other => panic!("expected UnknownSlot, got {other:?}"),
    };

    assert_eq!(category(set.set_uniform("u_missing", 1.0f32).unwrap_err()), SlotCategory::Uniform);
    assert_eq!(category(set.set_texture("u_missing", white).unwrap_err()), SlotCategory::Texture);
    assert_eq!(
        category(set.set_sampler("u_missing", SamplerDescriptor::nearest()).unwrap_err()),
        SlotCategory::Sampler
    );
    // Slot names are looked up per category.
    assert_eq!(
        category(set.set_uniform("u_texture", 1.0f32).unwrap_err()),
        SlotCategory::Uniform
    );

    let target = RenderTexture::new(
        &ctx.device,
        RenderTextureDescriptor::new("rt", 4, 4).with_color("color", TextureFormat::Rgba8Unorm),
    )
    .unwrap();
    assert_eq!(
        category(set.set_channel("u_missing", &target, "color").unwrap_err()),
        SlotCategory::Texture
    );
    assert!(matches!(
        set.set_channel("u_texture", &target, "albedo"),
        Err(GraphicsError::UnknownChannel { .. })
    ));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_uniform_shape_is_checked(#[case] backend: Backend) {
    let mut ctx = TestContext::new(backend);
    build_tint(&mut ctx);
    let mut set = ResourceSet::new(ctx.registry.effect(TINT).unwrap());
    set.mark_clean();

    assert!(matches!(
        set.set_uniform("u_color", [1.0f32, 0.0, 0.0]),
        Err(GraphicsError::TypeMismatch { .. })
    ));
    assert!(matches!(
        set.set_uniform("u_scale", [1.0f32, 2.0]),
        Err(GraphicsError::TypeMismatch { .. })
    ));
    assert!(!set.is_dirty(), "a rejected value must not mark the set dirty");

    set.set_uniform("u_offset", [0.5f32, 0.25]).unwrap();
    assert!(set.is_slot_dirty("u_offset"));
    assert!(!set.is_slot_dirty("u_color"));
    assert_eq!(set.uniform("u_offset").unwrap().as_slice(), &[0.5, 0.25]);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_identical_values_pack_identically(#[case] backend: Backend) {
    let mut ctx = TestContext::new(backend);
    build_tint(&mut ctx);
    let effect = ctx.registry.effect(TINT).unwrap();

    let mut a = ResourceSet::new(Arc::clone(&effect));
    let mut b = ResourceSet::new(effect);
    for set in [&mut a, &mut b] {
        set.set_uniform("u_color", [0.1f32, 0.2, 0.3, 0.4]).unwrap();
        set.set_uniform("u_scale", 2.0f32).unwrap();
    }
    assert_ne!(a.id(), b.id());
    assert_eq!(a.uniform_payload(), b.uniform_payload());

    b.set_uniform("u_scale", 3.0f32).unwrap();
    assert_ne!(a.uniform_payload(), b.uniform_payload());
}

// ============================================================================
// Families and variants
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_blur_family_kernel_array(#[case] backend: Backend) {
    let mut ctx = TestContext::new(backend);
    assert_eq!(builtin::kernel_size_for_radius(2).unwrap(), 28);

    let blur = ctx.registry.family(builtin::SIMPLE_BLUR, 2).unwrap();
    let kernel = &blur.schema().uniforms[0];
    assert_eq!(kernel.name, "u_kernel");
    assert_eq!(kernel.kind, UniformKind::Vec4);
    assert_eq!(kernel.array_len, Some(7));
    assert_eq!(kernel.float_count(), 28);

    let mut set = ResourceSet::new(Arc::clone(&blur));
    set.set_uniform("u_kernel", vec![1.0f32 / 25.0; 28]).unwrap();
    assert!(matches!(
        set.set_uniform("u_kernel", vec![0.0f32; 25]),
        Err(GraphicsError::TypeMismatch { .. })
    ));

    let again = ctx.registry.family(builtin::SIMPLE_BLUR, 2).unwrap();
    assert!(Arc::ptr_eq(&blur, &again));
    assert_eq!(blur.schema(), again.schema());

    let wider = ctx.registry.family(builtin::SIMPLE_BLUR, 3).unwrap();
    assert_eq!(wider.label(), "simple_blur@3");
    assert_eq!(wider.schema().uniforms[0].float_count(), 52);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_blur_family_rejects_oversized_radius(#[case] backend: Backend) {
    let mut ctx = TestContext::new(backend);
    for radius in [64, 40000, u32::MAX] {
        assert!(
            matches!(
                ctx.registry.family(builtin::SIMPLE_BLUR, radius),
                Err(GraphicsError::InvalidParameter(_))
            ),
            "radius {radius} should be rejected"
        );
    }
    assert!(ctx.registry.family(builtin::SIMPLE_BLUR, 1).is_ok());
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_macro_variants_are_cached(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let unlit = ctx.registry.effect(builtin::UNLIT).unwrap();
    let compiled_before = unlit.variant_count();

    let mut first = ResourceSet::new(Arc::clone(&unlit));
    let mut second = ResourceSet::new(Arc::clone(&unlit));
    first.mark_clean();
    first.set_macro("USE_TEXCOORD_0", true).unwrap();
    second.set_macro("USE_TEXCOORD_0", true).unwrap();

    assert!(Arc::ptr_eq(first.program(), second.program()));
    assert!(!Arc::ptr_eq(first.program(), unlit.default_program()));
    assert_eq!(unlit.variant_count(), compiled_before + 1);
    assert!(first.is_slot_dirty("u_texture"), "switching program rebinds textures");

    first.set_macro("USE_TEXCOORD_0", false).unwrap();
    assert!(Arc::ptr_eq(first.program(), unlit.default_program()));

    assert!(matches!(
        first.set_macro("USE_FOG", true),
        Err(GraphicsError::UnknownMacro { .. })
    ));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::reference(Backend::Reference)]
fn test_output_slots_start_unbound(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let copy = ResourceSet::new(ctx.registry.effect(COPY).unwrap());

    let outputs: Vec<_> = copy.output_slots().collect();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].0, "u_output");
    assert!(outputs[0].1.is_none());

    let inputs: Vec<_> = copy.input_slots().collect();
    assert_eq!(inputs.len(), 1);
    let (name, source) = inputs[0];
    assert_eq!(name, "u_input");
    assert_eq!(
        source.map(|s| s.texture_id()),
        ctx.registry.texture(builtin::BLACK).map(|t| t.id())
    );
}
