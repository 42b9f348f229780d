use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use lumen_core::Camera;
use lumen_graphics::{
    BackendType, DeviceParameters, DrawItem, EffectRegistry, FrameConfig, FrameOrchestrator,
    GraphicsDevice, ResourceSet, builtin,
};

fn registry() -> EffectRegistry {
    let device =
        GraphicsDevice::new(DeviceParameters::new().with_backend(BackendType::Dummy)).unwrap();
    let mut registry = EffectRegistry::new(device);
    builtin::register_builtin_textures(&mut registry).unwrap();
    builtin::register_builtin_effects(&mut registry).unwrap();
    registry
}

// ---------------------------------------------------------------------------
// Resource sets
// ---------------------------------------------------------------------------

fn bench_set_uniform(c: &mut Criterion) {
    let registry = registry();
    let mut set = ResourceSet::new(registry.effect(builtin::RT_SHADE).unwrap());

    c.bench_function("resource_set_set_uniform_vec4", |b| {
        b.iter(|| {
            set.set_uniform("u_randomSeed", black_box([0.1f32, 0.2, 0.3, 0.4])).unwrap();
        });
    });
}

fn bench_uniform_payload(c: &mut Criterion) {
    let registry = registry();
    let set = ResourceSet::new(registry.effect(builtin::RT_SHADE).unwrap());

    c.bench_function("resource_set_uniform_payload_rt_shade", |b| {
        b.iter(|| black_box(set.uniform_payload()));
    });
}

fn bench_blur_kernel_payload(c: &mut Criterion) {
    let mut registry = registry();
    let mut set = ResourceSet::new(registry.family(builtin::SIMPLE_BLUR, 4).unwrap());
    let weights = builtin::kernel_size_for_radius(4).unwrap() as usize;
    set.set_uniform("u_kernel", vec![1.0f32 / weights as f32; weights]).unwrap();

    c.bench_function("resource_set_uniform_payload_blur_r4", |b| {
        b.iter(|| black_box(set.uniform_payload()));
    });
}

// ---------------------------------------------------------------------------
// Frame orchestration
// ---------------------------------------------------------------------------

fn bench_image_frame(c: &mut Criterion) {
    let registry = registry();
    let mut frame =
        FrameOrchestrator::new(Arc::clone(registry.device()), FrameConfig::new(256, 256)).unwrap();
    let blit = ResourceSet::new(registry.effect(builtin::BLIT).unwrap()).shared();
    let items = [DrawItem::image(blit)];
    let camera = Camera::perspective(1.0, 1.0, 0.1, 100.0);

    c.bench_function("frame_dummy_single_image_pass", |b| {
        b.iter(|| {
            frame.start_frame().unwrap();
            frame.render_images(&items, Some(&camera)).unwrap();
            black_box(frame.end_frame().unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_set_uniform,
    bench_uniform_payload,
    bench_blur_kernel_payload,
    bench_image_frame,
);

criterion_main!(benches);
