//! # Ray Tracing Demo
//!
//! Renders a few frames of the deferred ray-tracing pipeline headlessly:
//! - G-buffer raster pass of a cube row on a ground plane
//! - Screen-space shading compute unit, built on the first frame
//! - Blit (or a debug view) into the frame output
//!
//! Frame statistics are logged; on the reference backend the average colour
//! of the output is logged as well.
//!
//! ```bash
//! cargo run --bin ray_tracing_demo -- --frames 4 --view gbuffer
//! RUST_LOG=debug cargo run --bin ray_tracing_demo -- --refresh every-frame
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use lumen_demos::{average_color, build_demo_scene, demo_camera};
use lumen_graphics::frame::OUTPUT_CHANNEL;
use lumen_graphics::{
    BackendType, DeferredRayTracing, DeferredRayTracingConfig, DeviceParameters, EffectRegistry,
    FrameConfig, FrameOrchestrator, FrameView, GraphicsDevice, ReferenceBackend, RefreshPolicy,
    builtin,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Backend selection for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliBackend {
    /// CPU reference executor; output can be inspected.
    #[default]
    Reference,
    /// Headless wgpu device (needs the `wgpu` feature).
    Wgpu,
    /// No-op backend.
    Dummy,
}

impl From<CliBackend> for BackendType {
    fn from(cli: CliBackend) -> Self {
        match cli {
            CliBackend::Reference => BackendType::Reference,
            CliBackend::Wgpu => BackendType::Wgpu,
            CliBackend::Dummy => BackendType::Dummy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliRefresh {
    /// Rebuild the ray-tracing data on the first frame only.
    #[default]
    Once,
    /// Rebuild it every frame.
    EveryFrame,
}

impl From<CliRefresh> for RefreshPolicy {
    fn from(cli: CliRefresh) -> Self {
        match cli {
            CliRefresh::Once => RefreshPolicy::Once,
            CliRefresh::EveryFrame => RefreshPolicy::EveryFrame,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliView {
    #[default]
    Final,
    Gbuffer,
    Bvh,
}

impl From<CliView> for FrameView {
    fn from(cli: CliView) -> Self {
        match cli {
            CliView::Final => FrameView::Final,
            CliView::Gbuffer => FrameView::GBuffer,
            CliView::Bvh => FrameView::Bvh,
        }
    }
}

/// Headless deferred ray-tracing demo.
#[derive(Parser, Debug)]
#[command(name = "ray_tracing_demo", about = "Render frames of the deferred ray-tracing pipeline")]
struct Args {
    /// Output width in pixels.
    #[arg(long, default_value_t = 320)]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value_t = 180)]
    height: u32,

    /// Number of frames to render.
    #[arg(long, default_value_t = 3)]
    frames: u32,

    #[arg(long, value_enum, default_value_t = CliBackend::Reference)]
    backend: CliBackend,

    /// When the ray-tracing data is rebuilt.
    #[arg(long, value_enum, default_value_t = CliRefresh::Once)]
    refresh: CliRefresh,

    /// What the final image pass shows.
    #[arg(long, value_enum, default_value_t = CliView::Final)]
    view: CliView,

    /// Number of cubes in the scene.
    #[arg(long, default_value_t = 5)]
    cubes: usize,

    /// Seed for scene generation and the per-frame random vector.
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

fn run(args: &Args) -> lumen_graphics::Result<()> {
    let backend = BackendType::from(args.backend);
    let device = GraphicsDevice::new(DeviceParameters::new().with_backend(backend))?;
    let mut registry = EffectRegistry::new(Arc::clone(&device));
    builtin::register_builtin_textures(&mut registry)?;
    builtin::register_builtin_effects(&mut registry)?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let scene = build_demo_scene(&registry, args.cubes, &mut rng)?;
    let camera = demo_camera(args.width as f32 / args.height.max(1) as f32);

    let mut frame =
        FrameOrchestrator::new(Arc::clone(&device), FrameConfig::new(args.width, args.height))?;
    let config = DeferredRayTracingConfig::new(args.width, args.height)
        .with_refresh(args.refresh.into())
        .with_view(args.view.into())
        .with_seed(args.seed);
    let mut deferred = DeferredRayTracing::new(&registry, config)?;

    for _ in 0..args.frames {
        let stats = deferred.render_frame(&mut frame, &registry, &scene, &camera)?;
        log::info!(
            "Frame {}: {} raster, {} compute, {} image pass(es), {} draw(s), {} barrier(s)",
            stats.frame_index,
            stats.raster_passes,
            stats.compute_dispatches,
            stats.image_passes,
            stats.draw_calls,
            stats.barriers
        );
    }

    if let Some(tracer) = deferred.stage().get() {
        log::info!("Ray-tracing data built {} time(s)", tracer.process_count());
    }

    let output = frame.output().channel(OUTPUT_CHANNEL)?.texture_id();
    let texels = device
        .with_backend::<ReferenceBackend, _>(|reference| reference.readback(output))
        .flatten();
    match texels.as_deref().and_then(average_color) {
        Some(color) => log::info!(
            "Average output colour: [{:.3}, {:.3}, {:.3}, {:.3}]",
            color[0],
            color[1],
            color[2],
            color[3]
        ),
        None => log::info!("Backend '{backend}' does not expose output texels"),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    log::info!("Lumen demos v{}", lumen_demos::VERSION);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("Demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}
