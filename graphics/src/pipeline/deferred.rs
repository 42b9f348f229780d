//! The deferred ray-tracing frame: G-buffer raster, compute shading, blit.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lumen_core::Camera;

use super::{RayTracingManager, RayTracingStage, RefreshPolicy, ScreenSpaceTracer};
use crate::effects::{EffectRegistry, builtin};
use crate::error::{GraphicsError, Result};
use crate::frame::{FrameOrchestrator, FrameStats};
use crate::materials::{ResourceSet, SharedResourceSet};
use crate::scene::{DrawItem, Scene};
use crate::targets::{RenderTexture, RenderTextureDescriptor};
use crate::types::TextureFormat;

/// What the final image pass shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameView {
    /// The shaded output.
    #[default]
    Final,
    /// The four G-buffer channels in screen quadrants.
    GBuffer,
    /// The shaded output with the acceleration bounds drawn on top.
    Bvh,
}

impl fmt::Display for FrameView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Final => "final",
            Self::GBuffer => "gbuffer",
            Self::Bvh => "bvh",
        })
    }
}

impl FromStr for FrameView {
    type Err = GraphicsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "final" => Ok(Self::Final),
            "gbuffer" | "g-buffer" => Ok(Self::GBuffer),
            "bvh" => Ok(Self::Bvh),
            other => Err(GraphicsError::InvalidParameter(format!("unknown view '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredRayTracingConfig {
    /// Size of the G-buffer and the shaded output.
    pub width: u32,
    pub height: u32,
    pub refresh: RefreshPolicy,
    pub view: FrameView,
    /// Seed of the per-frame random vector.
    pub seed: u64,
}

impl Default for DeferredRayTracingConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            refresh: RefreshPolicy::default(),
            view: FrameView::default(),
            seed: 0x5eed,
        }
    }
}

impl DeferredRayTracingConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_refresh(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_view(mut self, view: FrameView) -> Self {
        self.view = view;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Renders a scene through the G-buffer, the ray-tracing unit and a blit.
pub struct DeferredRayTracing {
    config: DeferredRayTracingConfig,
    g_buffer: RenderTexture,
    output: RenderTexture,
    blit: SharedResourceSet,
    g_buffer_show: SharedResourceSet,
    stage: RayTracingStage<ScreenSpaceTracer>,
    rng: StdRng,
}

impl DeferredRayTracing {
    /// Create the targets and image materials.
    ///
    /// The ray-tracing stage itself is built on the first frame.
    pub fn new(registry: &EffectRegistry, config: DeferredRayTracingConfig) -> Result<Self> {
        let device = registry.device();
        let mut g_buffer = RenderTextureDescriptor::new("g_buffer", config.width, config.height);
        for channel in builtin::GBUFFER_CHANNELS {
            g_buffer = g_buffer.with_color(channel, TextureFormat::Rgba16Float);
        }
        let g_buffer = RenderTexture::new(device, g_buffer.with_depth_stencil(false))?;

        let output = RenderTexture::new(
            device,
            RenderTextureDescriptor::new("rt_output", config.width, config.height)
                .with_color("color", TextureFormat::Rgba8Unorm)
                .for_compute(),
        )?;

        let mut blit = ResourceSet::new(registry.effect(builtin::BLIT)?);
        blit.set_channel("u_texture", &output, "color")?;

        let mut g_buffer_show = ResourceSet::new(registry.effect(builtin::GBUFFER_SHOW)?);
        for channel in builtin::GBUFFER_CHANNELS {
            g_buffer_show.set_channel(&format!("u_{channel}"), &g_buffer, channel)?;
        }

        log::info!(
            "Deferred ray tracing at {}x{}, refresh {}, view {}",
            config.width,
            config.height,
            config.refresh,
            config.view
        );
        Ok(Self {
            g_buffer,
            output,
            blit: blit.shared(),
            g_buffer_show: g_buffer_show.shared(),
            stage: RayTracingStage::new(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
        })
    }

    pub fn config(&self) -> &DeferredRayTracingConfig {
        &self.config
    }

    pub fn set_view(&mut self, view: FrameView) {
        self.config.view = view;
    }

    pub fn g_buffer(&self) -> &RenderTexture {
        &self.g_buffer
    }

    /// Target the ray-tracing unit writes.
    pub fn output(&self) -> &RenderTexture {
        &self.output
    }

    pub fn stage(&self) -> &RayTracingStage<ScreenSpaceTracer> {
        &self.stage
    }

    /// Record and submit one frame.
    ///
    /// If recording fails, the frame is still ended so the orchestrator is
    /// idle again and the error is returned.
    pub fn render_frame(
        &mut self,
        frame: &mut FrameOrchestrator,
        registry: &EffectRegistry,
        scene: &Scene,
        camera: &Camera,
    ) -> Result<FrameStats> {
        frame.start_frame()?;
        if let Err(err) = self.record(frame, registry, scene, camera) {
            if let Err(end_err) = frame.end_frame() {
                log::warn!("Ending failed frame also failed: {end_err}");
            }
            return Err(err);
        }
        frame.end_frame()
    }

    fn record(
        &mut self,
        frame: &mut FrameOrchestrator,
        registry: &EffectRegistry,
        scene: &Scene,
        camera: &Camera,
    ) -> Result<()> {
        let items = frame.cull_camera(scene, camera)?;

        let (tracer, created) = self.stage.ensure_initialized(|| ScreenSpaceTracer::new(registry))?;
        if created || self.config.refresh == RefreshPolicy::EveryFrame {
            tracer.process(&items, &self.output)?;
            let mut unit = tracer.rt_unit().write();
            for channel in builtin::GBUFFER_CHANNELS {
                unit.set_channel(&format!("u_{channel}"), &self.g_buffer, channel)?;
            }
        }

        let seed: [f32; 4] = std::array::from_fn(|_| self.rng.gen::<f32>());
        tracer.rt_unit().write().set_uniform("u_randomSeed", seed)?;

        // Cleared channels read as "no surface" in the shading pass.
        let g_buffer_camera = camera.clone().with_clear_color([0.0; 4]);
        frame.set_render_target(Some(&self.g_buffer))?;
        let g_buffer_items: Vec<DrawItem> = tracer.g_buffer_mesh().cloned().into_iter().collect();
        frame.render_camera(&g_buffer_camera, &g_buffer_items)?;

        frame.compute_units(std::slice::from_ref(tracer.rt_unit()), camera, &scene.lights)?;

        frame.set_render_target(None)?;
        match self.config.view {
            FrameView::Final => frame.render_images(&[DrawItem::image(self.blit.clone())], None)?,
            FrameView::GBuffer => {
                frame.render_images(&[DrawItem::image(self.g_buffer_show.clone())], None)?
            }
            FrameView::Bvh => {
                let mut images = vec![DrawItem::image(self.blit.clone())];
                images.extend(tracer.bvh_debug_mesh().cloned());
                frame.render_images(&images, Some(camera))?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for DeferredRayTracing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredRayTracing")
            .field("config", &self.config)
            .field("stage_ready", &self.stage.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_view_parse() {
        assert_eq!("GBuffer".parse::<FrameView>().unwrap(), FrameView::GBuffer);
        assert_eq!("bvh".parse::<FrameView>().unwrap(), FrameView::Bvh);
        assert!("depth".parse::<FrameView>().is_err());
        assert_eq!(FrameView::default().to_string(), "final");
    }

    #[test]
    fn test_config_builder() {
        let config = DeferredRayTracingConfig::new(32, 16)
            .with_refresh(RefreshPolicy::EveryFrame)
            .with_view(FrameView::Bvh)
            .with_seed(7);
        assert_eq!((config.width, config.height), (32, 16));
        assert_eq!(config.refresh, RefreshPolicy::EveryFrame);
        assert_eq!(config.seed, 7);
    }
}
