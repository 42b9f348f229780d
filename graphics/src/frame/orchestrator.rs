//! Per-frame sequencing of raster passes, compute dispatches and image passes.

use std::collections::HashSet;
use std::sync::Arc;

use lumen_core::{Camera, Light};

use super::semantics::{self, SemanticInputs};
use super::tracker::{PassUsage, ResourceTracker};
use crate::backend::{
    ColorAttachment, ComputeDispatch, DepthAttachment, DrawCall, GpuTextureId, RasterPass,
    TextureAccessMode,
};
use crate::device::GraphicsDevice;
use crate::effects::EffectKind;
use crate::error::{GraphicsError, Result};
use crate::materials::{ResourceSet, SharedResourceSet};
use crate::scene::{DrawItem, Scene};
use crate::targets::{RenderTexture, RenderTextureDescriptor, TargetAttachments};
use crate::types::{ClearValue, LoadOp, TextureFormat};

/// Label of the output target owned by the orchestrator.
pub const OUTPUT_TARGET_LABEL: &str = "output";

/// Name of the output target's colour channel.
pub const OUTPUT_CHANNEL: &str = "color";

/// Size and format of the output target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    pub output_width: u32,
    pub output_height: u32,
    pub output_format: TextureFormat,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            output_width: 1280,
            output_height: 720,
            output_format: TextureFormat::Rgba8Unorm,
        }
    }
}

impl FrameConfig {
    pub fn new(output_width: u32, output_height: u32) -> Self {
        Self {
            output_width,
            output_height,
            ..Self::default()
        }
    }

    pub fn with_output_format(mut self, format: TextureFormat) -> Self {
        self.output_format = format;
        self
    }
}

/// Lifecycle state of a [`FrameOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Active { frame: u64 },
}

/// Work recorded during one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame_index: u64,
    pub raster_passes: u32,
    pub compute_dispatches: u32,
    pub image_passes: u32,
    pub draw_calls: u32,
    pub barriers: u32,
}

/// Drives the frame state machine and records passes against the device.
///
/// Writes made by a pass are visible to every later pass of the frame: the
/// orchestrator tracks texture accesses and issues the barriers the backend
/// needs before each pass.
///
/// # Example
///
/// ```ignore
/// orchestrator.start_frame()?;
/// let items = orchestrator.cull_camera(&scene, &camera)?;
/// orchestrator.set_render_target(Some(&g_buffer))?;
/// orchestrator.render_camera(&camera, &items)?;
/// orchestrator.compute_units(&[unit], &camera, &scene.lights)?;
/// orchestrator.set_render_target(None)?;
/// orchestrator.render_images(&[DrawItem::image(blit)], None)?;
/// let stats = orchestrator.end_frame()?;
/// ```
pub struct FrameOrchestrator {
    device: Arc<GraphicsDevice>,
    config: FrameConfig,
    output: RenderTexture,
    state: FrameState,
    frame_count: u64,
    /// Bound target; `None` selects the output.
    target: Option<TargetAttachments>,
    tracker: ResourceTracker,
    written: HashSet<GpuTextureId>,
    stats: FrameStats,
}

/// A recorded draw plus the set it came from, cleaned after submission.
type PreparedDraws = (Vec<DrawCall>, Vec<SharedResourceSet>, PassUsage);

impl FrameOrchestrator {
    /// Create an orchestrator and its output target.
    pub fn new(device: Arc<GraphicsDevice>, config: FrameConfig) -> Result<Self> {
        let output = RenderTexture::new(
            &device,
            RenderTextureDescriptor::new(
                OUTPUT_TARGET_LABEL,
                config.output_width,
                config.output_height,
            )
                .with_color(OUTPUT_CHANNEL, config.output_format)
                .with_depth_stencil(false),
        )?;
        log::info!(
            "Frame orchestrator ready: output {}x{} {}",
            config.output_width,
            config.output_height,
            config.output_format
        );
        Ok(Self {
            device,
            config,
            output,
            state: FrameState::Idle,
            frame_count: 0,
            target: None,
            tracker: ResourceTracker::new(),
            written: HashSet::new(),
            stats: FrameStats::default(),
        })
    }

    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// The output target `set_render_target(None)` selects.
    pub fn output(&self) -> &RenderTexture {
        &self.output
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn is_frame_active(&self) -> bool {
        matches!(self.state, FrameState::Active { .. })
    }

    /// Number of frames started so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn require_active(&self, operation: &str) -> Result<u64> {
        match self.state {
            FrameState::Active { frame } => Ok(frame),
            FrameState::Idle => Err(GraphicsError::InvalidFrameState(format!(
                "{operation} called outside of a frame"
            ))),
        }
    }

    pub fn start_frame(&mut self) -> Result<()> {
        if let FrameState::Active { frame } = self.state {
            return Err(GraphicsError::InvalidFrameState(format!(
                "frame {frame} already started"
            )));
        }
        let frame = self.frame_count;
        let device = Arc::clone(&self.device);
        self.tracker.retain_alive(|id| device.is_texture_alive(id));
        self.device.backend().begin_frame(frame)?;

        self.frame_count += 1;
        self.state = FrameState::Active { frame };
        self.target = None;
        self.written.clear();
        self.stats = FrameStats {
            frame_index: frame,
            ..FrameStats::default()
        };
        log::trace!("Frame {frame} started");
        Ok(())
    }

    /// Submit the frame and return to idle.
    pub fn end_frame(&mut self) -> Result<FrameStats> {
        let frame = self.require_active("end_frame")?;
        self.state = FrameState::Idle;
        self.target = None;
        self.device.backend().end_frame()?;
        log::trace!("Frame {frame} ended: {:?}", self.stats);
        Ok(self.stats)
    }

    /// Items of `scene` visible from `camera`, valid for the rest of the frame.
    pub fn cull_camera(&self, scene: &Scene, camera: &Camera) -> Result<Vec<DrawItem>> {
        self.require_active("cull_camera")?;
        Ok(scene.cull(camera))
    }

    /// Bind the target of subsequent raster and image passes; `None` selects the output.
    pub fn set_render_target(&mut self, target: Option<&RenderTexture>) -> Result<()> {
        self.require_active("set_render_target")?;
        self.target = target.map(RenderTexture::attachments);
        log::debug!(
            "Render target set to '{}'",
            target.map_or(OUTPUT_TARGET_LABEL, RenderTexture::label)
        );
        Ok(())
    }

    fn current_target(&self) -> Result<TargetAttachments> {
        let target = self.target.clone().unwrap_or_else(|| self.output.attachments());
        if !target.is_alive() {
            return Err(GraphicsError::InvalidBinding(format!(
                "render target '{}' has been destroyed",
                target.label
            )));
        }
        Ok(target)
    }

    /// Render `items` into the bound target, clearing it to the camera's clear colour.
    pub fn render_camera(&mut self, camera: &Camera, items: &[DrawItem]) -> Result<()> {
        self.require_active("render_camera")?;
        let target = self.current_target()?;
        let (draws, sets, mut usage) = self.prepare_draws(&target, items, Some(camera))?;

        let clear = LoadOp::Clear(ClearValue::from_rgba(camera.clear_color));
        let pass = RasterPass {
            label: format!("camera '{}' -> {}", camera.name, target.label),
            width: target.width,
            height: target.height,
            colors: color_attachments(&target, clear, &mut usage),
            depth: target.depth.map(|depth| {
                usage.add(depth.texture, TextureAccessMode::DepthStencilWrite);
                DepthAttachment {
                    texture: depth.texture,
                    format: depth.format,
                    load: LoadOp::Clear(ClearValue::depth(1.0)),
                }
            }),
            draws,
        };

        self.submit_pass(pass, &usage, &sets)?;
        self.stats.raster_passes += 1;
        Ok(())
    }

    /// Render full-screen items into the bound target.
    ///
    /// The target keeps its contents when it was already written this frame,
    /// otherwise it starts from opaque black.
    pub fn render_images(&mut self, items: &[DrawItem], camera: Option<&Camera>) -> Result<()> {
        self.require_active("render_images")?;
        let target = self.current_target()?;
        let (draws, sets, mut usage) = self.prepare_draws(&target, items, camera)?;

        let load = if target.colors.iter().any(|c| self.written.contains(&c.texture)) {
            LoadOp::Load
        } else {
            LoadOp::Clear(ClearValue::color(0.0, 0.0, 0.0, 1.0))
        };
        log::debug!("Image pass on '{}' uses {:?}", target.label, load);

        let pass = RasterPass {
            label: format!("images -> {}", target.label),
            width: target.width,
            height: target.height,
            colors: color_attachments(&target, load, &mut usage),
            depth: None,
            draws,
        };

        self.submit_pass(pass, &usage, &sets)?;
        self.stats.image_passes += 1;
        Ok(())
    }

    fn prepare_draws(
        &self,
        target: &TargetAttachments,
        items: &[DrawItem],
        camera: Option<&Camera>,
    ) -> Result<PreparedDraws> {
        let mut draws = Vec::with_capacity(items.len());
        let mut sets: Vec<SharedResourceSet> = Vec::new();
        let mut usage = PassUsage::new();

        for item in items {
            let mut set = item.material.write();
            check_kind(&set, EffectKind::Raster)?;

            let outputs = set.program().reflection().color_outputs as usize;
            if outputs > target.colors.len() {
                return Err(GraphicsError::InvalidBinding(format!(
                    "effect '{}' writes {outputs} colour output(s) but target '{}' has {}",
                    set.effect().label(),
                    target.label,
                    target.colors.len()
                )));
            }
            for (slot, source) in set.input_slots() {
                let Some(source) = source else { continue };
                if !source.is_alive() {
                    return Err(GraphicsError::InvalidBinding(format!(
                        "slot '{slot}' of '{}' is bound to {} whose target has been destroyed",
                        set.effect().label(),
                        source.describe()
                    )));
                }
                if target.contains(source.texture_id()) {
                    return Err(GraphicsError::InvalidBinding(format!(
                        "slot '{slot}' of '{}' samples {} while it is being rendered to",
                        set.effect().label(),
                        source.describe()
                    )));
                }
                usage.read(source.texture_id());
            }

            semantics::apply(
                &mut set,
                &SemanticInputs {
                    world: (!item.is_image()).then_some(&item.world),
                    camera,
                    lights: &[],
                    screen_size: (target.width, target.height),
                },
            );
            draws.push(DrawCall {
                program: Arc::clone(set.program()),
                geometry: item.geometry.clone(),
                bindings: set.bindings(),
            });
            if !sets.iter().any(|s| Arc::ptr_eq(s, &item.material)) {
                sets.push(Arc::clone(&item.material));
            }
        }
        Ok((draws, sets, usage))
    }

    fn submit_pass(
        &mut self,
        pass: RasterPass,
        usage: &PassUsage,
        sets: &[SharedResourceSet],
    ) -> Result<()> {
        let barriers = self.tracker.transition(usage);
        {
            let mut backend = self.device.backend();
            if !barriers.is_empty() {
                log::debug!("{} barrier(s) before pass '{}'", barriers.len(), pass.label);
                backend.texture_barriers(&barriers);
            }
            backend.render_pass(&pass)?;
        }
        self.stats.barriers += barriers.len() as u32;
        self.stats.draw_calls += pass.draws.len() as u32;
        self.written.extend(usage.writes());
        for set in sets {
            set.write().mark_clean();
        }
        Ok(())
    }

    /// Dispatch each unit over a grid covering its output.
    ///
    /// Every unit is validated before any is dispatched: it must wrap a
    /// compute effect, bind every output slot to a live channel of a target
    /// created for compute, and not read a texture it writes.
    pub fn compute_units(
        &mut self,
        units: &[SharedResourceSet],
        camera: &Camera,
        lights: &[Light],
    ) -> Result<()> {
        self.require_active("compute_units")?;
        let extents = units
            .iter()
            .map(|unit| validate_unit(&unit.read()))
            .collect::<Result<Vec<_>>>()?;

        for (unit, extent) in units.iter().zip(extents) {
            let dispatch = {
                let mut set = unit.write();
                semantics::apply(
                    &mut set,
                    &SemanticInputs {
                        world: None,
                        camera: Some(camera),
                        lights,
                        screen_size: extent,
                    },
                );
                let program = Arc::clone(set.program());
                let [wx, wy, _] = program.reflection().workgroup_size;
                ComputeDispatch {
                    label: set.effect().label().to_string(),
                    workgroups: [extent.0.div_ceil(wx.max(1)), extent.1.div_ceil(wy.max(1)), 1],
                    bindings: set.bindings(),
                    program,
                    extent,
                }
            };

            let mut usage = PassUsage::new();
            for bound in &dispatch.bindings.textures {
                let access = if bound.storage {
                    TextureAccessMode::StorageWrite
                } else {
                    TextureAccessMode::ShaderRead
                };
                usage.add(bound.texture, access);
            }
            let barriers = self.tracker.transition(&usage);
            {
                let mut backend = self.device.backend();
                if !barriers.is_empty() {
                    log::debug!(
                        "{} barrier(s) before dispatch '{}'",
                        barriers.len(),
                        dispatch.label
                    );
                    backend.texture_barriers(&barriers);
                }
                backend.dispatch(&dispatch)?;
            }
            log::trace!(
                "Dispatched '{}' with {:?} workgroups",
                dispatch.label,
                dispatch.workgroups
            );

            self.stats.barriers += barriers.len() as u32;
            self.stats.compute_dispatches += 1;
            self.written.extend(usage.writes());
            unit.write().mark_clean();
        }
        Ok(())
    }
}

impl std::fmt::Debug for FrameOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameOrchestrator")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("tracked_textures", &self.tracker.len())
            .finish()
    }
}

fn color_attachments(
    target: &TargetAttachments,
    load: LoadOp,
    usage: &mut PassUsage,
) -> Vec<ColorAttachment> {
    target
        .colors
        .iter()
        .map(|color| {
            usage.add(color.texture, TextureAccessMode::RenderTargetWrite);
            ColorAttachment {
                channel: color.channel.clone(),
                texture: color.texture,
                format: color.format,
                load,
            }
        })
        .collect()
}

fn check_kind(set: &ResourceSet, expected: EffectKind) -> Result<()> {
    if set.kind() == expected {
        return Ok(());
    }
    Err(GraphicsError::InvalidBinding(format!(
        "effect '{}' is a {:?} effect, expected {:?}",
        set.effect().label(),
        set.kind(),
        expected
    )))
}

/// Check a compute unit and return the extent of its output.
fn validate_unit(set: &ResourceSet) -> Result<(u32, u32)> {
    check_kind(set, EffectKind::Compute)?;
    let label = set.effect().label();
    let invalid = |message: String| {
        GraphicsError::InvalidBinding(format!("compute unit '{label}': {message}"))
    };

    let mut extent = None;
    let mut written = HashSet::new();
    for (slot, source) in set.output_slots() {
        let source = source.ok_or_else(|| invalid(format!("output slot '{slot}' is not bound")))?;
        if !source.is_storage() {
            return Err(invalid(format!(
                "output slot '{slot}' is bound to {}, which is not storage-capable",
                source.describe()
            )));
        }
        if !source.is_alive() {
            return Err(invalid(format!("output slot '{slot}' is bound to a destroyed target")));
        }
        written.insert(source.texture_id());
        let size = source.size();
        match extent {
            None => extent = Some(size),
            Some(first) if first != size => {
                return Err(invalid(format!(
                    "output slot '{slot}' is {}x{}, other outputs are {}x{}",
                    size.0, size.1, first.0, first.1
                )));
            }
            Some(_) => {}
        }
    }
    for (slot, source) in set.input_slots() {
        let Some(source) = source else { continue };
        if !source.is_alive() {
            return Err(invalid(format!("input slot '{slot}' is bound to a destroyed target")));
        }
        if written.contains(&source.texture_id()) {
            return Err(invalid(format!(
                "slot '{slot}' reads {} which the unit also writes",
                source.describe()
            )));
        }
    }
    extent.ok_or_else(|| invalid("no output slot".to_string()))
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::{BackendType, DummyBackend};
    use crate::device::DeviceParameters;
    use crate::effects::{EffectRegistry, builtin};

    fn setup() -> (EffectRegistry, FrameOrchestrator) {
        let device =
            GraphicsDevice::new(DeviceParameters::new().with_backend(BackendType::Dummy)).unwrap();
        let mut registry = EffectRegistry::new(Arc::clone(&device));
        builtin::register_builtin_textures(&mut registry).unwrap();
        builtin::register_builtin_effects(&mut registry).unwrap();
        let orchestrator = FrameOrchestrator::new(device, FrameConfig::new(8, 8)).unwrap();
        (registry, orchestrator)
    }

    #[test]
    fn test_frame_state_alternates() {
        let (_registry, mut frame) = setup();
        assert!(matches!(frame.end_frame(), Err(GraphicsError::InvalidFrameState(_))));
        frame.start_frame().unwrap();
        assert_eq!(frame.state(), FrameState::Active { frame: 0 });
        assert!(matches!(frame.start_frame(), Err(GraphicsError::InvalidFrameState(_))));
        let stats = frame.end_frame().unwrap();
        assert_eq!(stats.frame_index, 0);
        assert_eq!(frame.state(), FrameState::Idle);
        frame.start_frame().unwrap();
        assert_eq!(frame.state(), FrameState::Active { frame: 1 });
    }

    #[test]
    fn test_passes_rejected_while_idle() {
        let (_registry, mut frame) = setup();
        let camera = Camera::perspective(1.0, 1.0, 0.1, 10.0);
        assert!(matches!(
            frame.render_camera(&camera, &[]),
            Err(GraphicsError::InvalidFrameState(_))
        ));
        assert!(matches!(
            frame.set_render_target(None),
            Err(GraphicsError::InvalidFrameState(_))
        ));
    }

    #[test]
    fn test_unbound_output_fails_before_any_dispatch() {
        let (mut registry, mut frame) = setup();
        let output = RenderTexture::new(
            frame.device(),
            RenderTextureDescriptor::new("out", 8, 8)
                .with_color("color", TextureFormat::Rgba8Unorm)
                .for_compute(),
        )
        .unwrap();
        let bound = ResourceSet::new(registry.family(builtin::SIMPLE_BLUR, 1).unwrap()).shared();
        bound.write().set_channel("u_output", &output, "color").unwrap();
        let unbound = ResourceSet::new(registry.family(builtin::SIMPLE_BLUR, 1).unwrap()).shared();

        frame.start_frame().unwrap();
        let camera = Camera::perspective(1.0, 1.0, 0.1, 10.0);
        let err = frame.compute_units(&[bound, unbound], &camera, &[]).unwrap_err();
        assert!(matches!(err, GraphicsError::InvalidBinding(_)));
        let stats = frame.end_frame().unwrap();
        assert_eq!(stats.compute_dispatches, 0);
        let dispatched =
            frame.device().with_backend(|b: &mut DummyBackend| b.counters().dispatches);
        assert_eq!(dispatched, Some(0));
    }

    #[test]
    fn test_non_storage_output_rejected() {
        let (mut registry, mut frame) = setup();
        let plain = RenderTexture::new(
            frame.device(),
            RenderTextureDescriptor::new("plain", 8, 8)
                .with_color("color", TextureFormat::Rgba8Unorm),
        )
        .unwrap();
        let unit = ResourceSet::new(registry.family(builtin::SIMPLE_BLUR, 1).unwrap()).shared();
        unit.write().set_channel("u_output", &plain, "color").unwrap();

        frame.start_frame().unwrap();
        let camera = Camera::perspective(1.0, 1.0, 0.1, 10.0);
        assert!(matches!(
            frame.compute_units(&[unit], &camera, &[]),
            Err(GraphicsError::InvalidBinding(_))
        ));
    }

    #[test]
    fn test_raster_effect_rejected_as_compute_unit() {
        let (registry, mut frame) = setup();
        let material = ResourceSet::new(registry.effect(builtin::BLIT).unwrap()).shared();
        frame.start_frame().unwrap();
        let camera = Camera::perspective(1.0, 1.0, 0.1, 10.0);
        assert!(matches!(
            frame.compute_units(&[material], &camera, &[]),
            Err(GraphicsError::InvalidBinding(_))
        ));
    }

    #[test]
    fn test_sampling_bound_target_is_feedback_loop() {
        let (registry, mut frame) = setup();
        let target = RenderTexture::new(
            frame.device(),
            RenderTextureDescriptor::new("rt", 8, 8).with_color("color", TextureFormat::Rgba8Unorm),
        )
        .unwrap();
        let blit = ResourceSet::new(registry.effect(builtin::BLIT).unwrap()).shared();
        blit.write().set_channel("u_texture", &target, "color").unwrap();

        frame.start_frame().unwrap();
        frame.set_render_target(Some(&target)).unwrap();
        assert!(matches!(
            frame.render_images(&[DrawItem::image(blit)], None),
            Err(GraphicsError::InvalidBinding(_))
        ));
    }

    #[test]
    fn test_stats_count_work() {
        let (registry, mut frame) = setup();
        let blit = ResourceSet::new(registry.effect(builtin::BLIT).unwrap()).shared();
        frame.start_frame().unwrap();
        frame.render_images(&[DrawItem::image(Arc::clone(&blit))], None).unwrap();
        frame.render_images(&[DrawItem::image(blit)], None).unwrap();
        let stats = frame.end_frame().unwrap();
        assert_eq!(stats.image_passes, 2);
        assert_eq!(stats.draw_calls, 2);
        // First use of the black default and the output, then write-after-write on the output.
        assert_eq!(stats.barriers, 3);
    }

    #[test]
    fn test_destroyed_target_rejected() {
        let (_registry, mut frame) = setup();
        let target = RenderTexture::new(
            frame.device(),
            RenderTextureDescriptor::new("rt", 8, 8).with_color("color", TextureFormat::Rgba8Unorm),
        )
        .unwrap();
        frame.start_frame().unwrap();
        frame.set_render_target(Some(&target)).unwrap();
        target.destroy();
        let camera = Camera::perspective(1.0, 1.0, 0.1, 10.0);
        assert!(matches!(
            frame.render_camera(&camera, &[]),
            Err(GraphicsError::InvalidBinding(_))
        ));
    }
}
