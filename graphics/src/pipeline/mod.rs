//! Deferred ray-tracing pipeline.
//!
//! ```text
//! ┌──────────────┐  4 channels  ┌──────────────┐  storage  ┌──────────────┐
//! │ G-buffer     │ ───────────► │ rt_shade     │ ────────► │ blit         │
//! │ raster pass  │              │ compute unit │           │ image pass   │
//! └──────────────┘              └──────────────┘           └──────────────┘
//! ```
//!
//! - [`RayTracingManager`] - builds the traced scene representation and owns the compute unit
//! - [`RayTracingStage`] - explicit uninitialised/ready lifecycle around a manager
//! - [`ScreenSpaceTracer`] - manager shading the G-buffer in screen space
//! - [`DeferredRayTracing`] - the complete frame

mod deferred;
mod screen_space;

use std::fmt;
use std::str::FromStr;

pub use deferred::{DeferredRayTracing, DeferredRayTracingConfig, FrameView};
pub use screen_space::ScreenSpaceTracer;

use crate::error::{GraphicsError, Result};
use crate::materials::SharedResourceSet;
use crate::scene::DrawItem;
use crate::targets::RenderTexture;

/// Builds the acceleration data for a set of items and shades it.
pub trait RayTracingManager: Send {
    /// Build or refresh from `items` and route the unit's output to `output`.
    fn process(&mut self, items: &[DrawItem], output: &RenderTexture) -> Result<()>;

    /// Drawable producing the G-buffer pass, `None` before the first `process`.
    fn g_buffer_mesh(&self) -> Option<&DrawItem>;

    /// Compute unit to dispatch after the G-buffer pass.
    fn rt_unit(&self) -> &SharedResourceSet;

    /// Optional overlay showing the acceleration structure.
    fn bvh_debug_mesh(&self) -> Option<&DrawItem>;
}

/// When a ready manager re-processes the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RefreshPolicy {
    /// Process the first frame's items only; later frames reuse them.
    #[default]
    Once,
    /// Process the culled items of every frame.
    EveryFrame,
}

impl fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Once => "once",
            Self::EveryFrame => "every-frame",
        })
    }
}

impl FromStr for RefreshPolicy {
    type Err = GraphicsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "once" => Ok(Self::Once),
            "every-frame" | "every_frame" | "always" => Ok(Self::EveryFrame),
            other => Err(GraphicsError::InvalidParameter(format!(
                "unknown refresh policy '{other}'"
            ))),
        }
    }
}

/// A manager that is constructed on first use.
#[derive(Debug)]
pub enum RayTracingStage<M> {
    Uninitialized,
    Ready(M),
}

impl<M> Default for RayTracingStage<M> {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl<M: RayTracingManager> RayTracingStage<M> {
    pub fn new() -> Self {
        Self::Uninitialized
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Construct the manager with `init` unless it already exists.
    ///
    /// Returns the manager and whether this call created it. Calls after the
    /// first never run `init`.
    pub fn ensure_initialized(
        &mut self,
        init: impl FnOnce() -> Result<M>,
    ) -> Result<(&mut M, bool)> {
        let created = !self.is_ready();
        if created {
            *self = Self::Ready(init()?);
            log::info!("Ray tracing stage initialized");
        }
        match self {
            Self::Ready(manager) => Ok((manager, created)),
            Self::Uninitialized => Err(GraphicsError::InvalidParameter(
                "ray tracing stage failed to initialize".to_string(),
            )),
        }
    }

    pub fn get(&self) -> Option<&M> {
        match self {
            Self::Ready(manager) => Some(manager),
            Self::Uninitialized => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut M> {
        match self {
            Self::Ready(manager) => Some(manager),
            Self::Uninitialized => None,
        }
    }

    /// Drop the manager; the next `ensure_initialized` builds a new one.
    pub fn reset(&mut self) {
        *self = Self::Uninitialized;
    }
}
