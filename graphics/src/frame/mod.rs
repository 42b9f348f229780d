//! Frame orchestration.
//!
//! [`FrameOrchestrator`] alternates between idle and an active frame. While a
//! frame is active it records, in caller order, culling, raster passes,
//! compute dispatches and full-screen image passes, inserting the barriers
//! that make each pass see the writes of the passes before it.
//!
//! Well-known uniforms (`u_world`, `u_vp`, `u_lightPos`, ...) are filled from
//! the camera, lights and target of each pass when an effect declares them.

mod orchestrator;
pub mod semantics;
mod tracker;

pub use orchestrator::{
    FrameConfig, FrameOrchestrator, FrameState, FrameStats, OUTPUT_CHANNEL, OUTPUT_TARGET_LABEL,
};
