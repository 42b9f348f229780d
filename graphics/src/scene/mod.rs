//! Scene graph and the draw items culling produces.
//!
//! The scene is a collaborator of the frame orchestrator: it only needs to
//! answer "what is visible from this camera" as an ordered list of
//! [`DrawItem`]s.

mod draw_item;
mod graph;

pub use draw_item::DrawItem;
pub use graph::{Drawable, Scene, SceneNode};
