//! GPU resources.
//!
//! - [`Texture`] - GPU texture, released from its device on drop
//! - [`Mesh`] - immutable triangle mesh, uploaded lazily by backends that need it
//!
//! Both hold a strong reference to whatever they need to release themselves,
//! so they can be shared freely with [`Arc`](std::sync::Arc).

mod mesh;
mod texture;

pub use mesh::{Mesh, MeshId};
pub use texture::Texture;
