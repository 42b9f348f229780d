//! # Lumen Core
//!
//! GPU-independent building blocks shared by the renderer: math aliases,
//! bounding volumes, cameras, lights and CPU mesh data.

pub mod bounds;
pub mod camera;
pub mod light;
pub mod math;
pub mod mesh;
pub mod transform;

pub use bounds::{Aabb, Frustum, Plane};
pub use camera::{Camera, Projection};
pub use light::{Light, LightKind};
pub use mesh::{CpuMesh, Vertex};
pub use transform::Transform;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
