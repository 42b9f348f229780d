//! Drawable items handed to raster and image passes.

use std::sync::Arc;

use lumen_core::math::Mat4;

use crate::backend::DrawGeometry;
use crate::materials::SharedResourceSet;
use crate::resources::Mesh;

/// One draw: geometry, the resource set to shade it with and its world transform.
#[derive(Debug, Clone)]
pub struct DrawItem {
    pub geometry: DrawGeometry,
    pub material: SharedResourceSet,
    pub world: Mat4,
}

impl DrawItem {
    pub fn mesh(mesh: Arc<Mesh>, material: SharedResourceSet, world: Mat4) -> Self {
        Self {
            geometry: DrawGeometry::Mesh(mesh),
            material,
            world,
        }
    }

    /// A full-screen quad shaded by `material`.
    pub fn image(material: SharedResourceSet) -> Self {
        Self {
            geometry: DrawGeometry::FullScreen,
            material,
            world: Mat4::identity(),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self.geometry, DrawGeometry::FullScreen)
    }
}
