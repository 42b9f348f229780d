//! Camera with look-at placement and projection parameters.

use crate::bounds::Frustum;
use crate::math::{Mat4, Vec3, look_at_rh, orthographic_rh, perspective_rh, without_translation};

/// Projection model of a [`Camera`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        half_width: f32,
        half_height: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Self::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => perspective_rh(fov_y, aspect, near, far),
            Self::Orthographic {
                half_width,
                half_height,
                near,
                far,
            } => orthographic_rh(half_width, half_height, near, far),
        }
    }
}

/// A camera placed with an eye position and a target point.
///
/// # Example
///
/// ```ignore
/// let camera = Camera::perspective(std::f32::consts::FRAC_PI_3, 16.0 / 9.0, 0.01, 100.0)
///     .with_position(Vec3::new(0.0, 2.0, 6.0))
///     .with_clear_color([0.0, 1.0, 0.0, 1.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub name: String,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
    /// Colour the camera's raster passes clear their colour channels to.
    pub clear_color: [f32; 4],
}

impl Camera {
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            name: String::from("camera"),
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::zeros(),
            up: Vec3::y(),
            projection: Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            },
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_target(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    /// Update the aspect ratio of a perspective camera after a resize.
    pub fn set_aspect(&mut self, value: f32) {
        if let Projection::Perspective { aspect, .. } = &mut self.projection {
            *aspect = value;
        }
    }

    pub fn view(&self) -> Mat4 {
        look_at_rh(&self.position, &self.target, &self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view()
    }

    /// View-projection with the camera translation removed, for skyboxes.
    pub fn sky_view_projection(&self) -> Mat4 {
        self.projection_matrix() * without_translation(&self.view())
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection())
    }
}
