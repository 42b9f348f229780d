//! Bounding volumes and view-frustum tests used for culling.

use crate::math::{Mat4, Vec3, Vec4, transform_point};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create a box from its corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing all points, or `None` for an empty iterator.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(Self::new(first, first), |acc, p| Self {
            min: acc.min.inf(p),
            max: acc.max.sup(p),
        }))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }

    /// Union of two boxes.
    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Bounds of this box after an affine transform.
    pub fn transformed(&self, m: &Mat4) -> Aabb {
        let corners = self.corners().map(|c| transform_point(m, &c));
        // corners is never empty
        Aabb::from_points(corners.iter()).unwrap_or(*self)
    }
}

/// Plane in the form `normal · p + distance = 0`, normal pointing inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    fn from_coefficients(c: Vec4) -> Self {
        let normal = Vec3::new(c.x, c.y, c.z);
        let length = normal.norm();
        if length <= f32::EPSILON {
            return Self { normal, distance: c.w };
        }
        Self {
            normal: normal / length,
            distance: c.w / length,
        }
    }

    pub fn signed_distance(&self, p: &Vec3) -> f32 {
        self.normal.dot(p) + self.distance
    }
}

/// Six clipping planes extracted from a view-projection matrix.
///
/// Assumes the [0, 1] clip-space depth range used by [`crate::math::perspective_rh`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let row = |i: usize| vp.row(i).transpose();
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// Conservative box test: false only when the box is fully outside one plane.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let positive = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.signed_distance(&positive) >= 0.0
        })
    }

    pub fn contains_point(&self, p: &Vec3) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(p) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{look_at_rh, perspective_rh};

    fn frustum() -> Frustum {
        let view = look_at_rh(&Vec3::new(0.0, 0.0, 5.0), &Vec3::zeros(), &Vec3::y());
        let proj = perspective_rh(std::f32::consts::FRAC_PI_3, 1.0, 0.1, 50.0);
        Frustum::from_view_projection(&(proj * view))
    }

    #[test]
    fn test_box_in_front_of_camera_is_visible() {
        let unit = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(frustum().intersects_aabb(&unit));
    }

    #[test]
    fn test_box_behind_camera_is_culled() {
        let behind = Aabb::new(Vec3::new(-1.0, -1.0, 8.0), Vec3::new(1.0, 1.0, 10.0));
        assert!(!frustum().intersects_aabb(&behind));
    }

    #[test]
    fn test_box_beyond_far_plane_is_culled() {
        let far = Aabb::new(Vec3::new(-1.0, -1.0, -80.0), Vec3::new(1.0, 1.0, -60.0));
        assert!(!frustum().intersects_aabb(&far));
    }

    #[test]
    fn test_transformed_bounds_follow_translation() {
        let unit = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let moved = unit.transformed(&Mat4::new_translation(&Vec3::new(10.0, 0.0, 0.0)));
        assert!((moved.center() - Vec3::new(10.0, 0.0, 0.0)).norm() < 1e-5);
    }
}
