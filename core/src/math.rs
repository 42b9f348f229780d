//! Math type aliases and helper functions.
//!
//! All rendering math is `f32` and column-major, matching the layout WGSL
//! expects for `mat4x4<f32>` uniforms.

pub use nalgebra;

/// 2D vector (f32).
pub type Vec2 = nalgebra::Vector2<f32>;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 4D vector (f32).
pub type Vec4 = nalgebra::Vector4<f32>;

/// 4x4 matrix (f32).
pub type Mat4 = nalgebra::Matrix4<f32>;

/// Quaternion (f32).
pub type Quat = nalgebra::Quaternion<f32>;

/// Build a 4x4 TRS matrix from scale, rotation (quaternion), and translation.
pub fn mat4_from_scale_rotation_translation(
    scale: Vec3,
    rotation: Quat,
    translation: Vec3,
) -> Mat4 {
    let rotation = nalgebra::UnitQuaternion::new_normalize(rotation);
    let mut m = rotation.to_homogeneous();
    for column in 0..3 {
        for row in 0..3 {
            m[(row, column)] *= scale[column];
        }
    }
    m[(0, 3)] = translation.x;
    m[(1, 3)] = translation.y;
    m[(2, 3)] = translation.z;
    m
}

/// Right-handed perspective projection with depth range [0, 1].
pub fn perspective_rh(yfov: f32, aspect: f32, znear: f32, zfar: f32) -> Mat4 {
    let f = 1.0 / (yfov / 2.0).tan();
    let nf = 1.0 / (znear - zfar);
    #[rustfmt::skip]
    let result = Mat4::new(
        f / aspect, 0.0,  0.0,              0.0,
        0.0,        f,    0.0,              0.0,
        0.0,        0.0,  zfar * nf,        znear * zfar * nf,
        0.0,        0.0,  -1.0,             0.0,
    );
    result
}

/// Right-handed orthographic projection with depth range [0, 1].
pub fn orthographic_rh(half_width: f32, half_height: f32, near: f32, far: f32) -> Mat4 {
    let fmn = far - near;
    #[rustfmt::skip]
    let result = Mat4::new(
        1.0 / half_width, 0.0,               0.0,         0.0,
        0.0,              1.0 / half_height, 0.0,         0.0,
        0.0,              0.0,               -1.0 / fmn,  -near / fmn,
        0.0,              0.0,               0.0,         1.0,
    );
    result
}

/// Right-handed look-at view matrix.
pub fn look_at_rh(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4 {
    let eye_point = nalgebra::Point3::from(*eye);
    let target_point = nalgebra::Point3::from(*target);
    nalgebra::Isometry3::look_at_rh(&eye_point, &target_point, up).to_homogeneous()
}

/// Create a quaternion from rotation around the Y axis.
pub fn quat_from_rotation_y(angle: f32) -> Quat {
    nalgebra::UnitQuaternion::from_axis_angle(&nalgebra::Vector3::y_axis(), angle).into_inner()
}

/// Create a quaternion from rotation around the X axis.
pub fn quat_from_rotation_x(angle: f32) -> Quat {
    nalgebra::UnitQuaternion::from_axis_angle(&nalgebra::Vector3::x_axis(), angle).into_inner()
}

/// Column-major copy of a matrix, the order uniform buffers expect.
pub fn mat4_to_cols_array(m: &Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(m.as_slice());
    out
}

/// Transform a point (w = 1) and drop the homogeneous coordinate.
pub fn transform_point(m: &Mat4, p: &Vec3) -> Vec3 {
    m.transform_point(&nalgebra::Point3::from(*p)).coords
}

/// Transform a direction (w = 0).
pub fn transform_vector(m: &Mat4, v: &Vec3) -> Vec3 {
    m.transform_vector(v)
}

/// The matrix with its translation column zeroed, used for skybox view matrices.
pub fn without_translation(m: &Mat4) -> Mat4 {
    let mut out = *m;
    out[(0, 3)] = 0.0;
    out[(1, 3)] = 0.0;
    out[(2, 3)] = 0.0;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trs_places_translation_in_last_column() {
        let m = mat4_from_scale_rotation_translation(
            Vec3::new(2.0, 2.0, 2.0),
            Quat::identity(),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let p = transform_point(&m, &Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(3.0, 2.0, 3.0)).norm() < 1e-5);
    }

    #[test]
    fn test_cols_array_is_column_major() {
        let m = Mat4::new_translation(&Vec3::new(4.0, 5.0, 6.0));
        let cols = mat4_to_cols_array(&m);
        assert_eq!(&cols[12..15], &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_perspective_maps_near_to_zero_depth() {
        let proj = perspective_rh(std::f32::consts::FRAC_PI_3, 1.0, 0.1, 100.0);
        let clip = proj * Vec4::new(0.0, 0.0, -0.1, 1.0);
        assert!((clip.z / clip.w).abs() < 1e-4);
    }
}
