//! Math type aliases and helper functions.
//!
//! All rendering math is `f32` and column-vector (`clip = P * V * M * v`).
//! Projection helpers follow OpenGL clip-space conventions: right-handed eye
//! space looking down `-Z`, normalized depth in `[-1, 1]`.

pub use nalgebra;

/// 2D vector (f32).
pub type Vec2 = nalgebra::Vector2<f32>;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 4D vector (f32).
pub type Vec4 = nalgebra::Vector4<f32>;

/// 4x4 matrix (f32).
pub type Mat4 = nalgebra::Matrix4<f32>;

/// Quaternion (f32). Stored as `[x, y, z, w]` in memory.
pub type Quat = nalgebra::Quaternion<f32>;

/// Off-center orthographic projection (`glOrtho`).
pub fn orthographic_off_center(
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
) -> Mat4 {
    let rml = right - left;
    let tmb = top - bottom;
    let fmn = far - near;
    #[rustfmt::skip]
    let result = Mat4::new(
        2.0 / rml, 0.0,       0.0,         -(right + left) / rml,
        0.0,       2.0 / tmb, 0.0,         -(top + bottom) / tmb,
        0.0,       0.0,       -2.0 / fmn,  -(far + near) / fmn,
        0.0,       0.0,       0.0,          1.0,
    );
    result
}

/// Off-center perspective projection (`glFrustum`).
///
/// `left`..`top` describe the view window on the near plane.
pub fn perspective_off_center(
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
) -> Mat4 {
    let rml = right - left;
    let tmb = top - bottom;
    let fmn = far - near;
    #[rustfmt::skip]
    let result = Mat4::new(
        2.0 * near / rml, 0.0,              (right + left) / rml,  0.0,
        0.0,              2.0 * near / tmb, (top + bottom) / tmb,  0.0,
        0.0,              0.0,              -(far + near) / fmn,   -2.0 * far * near / fmn,
        0.0,              0.0,              -1.0,                  0.0,
    );
    result
}

/// Right-handed look-at view matrix.
pub fn look_at_rh(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4 {
    let eye_point = nalgebra::Point3::from(*eye);
    let target_point = nalgebra::Point3::from(*target);
    nalgebra::Isometry3::look_at_rh(&eye_point, &target_point, up).to_homogeneous()
}

/// Create a quaternion from a rotation of `angle` radians around `axis`.
///
/// A zero-length axis yields the identity rotation.
pub fn quat_from_axis_angle(axis: Vec3, angle: f32) -> Quat {
    match nalgebra::Unit::try_new(axis, f32::EPSILON) {
        Some(axis) => nalgebra::UnitQuaternion::from_axis_angle(&axis, angle).into_inner(),
        None => Quat::identity(),
    }
}

/// Rotate a vector by a quaternion.
pub fn quat_rotate_vec3(q: Quat, v: Vec3) -> Vec3 {
    nalgebra::UnitQuaternion::new_normalize(q) * v
}

/// Convert a 4x4 matrix to a flat column-major array, the layout shaders expect.
pub fn mat4_to_cols_array(m: &Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(m.as_slice());
    out
}
