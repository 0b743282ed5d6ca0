use glam::{Mat4, Quat, Vec3};

/// Scale -> Rotate -> Translate.
pub fn trs_matrix(translation: Vec3, rotation: Quat, scale: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

/// Splits an affine matrix into (translation, rotation, scale).
pub fn decompose(matrix: &Mat4) -> (Vec3, Quat, Vec3) {
    let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
    (translation, rotation.normalize(), scale)
}

pub fn mat4_from_cols(cols: [[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(&cols)
}

/// Flattens matrices column by column, as `glUniformMatrix4fv` expects without transposition.
pub fn flatten_matrices(matrices: &[Mat4]) -> Vec<f32> {
    matrices.iter().flat_map(|m| m.to_cols_array()).collect()
}

// Build view matrix from position and Euler angles
pub fn build_view_matrix(position: Vec3, pitch: f32, yaw: f32) -> Mat4 {
    let (sp, cp) = pitch.sin_cos();
    let (sy, cy) = yaw.sin_cos();
    let forward = Vec3::new(-sy * cp, sp, -cy * cp);
    Mat4::look_to_rh(position, forward, Vec3::Y)
}

pub fn perspective(fov_y_radians: f32, aspect_ratio: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh_gl(fov_y_radians, aspect_ratio.max(f32::EPSILON), near, far)
}

pub fn approx_eq_mat4(a: &Mat4, b: &Mat4, epsilon: f32) -> bool {
    a.abs_diff_eq(*b, epsilon)
}
