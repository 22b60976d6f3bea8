use cgmath::{Matrix3, Matrix4};

/// Maps OpenGL clip depth (-1..1) to wgpu clip depth (0..1)
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Column-major array form of a 4x4 matrix, as uniforms expect it
pub fn convert_matrix4_to_array(matrix4: Matrix4<f32>) -> [[f32; 4]; 4] {
    let mut result = [[0.0; 4]; 4];

    for i in 0..4 {
        for j in 0..4 {
            result[i][j] = matrix4[i][j];
        }
    }

    result
}

pub fn convert_matrix3_to_array(matrix3: Matrix3<f32>) -> [[f32; 3]; 3] {
    let mut result = [[0.0; 3]; 3];

    for i in 0..3 {
        for j in 0..3 {
            result[i][j] = matrix3[i][j];
        }
    }

    result
}

/// Wraps an angle in degrees back into (-360, 360) once it leaves that range
pub fn wrap_degrees(angle: f32) -> f32 {
    if angle > 360.0 || angle < -360.0 {
        angle % 360.0
    } else {
        angle
    }
}
