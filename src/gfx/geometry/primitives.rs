//! # Primitive Shape Generation
//!
//! Procedural shapes returned as [`GeometryDesc`]s, ready for
//! [`Scene::add`](crate::gfx::scene::Scene::add). The engine is Y-up.

use crate::gfx::scene::GeometryDesc;

/// Unit cube centered at the origin, four vertices per face so each face has
/// its own normals and texture coordinates
pub fn cube(alias: &str) -> GeometryDesc {
    #[rustfmt::skip]
    let vertices = vec![
        // Front face
        -0.5, -0.5,  0.5,   0.5, -0.5,  0.5,   0.5,  0.5,  0.5,  -0.5,  0.5,  0.5,
        // Back face
        -0.5, -0.5, -0.5,  -0.5,  0.5, -0.5,   0.5,  0.5, -0.5,   0.5, -0.5, -0.5,
        // Left face
        -0.5, -0.5, -0.5,  -0.5, -0.5,  0.5,  -0.5,  0.5,  0.5,  -0.5,  0.5, -0.5,
        // Right face
         0.5, -0.5,  0.5,   0.5, -0.5, -0.5,   0.5,  0.5, -0.5,   0.5,  0.5,  0.5,
        // Top face
        -0.5,  0.5,  0.5,   0.5,  0.5,  0.5,   0.5,  0.5, -0.5,  -0.5,  0.5, -0.5,
        // Bottom face
        -0.5, -0.5, -0.5,   0.5, -0.5, -0.5,   0.5, -0.5,  0.5,  -0.5, -0.5,  0.5,
    ];

    #[rustfmt::skip]
    let texture_coords = vec![
        0.0, 1.0,  1.0, 1.0,  1.0, 0.0,  0.0, 0.0,
        1.0, 1.0,  1.0, 0.0,  0.0, 0.0,  0.0, 1.0,
        0.0, 1.0,  1.0, 1.0,  1.0, 0.0,  0.0, 0.0,
        0.0, 1.0,  1.0, 1.0,  1.0, 0.0,  0.0, 0.0,
        0.0, 1.0,  1.0, 1.0,  1.0, 0.0,  0.0, 0.0,
        0.0, 1.0,  1.0, 1.0,  1.0, 0.0,  0.0, 0.0,
    ];

    let indices = (0..6u32)
        .flat_map(|face| {
            let i = face * 4;
            [i, i + 1, i + 2, i + 2, i + 3, i]
        })
        .collect();

    GeometryDesc {
        alias: Some(alias.to_string()),
        vertices,
        indices,
        texture_coords: Some(texture_coords),
        ..Default::default()
    }
}

/// Flat grid in the XZ plane facing +Y, centered at the origin
///
/// # Arguments
/// * `width` - Extent along X
/// * `depth` - Extent along Z
/// * `segments` - Subdivisions along each side (at least 1)
pub fn plane(alias: &str, width: f32, depth: f32, segments: u32) -> GeometryDesc {
    let segments = segments.max(1);
    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut texture_coords = Vec::new();
    let mut indices = Vec::new();

    for row in 0..=segments {
        let v = row as f32 / segments as f32;
        for column in 0..=segments {
            let u = column as f32 / segments as f32;
            vertices.extend_from_slice(&[(u - 0.5) * width, 0.0, (v - 0.5) * depth]);
            normals.extend_from_slice(&[0.0, 1.0, 0.0]);
            texture_coords.extend_from_slice(&[u, v]);
        }
    }

    // Counter-clockwise seen from above
    for row in 0..segments {
        for column in 0..segments {
            let i = row * (segments + 1) + column;
            let next_row = i + segments + 1;
            indices.extend_from_slice(&[i, next_row, i + 1, next_row, next_row + 1, i + 1]);
        }
    }

    GeometryDesc {
        alias: Some(alias.to_string()),
        vertices,
        indices,
        normals: Some(normals),
        texture_coords: Some(texture_coords),
        ..Default::default()
    }
}
