//! # Geometry helpers
//!
//! Per-vertex attribute derivation used when drawables are added to a scene, plus
//! a few procedural shapes for sketches that do not load geometry files.
//!
//! All arrays are flat: three floats per position, normal or tangent and two per
//! texture coordinate. Indices describe a triangle list.

pub mod primitives;

pub use primitives::*;

/// Smooth per-vertex normals: the normalised sum of the face normals of every
/// triangle that uses the vertex
///
/// Vertices no triangle references get a zero normal. Every index must address a
/// vertex in `positions`; [`Scene::add`](crate::gfx::Scene::add) checks this first.
pub(crate) fn calculate_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let mut normals = vec![0.0; positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let v0 = vec3(positions, i0);
        let v1 = vec3(positions, i1);
        let v2 = vec3(positions, i2);

        let edge1 = sub(v1, v0);
        let edge2 = sub(v2, v0);
        let face_normal = [
            edge1[1] * edge2[2] - edge1[2] * edge2[1],
            edge1[2] * edge2[0] - edge1[0] * edge2[2],
            edge1[0] * edge2[1] - edge1[1] * edge2[0],
        ];

        for vertex in [i0, i1, i2] {
            accumulate(&mut normals, vertex, face_normal);
        }
    }

    normalize_all(&mut normals);
    normals
}

/// Per-vertex tangents along the direction of increasing `u`
///
/// Triangles with degenerate texture coordinates contribute nothing. Indices must
/// be in range for both `positions` and `texture_coords`.
pub(crate) fn calculate_tangents(positions: &[f32], texture_coords: &[f32], indices: &[u32]) -> Vec<f32> {
    let mut tangents = vec![0.0; positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);

        let edge1 = sub(vec3(positions, i1), vec3(positions, i0));
        let edge2 = sub(vec3(positions, i2), vec3(positions, i0));

        let uv0 = vec2(texture_coords, i0);
        let uv1 = vec2(texture_coords, i1);
        let uv2 = vec2(texture_coords, i2);
        let du1 = [uv1[0] - uv0[0], uv1[1] - uv0[1]];
        let du2 = [uv2[0] - uv0[0], uv2[1] - uv0[1]];

        let det = du1[0] * du2[1] - du1[1] * du2[0];
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = [
            (edge1[0] * du2[1] - edge2[0] * du1[1]) * r,
            (edge1[1] * du2[1] - edge2[1] * du1[1]) * r,
            (edge1[2] * du2[1] - edge2[2] * du1[1]) * r,
        ];

        for vertex in [i0, i1, i2] {
            accumulate(&mut tangents, vertex, tangent);
        }
    }

    normalize_all(&mut tangents);
    tangents
}

fn vec3(data: &[f32], index: usize) -> [f32; 3] {
    [data[index * 3], data[index * 3 + 1], data[index * 3 + 2]]
}

fn vec2(data: &[f32], index: usize) -> [f32; 2] {
    [data[index * 2], data[index * 2 + 1]]
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn accumulate(data: &mut [f32], index: usize, value: [f32; 3]) {
    data[index * 3] += value[0];
    data[index * 3 + 1] += value[1];
    data[index * 3 + 2] += value[2];
}

fn normalize_all(data: &mut [f32]) {
    for v in data.chunks_exact_mut(3) {
        let length = (v[0].powi(2) + v[1].powi(2) + v[2].powi(2)).sqrt();
        if length > 0.0 {
            v.iter_mut().for_each(|c| *c /= length);
        }
    }
}
