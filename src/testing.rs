//! Mesh fixtures shared by unit tests.

use glam::Vec3;

use crate::ingestion::ingest_mesh;
use crate::types::{IndexedMesh, InputMesh, InputVertex, MaterialRegistry};

/// Ingest raw positions/UVs with a single material; normals are derived from the faces.
pub fn mesh_with_uvs(positions: &[[f32; 3]], uvs: &[[f32; 2]], indices: &[u16]) -> IndexedMesh {
    let vertices = positions
        .iter()
        .zip(uvs)
        .map(|(&p, &uv)| InputVertex::new(p, [0.0; 3], uv))
        .collect();
    let input = InputMesh::new(vertices, indices.to_vec(), 0u32);
    ingest_mesh(&input, 0, &mut MaterialRegistry::default()).unwrap()
}

pub fn mesh(positions: &[[f32; 3]], indices: &[u16]) -> IndexedMesh {
    mesh_with_uvs(positions, &vec![[0.0; 2]; positions.len()], indices)
}

pub fn single_triangle() -> IndexedMesh {
    mesh(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], &[0, 1, 2])
}

/// `nx` by `ny` quads of side `size` in the XY plane, UVs spanning [0,1].
pub fn grid(nx: usize, ny: usize, size: f32) -> IndexedMesh {
    let mut positions = Vec::new();
    let mut uvs = Vec::new();
    for y in 0..=ny {
        for x in 0..=nx {
            positions.push([x as f32 * size, y as f32 * size, 0.0]);
            uvs.push([x as f32 / nx as f32, y as f32 / ny as f32]);
        }
    }
    let row = (nx + 1) as u16;
    let mut indices = Vec::new();
    for y in 0..ny as u16 {
        for x in 0..nx as u16 {
            let a = y * row + x;
            indices.extend_from_slice(&[a, a + 1, a + row + 1, a, a + row + 1, a + row]);
        }
    }
    mesh_with_uvs(&positions, &uvs, &indices)
}

/// Unit cube centered on the origin with split vertices and per-face normals.
///
/// Each side carries UVs spanning [0,1], so every cube edge is a seam.
pub fn cube() -> IndexedMesh {
    let sides = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    for (n, u, v) in sides {
        let base = vertices.len() as u16;
        let center = n * 0.5;
        for (su, sv, uv) in [
            (-0.5, -0.5, [0.0, 0.0]),
            (0.5, -0.5, [1.0, 0.0]),
            (0.5, 0.5, [1.0, 1.0]),
            (-0.5, 0.5, [0.0, 1.0]),
        ] {
            let p = center + u * su + v * sv;
            vertices.push(InputVertex::new(p.to_array(), n.to_array(), uv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    let input = InputMesh::new(vertices, indices, 0u32);
    ingest_mesh(&input, 0, &mut MaterialRegistry::default()).unwrap()
}
