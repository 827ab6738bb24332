use std::collections::HashMap;

use glam::{Vec2, Vec3};

use crate::types::IndexedMesh;

/// UV comparison tolerance for texture seams.
const UV_EPSILON: f32 = 1e-5;
/// Vertex normals closer than this (as 1 - dot) don't form a normal seam.
const NORMAL_EPSILON: f32 = 1e-4;

/// Face adjacency and per-edge seam data for one mesh.
///
/// Edge `e` of a face runs from corner `e` to corner `(e + 1) % 3`.
/// Vertices are welded by exact position, so faces stay adjacent across
/// normal or UV splits of the vertex buffer.
#[derive(Debug, Clone)]
pub struct MeshTopology {
    /// Welded vertex id for every mesh vertex.
    pub canonical: Vec<u32>,
    pub canonical_count: usize,
    /// Neighbor face across each edge. `None` on boundaries, degenerate
    /// edges and non-manifold edges shared by more than two faces.
    pub neighbors: Vec<[Option<u32>; 3]>,
    /// Whether the neighbor walks the shared edge in the same direction
    /// (inconsistent winding).
    pub same_direction: Vec<[bool; 3]>,
    pub edge_length: Vec<[f32; 3]>,
    /// Normal discontinuity in `[0, 1]`; 0 where vertex normals agree.
    pub normal_seam: Vec<[f32; 3]>,
    pub texture_seam: Vec<[bool; 3]>,
    /// Unit face normals (zero for degenerate faces).
    pub face_normal: Vec<Vec3>,
    pub face_area: Vec<f32>,
    pub face_centroid: Vec<Vec3>,
}

impl MeshTopology {
    pub fn build(mesh: &IndexedMesh) -> Self {
        let canonical = weld_positions(mesh);
        let canonical_count = canonical.iter().map(|&c| c as usize + 1).max().unwrap_or(0);
        let face_count = mesh.triangle_count();

        let mut face_normal = Vec::with_capacity(face_count);
        let mut face_area = Vec::with_capacity(face_count);
        let mut face_centroid = Vec::with_capacity(face_count);
        let mut edge_length = Vec::with_capacity(face_count);

        // Welded edge -> (face, edge slot) entries
        let mut edge_map: HashMap<(u32, u32), Vec<(u32, u8)>> = HashMap::new();

        for face in 0..face_count {
            let tri = mesh.triangle(face);
            let p = tri.map(|v| mesh.position(v));
            let cross = (p[1] - p[0]).cross(p[2] - p[0]);
            let area = cross.length() * 0.5;

            face_area.push(area);
            face_normal.push(cross.try_normalize().unwrap_or(Vec3::ZERO));
            face_centroid.push((p[0] + p[1] + p[2]) / 3.0);
            edge_length.push([
                p[0].distance(p[1]),
                p[1].distance(p[2]),
                p[2].distance(p[0]),
            ]);

            for e in 0..3 {
                let a = canonical[tri[e]];
                let b = canonical[tri[(e + 1) % 3]];
                if a == b {
                    continue;
                }
                let key = if a < b { (a, b) } else { (b, a) };
                edge_map.entry(key).or_default().push((face as u32, e as u8));
            }
        }

        let mut neighbors = vec![[None; 3]; face_count];
        let mut same_direction = vec![[false; 3]; face_count];
        let mut normal_seam = vec![[0.0f32; 3]; face_count];
        let mut texture_seam = vec![[false; 3]; face_count];

        for entries in edge_map.values() {
            let [(fa, ea), (fb, eb)] = match entries.as_slice() {
                [x, y] => [*x, *y],
                _ => continue,
            };
            if fa == fb {
                continue;
            }

            let (a0, a1) = edge_vertices(mesh, fa as usize, ea as usize);
            let (b0, b1) = edge_vertices(mesh, fb as usize, eb as usize);
            let same = canonical[a0] == canonical[b0];
            // Vertices of b matching a0 and a1 respectively
            let (m0, m1) = if same { (b0, b1) } else { (b1, b0) };

            let n_seam = normal_discontinuity(mesh, a0, m0, a1, m1);
            let t_seam = !uv_close(mesh.uv(a0), mesh.uv(m0)) || !uv_close(mesh.uv(a1), mesh.uv(m1));

            for (f, e, other) in [(fa, ea, fb), (fb, eb, fa)] {
                let (f, e) = (f as usize, e as usize);
                neighbors[f][e] = Some(other);
                same_direction[f][e] = same;
                normal_seam[f][e] = n_seam;
                texture_seam[f][e] = t_seam;
            }
        }

        Self {
            canonical,
            canonical_count,
            neighbors,
            same_direction,
            edge_length,
            normal_seam,
            texture_seam,
            face_normal,
            face_area,
            face_centroid,
        }
    }

    pub fn face_count(&self) -> usize {
        self.neighbors.len()
    }

    pub fn perimeter(&self, face: usize) -> f32 {
        self.edge_length[face].iter().sum()
    }

    /// Faces with (numerically) zero area never join larger charts.
    pub fn is_degenerate(&self, face: usize) -> bool {
        self.face_normal[face] == Vec3::ZERO
    }
}

fn edge_vertices(mesh: &IndexedMesh, face: usize, edge: usize) -> (usize, usize) {
    let tri = mesh.triangle(face);
    (tri[edge], tri[(edge + 1) % 3])
}

fn uv_close(a: Vec2, b: Vec2) -> bool {
    (a.x - b.x).abs() < UV_EPSILON && (a.y - b.y).abs() < UV_EPSILON
}

fn normal_discontinuity(mesh: &IndexedMesh, a0: usize, b0: usize, a1: usize, b1: usize) -> f32 {
    if a0 == b0 && a1 == b1 {
        return 0.0;
    }
    let d0 = mesh.normal(a0).dot(mesh.normal(b0));
    let d1 = mesh.normal(a1).dot(mesh.normal(b1));
    if 1.0 - d0 < NORMAL_EPSILON && 1.0 - d1 < NORMAL_EPSILON {
        return 0.0;
    }
    ((2.0 - d0 - d1) * 0.5).clamp(0.0, 1.0)
}

/// Map every vertex to the first vertex sharing its exact position.
///
/// Returns dense ids in first-seen order.
pub fn weld_positions(mesh: &IndexedMesh) -> Vec<u32> {
    let mut ids: HashMap<[u32; 3], u32> = HashMap::with_capacity(mesh.vertex_count());
    (0..mesh.vertex_count())
        .map(|v| {
            // -0.0 and 0.0 weld together
            let key = mesh.position(v).to_array().map(|c| (c + 0.0).to_bits());
            let next = ids.len() as u32;
            *ids.entry(key).or_insert(next)
        })
        .collect()
}
