pub mod obj_loader;

use std::hash::Hash;

use glam::Vec3;
use tracing::debug;

use crate::error::{MeshRejected, RejectReason};
use crate::types::{IndexedMesh, InputMesh, MaterialRegistry, MeshKind};

/// Statistics about the meshes accepted into a build session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionStats {
    pub total_vertices: usize,
    pub total_triangles: usize,
    pub total_meshes: usize,
    pub pre_unwrapped_meshes: usize,
    pub material_count: usize,
}

/// Check a caller mesh without touching any session state.
pub fn validate_mesh<M>(mesh: &InputMesh<M>) -> Result<(), RejectReason> {
    if mesh.vertices.is_empty() {
        return Err(RejectReason::NoVertices);
    }
    if mesh.indices.is_empty() {
        return Err(RejectReason::NoTriangles);
    }
    if mesh.indices.len() % 3 != 0 {
        return Err(RejectReason::IndexCountNotMultipleOfThree(mesh.indices.len()));
    }

    let vertex_count = mesh.vertices.len();
    if let Some(pos) = mesh
        .indices
        .iter()
        .position(|&i| i as usize >= vertex_count)
    {
        return Err(RejectReason::IndexOutOfRange {
            triangle: pos / 3,
            index: mesh.indices[pos] as u32,
            vertex_count,
        });
    }

    let triangle_count = mesh.triangle_count();
    if mesh.face_materials.len() != triangle_count {
        return Err(RejectReason::MaterialCountMismatch {
            expected: triangle_count,
            actual: mesh.face_materials.len(),
        });
    }

    if let Some(vertex) = mesh.vertices.iter().position(|v| {
        !(v.position.iter().all(|c| c.is_finite())
            && v.normal.iter().all(|c| c.is_finite())
            && v.uv.iter().all(|c| c.is_finite()))
    }) {
        return Err(RejectReason::NonFiniteAttribute { vertex });
    }

    Ok(())
}

/// Validate `mesh` and convert it into the canonical representation.
///
/// Materials are registered only once the mesh is known to be valid, so a
/// rejected mesh leaves `registry` untouched.
pub fn ingest_mesh<M: Hash + Eq + Clone>(
    mesh: &InputMesh<M>,
    mesh_index: usize,
    registry: &mut MaterialRegistry<M>,
) -> Result<IndexedMesh, MeshRejected> {
    validate_mesh(mesh).map_err(|reason| MeshRejected { mesh_index, reason })?;

    let vertex_count = mesh.vertices.len();
    let mut positions = Vec::with_capacity(vertex_count * 3);
    let mut normals = Vec::with_capacity(vertex_count * 3);
    let mut uvs = Vec::with_capacity(vertex_count * 2);
    for v in &mesh.vertices {
        positions.extend_from_slice(&v.position);
        normals.extend_from_slice(&v.normal);
        uvs.extend_from_slice(&v.uv);
    }

    let face_materials = mesh
        .face_materials
        .iter()
        .map(|m| registry.register(m))
        .collect();

    let mut out = IndexedMesh {
        positions,
        normals,
        uvs,
        indices: mesh.indices.iter().map(|&i| i as u32).collect(),
        face_materials,
        kind: mesh.kind,
    };
    let repaired = repair_normals(&mut out);

    debug!(
        mesh = mesh_index,
        vertices = out.vertex_count(),
        triangles = out.triangle_count(),
        repaired_normals = repaired,
        pre_unwrapped = out.kind == MeshKind::PreUnwrapped,
        "Ingested mesh"
    );

    Ok(out)
}

/// Normalize vertex normals, replacing zero-length ones with the
/// area-weighted normal of the adjacent faces. Returns the number replaced.
fn repair_normals(mesh: &mut IndexedMesh) -> usize {
    let vertex_count = mesh.vertex_count();
    let mut face_sum: Option<Vec<Vec3>> = None;
    let mut repaired = 0;

    for v in 0..vertex_count {
        let n = mesh.normal(v);
        let len = n.length();
        let fixed = if len > 1e-12 {
            n / len
        } else {
            let sums = face_sum.get_or_insert_with(|| accumulate_face_normals(mesh));
            repaired += 1;
            sums[v].try_normalize().unwrap_or(Vec3::Z)
        };
        mesh.normals[v * 3..v * 3 + 3].copy_from_slice(&fixed.to_array());
    }

    repaired
}

fn accumulate_face_normals(mesh: &IndexedMesh) -> Vec<Vec3> {
    let mut sums = vec![Vec3::ZERO; mesh.vertex_count()];
    for face in 0..mesh.triangle_count() {
        // Cross product length is proportional to area.
        let n = mesh.face_cross(face);
        for v in mesh.triangle(face) {
            sums[v] += n;
        }
    }
    sums
}

/// Compute summary statistics for a set of accepted meshes.
pub fn compute_stats(meshes: &[IndexedMesh], material_count: usize) -> IngestionStats {
    IngestionStats {
        total_vertices: meshes.iter().map(|m| m.vertex_count()).sum(),
        total_triangles: meshes.iter().map(|m| m.triangle_count()).sum(),
        total_meshes: meshes.len(),
        pre_unwrapped_meshes: meshes
            .iter()
            .filter(|m| m.kind == MeshKind::PreUnwrapped)
            .count(),
        material_count,
    }
}
