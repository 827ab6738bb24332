use std::path::Path;

use tracing::{debug, warn};

use crate::error::{AtlasError, RejectReason, Result};
use crate::types::{InputMesh, InputVertex};

/// Material identity used for objects without a `usemtl`.
pub const DEFAULT_MATERIAL: &str = "default";

/// One object of an OBJ file.
#[derive(Debug)]
pub struct ObjObject {
    pub name: String,
    /// Object positions, kept for writing the atlased result back out.
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    /// The atlas input, or why the object can't be expressed with 16-bit indices.
    pub mesh: std::result::Result<InputMesh<String>, RejectReason>,
}

/// Load an OBJ file into atlas inputs, one per object/material group.
///
/// Material identities are MTL material names.
pub fn load_obj(path: &Path) -> Result<Vec<ObjObject>> {
    let (models, materials_result) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS)
        .map_err(|e| AtlasError::Input(format!("Failed to load OBJ: {e}")))?;

    debug!(model_count = models.len(), "Loaded OBJ models");

    let material_names: Vec<String> = match materials_result {
        Ok(mats) => mats.into_iter().map(|m| m.name).collect(),
        Err(e) => {
            warn!("Failed to load MTL: {e}");
            Vec::new()
        }
    };

    Ok(models
        .into_iter()
        .map(|model| {
            let material = model
                .mesh
                .material_id
                .and_then(|id| material_names.get(id).cloned())
                .unwrap_or_else(|| DEFAULT_MATERIAL.to_string());
            convert_model(model.name, model.mesh, material)
        })
        .collect())
}

fn convert_model(name: String, mesh: tobj::Mesh, material: String) -> ObjObject {
    let input = convert_mesh(&mesh, material);
    ObjObject {
        name,
        positions: mesh.positions,
        normals: mesh.normals,
        mesh: input,
    }
}

/// Convert a `tobj::Mesh` into an atlas input mesh.
///
/// Missing normals and UVs become zeros; ingestion recomputes normals.
fn convert_mesh(
    mesh: &tobj::Mesh,
    material: String,
) -> std::result::Result<InputMesh<String>, RejectReason> {
    let vertex_count = mesh.positions.len() / 3;
    if vertex_count > u16::MAX as usize + 1 {
        return Err(RejectReason::TooManyVertices(vertex_count));
    }

    let vertices = (0..vertex_count)
        .map(|v| {
            let attr3 = |data: &[f32]| {
                data.get(v * 3..v * 3 + 3)
                    .map(|s| [s[0], s[1], s[2]])
                    .unwrap_or_default()
            };
            let uv = mesh
                .texcoords
                .get(v * 2..v * 2 + 2)
                .map(|s| [s[0], s[1]])
                .unwrap_or_default();
            InputVertex::new(attr3(&mesh.positions), attr3(&mesh.normals), uv)
        })
        .collect();

    let indices = mesh.indices.iter().map(|&i| i as u16).collect();
    Ok(InputMesh::new(vertices, indices, material))
}
