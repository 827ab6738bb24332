//! JSON run summary.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::atlas::Atlas;
use crate::error::{AtlasError, Result};
use crate::packing::PageInfo;

/// One accepted object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshSummary {
    pub name: String,
    pub mesh_index: usize,
    pub triangles: usize,
    pub vertices: usize,
    pub charts: usize,
}

/// One object that was skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedSummary {
    pub name: String,
    pub reason: String,
}

/// Contents of `atlas.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtlasSummary {
    pub width: u32,
    pub height: u32,
    pub texels_per_unit: f32,
    pub chart_count: usize,
    pub pages: Vec<PageInfo>,
    pub meshes: Vec<MeshSummary>,
    pub rejected: Vec<RejectedSummary>,
}

impl AtlasSummary {
    /// `names[i]` is the name of accepted mesh `i`.
    pub fn new(atlas: &Atlas, names: &[String], rejected: Vec<RejectedSummary>) -> Self {
        let meshes = atlas
            .meshes
            .iter()
            .zip(names)
            .enumerate()
            .map(|(mesh_index, (mesh, name))| {
                let mut charts: Vec<u32> = mesh.vertices.iter().map(|v| v.chart_index).collect();
                charts.sort_unstable();
                charts.dedup();
                MeshSummary {
                    name: name.clone(),
                    mesh_index,
                    triangles: mesh.triangle_count(),
                    vertices: mesh.vertex_count(),
                    charts: charts.len(),
                }
            })
            .collect();

        Self {
            width: atlas.width,
            height: atlas.height,
            texels_per_unit: atlas.texels_per_unit,
            chart_count: atlas.chart_count,
            pages: atlas.pages.clone(),
            meshes,
            rejected,
        }
    }
}

/// Write `summary` as pretty JSON to `path`.
pub fn write_summary(summary: &AtlasSummary, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| AtlasError::Output(format!("Failed to serialize atlas summary: {e}")))?;
    fs::write(path, json)
        .map_err(|e| AtlasError::Output(format!("Failed to write {}: {e}", path.display())))?;
    info!(path = %path.display(), "Wrote atlas summary");
    Ok(())
}
