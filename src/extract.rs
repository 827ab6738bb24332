//! Per-mesh output assembly.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{AtlasError, Result};
use crate::packing::PackResult;
use crate::parameterize::ChartUv;
use crate::progress::{Progress, ProgressPhase};
use crate::types::{IndexedMesh, OutputMesh, OutputVertex};

/// Build one [`OutputMesh`] per input mesh from the packed charts.
///
/// `charts` is the atlas-wide chart list; its position is the chart index
/// reported on every output vertex.
pub fn extract_meshes(
    meshes: &[IndexedMesh],
    charts: &[ChartUv],
    packed: &PackResult,
    progress: &Progress,
) -> Result<Vec<OutputMesh>> {
    // (chart, local triangle) for every face of every mesh
    let mut face_slots: Vec<Vec<Option<(u32, u32)>>> = meshes
        .iter()
        .map(|m| vec![None; m.triangle_count()])
        .collect();
    for (c, chart) in charts.iter().enumerate() {
        let slots = face_slots.get_mut(chart.mesh as usize).ok_or_else(|| {
            AtlasError::Internal(format!("chart {c} references unknown mesh {}", chart.mesh))
        })?;
        for (t, &face) in chart.faces.iter().enumerate() {
            let slot = slots.get_mut(face as usize).ok_or_else(|| {
                AtlasError::Internal(format!("chart {c} references unknown face {face}"))
            })?;
            if slot.replace((c as u32, t as u32)).is_some() {
                return Err(AtlasError::Internal(format!(
                    "face {face} of mesh {} belongs to two charts",
                    chart.mesh
                )));
            }
        }
    }

    let mut outputs = Vec::with_capacity(meshes.len());
    for (m, (mesh, slots)) in meshes.iter().zip(&face_slots).enumerate() {
        let mut output = OutputMesh {
            indices: Vec::with_capacity(mesh.indices.len()),
            vertices: Vec::new(),
        };
        let mut emitted: HashMap<(u32, u32), u32> = HashMap::new();

        for (face, slot) in slots.iter().enumerate() {
            let (c, t) = slot.ok_or_else(|| {
                AtlasError::Internal(format!("face {face} of mesh {m} is in no chart"))
            })?;
            let chart = &charts[c as usize];
            let page = packed.placements[c as usize].page;
            for local in chart.triangles[t as usize] {
                let original = chart.vertices[local as usize];
                let index = match emitted.get(&(c, original)) {
                    Some(&index) => index,
                    None => {
                        let uv = chart.uvs[local as usize];
                        let uv = packed.normalized_uv(c as usize, uv).ok_or_else(|| {
                            AtlasError::Internal(format!(
                                "mesh {m}: chart {c} puts vertex {original} at {uv} outside page {page}"
                            ))
                        })?;
                        output.vertices.push(OutputVertex {
                            original_vertex_index: original,
                            uv: uv.to_array(),
                            chart_index: c,
                            page_index: page,
                        });
                        let index = output.vertices.len() as u32 - 1;
                        emitted.insert((c, original), index);
                        index
                    }
                };
                output.indices.push(index);
            }
        }

        check_output(m, mesh, &output)?;
        debug!(
            mesh = m,
            triangles = output.triangle_count(),
            vertices = output.vertex_count(),
            "Extracted output mesh"
        );
        outputs.push(output);
        progress.report_steps(ProgressPhase::BuildOutputMeshes, m + 1, meshes.len());
    }

    Ok(outputs)
}

fn check_output(m: usize, mesh: &IndexedMesh, output: &OutputMesh) -> Result<()> {
    if output.triangle_count() != mesh.triangle_count() {
        return Err(AtlasError::Internal(format!(
            "mesh {m}: {} output triangles for {} input triangles",
            output.triangle_count(),
            mesh.triangle_count()
        )));
    }
    if let Some(&i) = output
        .indices
        .iter()
        .find(|&&i| i as usize >= output.vertices.len())
    {
        return Err(AtlasError::Internal(format!(
            "mesh {m}: index {i} out of {} vertices",
            output.vertices.len()
        )));
    }
    if let Some(v) = output.vertices.iter().find(|v| {
        v.original_vertex_index as usize >= mesh.vertex_count()
            || !v.uv.iter().all(|c| (0.0..=1.0).contains(c))
    }) {
        return Err(AtlasError::Internal(format!(
            "mesh {m}: invalid output vertex {v:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charting::build_charts;
    use crate::config::{ChartConfig, PackConfig};
    use crate::packing::pack_charts;
    use crate::parameterize::{UnwrapOptions, parameterize_all};
    use crate::testing;

    fn run(meshes: &[IndexedMesh]) -> (Vec<ChartUv>, Vec<OutputMesh>) {
        let charts: Vec<_> = meshes
            .iter()
            .map(|m| build_charts(m, &ChartConfig::default()))
            .collect();
        let uvs = parameterize_all(meshes, &charts, &UnwrapOptions::default());
        let packed = pack_charts(&uvs, &PackConfig::default(), &Progress::none()).unwrap();
        let out = extract_meshes(meshes, &uvs, &packed, &Progress::none()).unwrap();
        (uvs, out)
    }

    #[test]
    fn grid_keeps_shared_vertices() {
        let mesh = testing::grid(3, 3, 1.0);
        let (charts, out) = run(std::slice::from_ref(&mesh));
        assert_eq!(charts.len(), 1);
        assert_eq!(out[0].triangle_count(), mesh.triangle_count());
        assert_eq!(out[0].vertex_count(), mesh.vertex_count());
        for (i, &idx) in out[0].indices.iter().enumerate() {
            assert_eq!(
                out[0].vertices[idx as usize].original_vertex_index,
                mesh.indices[i]
            );
        }
    }

    #[test]
    fn cube_duplicates_seam_vertices_per_chart() {
        let mesh = testing::cube();
        let (charts, out) = run(std::slice::from_ref(&mesh));
        assert_eq!(charts.len(), 6);
        assert_eq!(out[0].vertex_count(), 24);
        let mut seen: Vec<u32> = out[0].vertices.iter().map(|v| v.chart_index).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn chart_indices_are_atlas_wide() {
        let meshes = [testing::single_triangle(), testing::single_triangle()];
        let (_, out) = run(&meshes);
        assert_eq!(out.len(), 2);
        assert!(out[0].vertices.iter().all(|v| v.chart_index == 0));
        assert!(out[1].vertices.iter().all(|v| v.chart_index == 1));
    }

    #[test]
    fn missing_face_is_internal_error() {
        let mesh = testing::grid(1, 1, 1.0);
        let charts = vec![build_charts(&mesh, &ChartConfig::default())];
        let mut uvs = parameterize_all(std::slice::from_ref(&mesh), &charts, &UnwrapOptions::default());
        let packed = pack_charts(&uvs, &PackConfig::default(), &Progress::none()).unwrap();
        uvs[0].faces.pop();
        uvs[0].triangles.pop();

        let err = extract_meshes(std::slice::from_ref(&mesh), &uvs, &packed, &Progress::none())
            .unwrap_err();
        assert!(matches!(err, AtlasError::Internal(_)));
    }

    #[test]
    fn chart_off_the_page_is_internal_error() {
        let mesh = testing::grid(2, 2, 1.0);
        let charts = vec![build_charts(&mesh, &ChartConfig::default())];
        let uvs = parameterize_all(std::slice::from_ref(&mesh), &charts, &UnwrapOptions::default());
        let mut packed = pack_charts(&uvs, &PackConfig::default(), &Progress::none()).unwrap();
        packed.placements[0].x += packed.width;

        let err = extract_meshes(std::slice::from_ref(&mesh), &uvs, &packed, &Progress::none())
            .unwrap_err();
        assert!(matches!(err, AtlasError::Internal(_)), "{err}");
    }
}
