//! The atlas build session.

use std::hash::Hash;
use std::time::Instant;

use image::RgbaImage;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::charting::{MeshCharts, build_charts};
use crate::config::{ChartConfig, PackConfig};
use crate::error::{MeshRejected, Result};
use crate::extract::extract_meshes;
use crate::ingestion::{self, IngestionStats};
use crate::packing::{PageInfo, pack_charts};
use crate::parameterize::{UnwrapMethod, UnwrapOptions, parameterize_all};
use crate::progress::{Progress, ProgressPhase};
use crate::types::{IndexedMesh, InputMesh, MaterialRegistry, OutputMesh};

/// Dense index of an accepted mesh; equals its position in [`Atlas::meshes`].
pub type MeshIndex = usize;

/// Result of [`AtlasBuilder::generate`].
#[derive(Debug, Clone)]
pub struct Atlas {
    /// One per accepted mesh, in acceptance order.
    pub meshes: Vec<OutputMesh>,
    /// Page width and height in texels, shared by every page.
    pub width: u32,
    pub height: u32,
    pub pages: Vec<PageInfo>,
    pub chart_count: usize,
    pub texels_per_unit: f32,
    /// Diagnostic rasters, present when `PackConfig::create_image` is set.
    pub images: Vec<RgbaImage>,
}

impl Atlas {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn into_meshes(self) -> Vec<OutputMesh> {
        self.meshes
    }
}

/// A build session: meshes and materials accumulate through
/// [`add_mesh`](Self::add_mesh), then [`generate`](Self::generate) charts,
/// unwraps and packs all of them into one atlas.
///
/// `M` is the caller's material identity (an id, a name, a handle).
#[derive(Debug)]
pub struct AtlasBuilder<M = u64> {
    meshes: Vec<IndexedMesh>,
    materials: MaterialRegistry<M>,
    /// Number of `add_mesh` calls, accepted or not.
    submitted: usize,
    progress: Progress,
}

impl<M> Default for AtlasBuilder<M> {
    fn default() -> Self {
        Self {
            meshes: Vec::new(),
            materials: MaterialRegistry::default(),
            submitted: 0,
            progress: Progress::none(),
        }
    }
}

impl<M: Hash + Eq + Clone> AtlasBuilder<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn set_progress(&mut self, progress: Progress) {
        self.progress = progress;
    }

    /// Validate and append one mesh.
    ///
    /// A rejected mesh leaves the session unchanged; its error carries the
    /// ordinal of this call.
    pub fn add_mesh(&mut self, mesh: &InputMesh<M>) -> std::result::Result<MeshIndex, MeshRejected> {
        let ordinal = self.submitted;
        self.submitted += 1;

        match ingestion::ingest_mesh(mesh, ordinal, &mut self.materials) {
            Ok(indexed) => {
                self.meshes.push(indexed);
                Ok(self.meshes.len() - 1)
            }
            Err(e) => {
                warn!(mesh = ordinal, reason = %e.reason, "Mesh rejected");
                Err(e)
            }
        }
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn materials(&self) -> &MaterialRegistry<M> {
        &self.materials
    }

    pub fn stats(&self) -> IngestionStats {
        ingestion::compute_stats(&self.meshes, self.materials.len())
    }

    /// Drop every mesh and material, keeping the progress callback.
    pub fn clear(&mut self) {
        self.meshes.clear();
        self.materials.clear();
        self.submitted = 0;
    }

    /// Chart, unwrap and pack every accepted mesh.
    ///
    /// Does not modify the session, so it can be called again with other
    /// configurations.
    pub fn generate(&self, chart_config: &ChartConfig, pack_config: &PackConfig) -> Result<Atlas> {
        let start = Instant::now();
        let progress = &self.progress;

        if self.meshes.is_empty() {
            warn!("No meshes to atlas");
            return Ok(Atlas {
                meshes: Vec::new(),
                width: 0,
                height: 0,
                pages: Vec::new(),
                chart_count: 0,
                texels_per_unit: 0.0,
                images: Vec::new(),
            });
        }

        progress.report(ProgressPhase::ComputeCharts, 0);
        let charts: Vec<MeshCharts> = self
            .meshes
            .par_iter()
            .map(|mesh| build_charts(mesh, chart_config))
            .collect();
        progress.report(ProgressPhase::ComputeCharts, 100);
        info!(
            meshes = self.meshes.len(),
            charts = charts.iter().map(|c| c.charts.len()).sum::<usize>(),
            "Charts computed"
        );

        progress.report(ProgressPhase::ParameterizeCharts, 0);
        let options = UnwrapOptions {
            use_input_mesh_uvs: chart_config.use_input_mesh_uvs,
            rotate_to_axis: pack_config.rotate_charts_to_axis,
        };
        let chart_uvs = parameterize_all(&self.meshes, &charts, &options);
        progress.report(ProgressPhase::ParameterizeCharts, 100);
        let count = |method: UnwrapMethod| chart_uvs.iter().filter(|c| c.method == method).count();
        info!(
            charts = chart_uvs.len(),
            lscm = count(UnwrapMethod::Lscm),
            planar = count(UnwrapMethod::Planar),
            projection = count(UnwrapMethod::Projection),
            input_uvs = count(UnwrapMethod::InputUvs) + count(UnwrapMethod::Fixed),
            "Charts parameterized"
        );

        let packed = pack_charts(&chart_uvs, pack_config, progress)?;
        info!(
            width = packed.width,
            height = packed.height,
            pages = packed.pages.len(),
            texels_per_unit = packed.texels_per_unit,
            "Charts packed"
        );

        progress.report(ProgressPhase::BuildOutputMeshes, 0);
        let meshes = extract_meshes(&self.meshes, &chart_uvs, &packed, progress)?;

        info!(elapsed = ?start.elapsed(), "Atlas generated");
        Ok(Atlas {
            meshes,
            width: packed.width,
            height: packed.height,
            pages: packed.pages,
            chart_count: chart_uvs.len(),
            texels_per_unit: packed.texels_per_unit,
            images: packed.images,
        })
    }
}
