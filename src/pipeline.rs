use std::fs;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::atlas::AtlasBuilder;
use crate::config::RunConfig;
use crate::error::{AtlasError, Result};
use crate::ingestion::obj_loader::{self, ObjObject};
use crate::output::{self, AtlasSummary, ObjOutput, RejectedSummary};

/// Summary of a completed run.
#[derive(Debug)]
pub struct ProcessingResult {
    pub accepted: usize,
    pub rejected: usize,
    pub chart_count: usize,
    pub page_count: usize,
    pub width: u32,
    pub height: u32,
    pub duration: Duration,
}

/// Command-line driver: OBJ in, atlased OBJ + JSON summary (+ PNG pages) out.
pub struct Pipeline;

impl Pipeline {
    pub fn run(config: &RunConfig) -> Result<ProcessingResult> {
        let start = Instant::now();
        info!(input = %config.input.display(), "Starting atlas run");

        info!("Stage 1/3: Loading");
        let objects = obj_loader::load_obj(&config.input)?;
        if objects.is_empty() {
            return Err(AtlasError::Input(format!(
                "{} contains no objects",
                config.input.display()
            )));
        }

        info!("Stage 2/3: Atlasing");
        let mut builder: AtlasBuilder<String> = AtlasBuilder::new();
        let mut accepted: Vec<&ObjObject> = Vec::new();
        let mut rejected = Vec::new();
        for object in &objects {
            let added = match &object.mesh {
                Ok(mesh) if config.pre_unwrapped => {
                    builder.add_mesh(&mesh.clone().pre_unwrapped()).map_err(|e| e.reason)
                }
                Ok(mesh) => builder.add_mesh(mesh).map_err(|e| e.reason),
                Err(reason) => Err(reason.clone()),
            };
            match added {
                Ok(_) => accepted.push(object),
                Err(reason) => {
                    warn!(object = %object.name, %reason, "Skipping object");
                    rejected.push(RejectedSummary {
                        name: object.name.clone(),
                        reason: reason.to_string(),
                    });
                }
            }
        }
        if accepted.is_empty() {
            return Err(AtlasError::Input("every object was rejected".into()));
        }

        let stats = builder.stats();
        info!(
            meshes = stats.total_meshes,
            vertices = stats.total_vertices,
            triangles = stats.total_triangles,
            materials = stats.material_count,
            "Meshes ingested"
        );

        let atlas = builder.generate(&config.chart, &config.pack)?;

        info!("Stage 3/3: Writing output");
        fs::create_dir_all(&config.output)?;
        let outputs: Vec<ObjOutput<'_>> = accepted
            .iter()
            .zip(&atlas.meshes)
            .map(|(object, mesh)| ObjOutput {
                name: &object.name,
                positions: &object.positions,
                normals: &object.normals,
                mesh,
            })
            .collect();
        output::write_obj_file(&config.output.join("atlas.obj"), &outputs)?;

        let names: Vec<String> = accepted.iter().map(|o| o.name.clone()).collect();
        let rejected_count = rejected.len();
        let summary = AtlasSummary::new(&atlas, &names, rejected);
        output::write_summary(&summary, &config.output.join("atlas.json"))?;
        output::write_page_images(&atlas.images, &config.output)?;

        let duration = start.elapsed();
        info!(
            charts = atlas.chart_count,
            pages = atlas.page_count(),
            width = atlas.width,
            height = atlas.height,
            elapsed = ?duration,
            "Atlas run complete"
        );

        Ok(ProcessingResult {
            accepted: accepted.len(),
            rejected: rejected_count,
            chart_count: atlas.chart_count,
            page_count: atlas.page_count(),
            width: atlas.width,
            height: atlas.height,
            duration,
        })
    }
}
