//! Chart construction.
//!
//! Raw meshes are partitioned by greedy region growing: every chart starts
//! at a seed face and repeatedly annexes the cheapest neighboring face, where
//! the cost combines normal deviation, chart roundness, boundary straightness
//! and the seams crossed. Pre-unwrapped meshes are split into their UV islands.
//! Charts never cross material boundaries.

mod grow;
mod islands;
pub mod topology;

use tracing::debug;

use crate::config::ChartConfig;
use crate::types::{IndexedMesh, MeshKind};
pub use topology::MeshTopology;

/// A set of faces of one mesh that is unwrapped as one piece.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    /// Face indices into the owning mesh.
    pub faces: Vec<u32>,
    /// Dense material index shared by every face.
    pub material: u32,
    /// The chart keeps its input UVs (pre-unwrapped island).
    pub fixed: bool,
}

/// The charts of one mesh.
#[derive(Debug, Clone)]
pub struct MeshCharts {
    pub charts: Vec<Chart>,
    /// Per face: winding was reversed by the winding fix.
    pub flipped: Vec<bool>,
    pub topology: MeshTopology,
}

impl MeshCharts {
    /// Vertex indices of `face` in output winding order.
    pub fn corners(&self, mesh: &IndexedMesh, face: usize) -> [usize; 3] {
        let [a, b, c] = mesh.triangle(face);
        if self.flipped[face] { [a, c, b] } else { [a, b, c] }
    }

    pub fn face_count(&self) -> usize {
        self.charts.iter().map(|c| c.faces.len()).sum()
    }
}

/// Partition `mesh` into disjoint charts covering every face exactly once.
pub fn build_charts(mesh: &IndexedMesh, config: &ChartConfig) -> MeshCharts {
    let topology = MeshTopology::build(mesh);
    let materials = &mesh.face_materials;

    let (charts, flipped): (Vec<Chart>, Vec<bool>) = match mesh.kind {
        MeshKind::PreUnwrapped => {
            let charts = islands::uv_islands(&topology, materials)
                .into_iter()
                .map(|faces| Chart {
                    material: materials[faces[0] as usize],
                    faces,
                    fixed: true,
                })
                .collect();
            (charts, vec![false; mesh.triangle_count()])
        }
        MeshKind::Raw => {
            let partition = grow::grow_charts(&topology, materials, config);
            let charts = partition
                .charts
                .into_iter()
                .map(|c| Chart {
                    faces: c.faces,
                    material: c.material,
                    fixed: false,
                })
                .collect();
            (charts, partition.flipped)
        }
    };

    debug!(
        faces = mesh.triangle_count(),
        charts = charts.len(),
        flipped = flipped.iter().filter(|&&f| f).count(),
        "Built charts"
    );

    MeshCharts {
        charts,
        flipped,
        topology,
    }
}
