use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use glam::Vec3;

use super::topology::MeshTopology;
use crate::config::ChartConfig;

const UNASSIGNED: u32 = u32::MAX;
/// cos(75°): faces bending further away from the chart normal never join it.
const MIN_NORMAL_DOT: f32 = 0.258_819;
/// Relocated seeds prefer faces whose normal is this close to the chart's.
const SEED_NORMAL_DOT: f32 = 0.9;
const COST_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    cost: f32,
    face: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then(self.face.cmp(&other.face))
    }
}

/// Outcome of evaluating one face against a growing chart.
#[derive(Debug, Clone, Copy)]
struct Evaluation {
    cost: f32,
    flip: bool,
    /// Length of the edges the face shares with the chart.
    shared: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct GrownChart {
    pub faces: Vec<u32>,
    pub material: u32,
    normal_sum: Vec3,
    centroid_sum: Vec3,
    area: f32,
    boundary: f32,
    cost: f32,
}

impl GrownChart {
    fn normal(&self) -> Vec3 {
        self.normal_sum.try_normalize().unwrap_or(Vec3::ZERO)
    }

    fn centroid(&self, topo: &MeshTopology) -> Vec3 {
        if self.area > 0.0 {
            self.centroid_sum / self.area
        } else {
            let sum: Vec3 = self
                .faces
                .iter()
                .map(|&f| topo.face_centroid[f as usize])
                .sum();
            sum / self.faces.len() as f32
        }
    }
}

/// A complete assignment of a mesh's faces to charts.
#[derive(Debug, Clone)]
pub(crate) struct Partition {
    pub charts: Vec<GrownChart>,
    pub flipped: Vec<bool>,
    seeds: Vec<u32>,
}

impl Partition {
    /// Sum of annexation costs, plus `max_cost` for every chart seed.
    ///
    /// Opening a chart costs as much as the worst admissible annexation, so
    /// fragmenting a mesh is never free.
    fn total_cost(&self, config: &ChartConfig) -> f32 {
        self.charts
            .iter()
            .map(|c| c.cost + config.max_cost)
            .sum()
    }
}

struct Grower<'a> {
    topo: &'a MeshTopology,
    materials: &'a [u32],
    config: &'a ChartConfig,
    face_chart: Vec<u32>,
    flipped: Vec<bool>,
}

impl<'a> Grower<'a> {
    fn new(topo: &'a MeshTopology, materials: &'a [u32], config: &'a ChartConfig) -> Self {
        let face_count = topo.face_count();
        Self {
            topo,
            materials,
            config,
            face_chart: vec![UNASSIGNED; face_count],
            flipped: vec![false; face_count],
        }
    }

    fn oriented_normal(&self, face: usize, flip: bool) -> Vec3 {
        let n = self.topo.face_normal[face];
        if flip { -n } else { n }
    }

    /// Grow charts from `seeds` in order; a seed already claimed by an
    /// earlier chart is skipped.
    fn run(mut self, seeds: impl IntoIterator<Item = u32>) -> Partition {
        let mut charts = Vec::new();
        let mut used_seeds = Vec::new();
        for seed in seeds {
            if self.face_chart[seed as usize] != UNASSIGNED {
                continue;
            }
            used_seeds.push(seed);
            let chart = self.grow(seed, charts.len() as u32);
            charts.push(chart);
        }
        Partition {
            charts,
            flipped: self.flipped,
            seeds: used_seeds,
        }
    }

    fn grow(&mut self, seed: u32, chart_id: u32) -> GrownChart {
        let s = seed as usize;
        let area = self.topo.face_area[s];
        let mut chart = GrownChart {
            faces: vec![seed],
            material: self.materials[s],
            normal_sum: self.topo.face_normal[s] * area,
            centroid_sum: self.topo.face_centroid[s] * area,
            area,
            boundary: self.topo.perimeter(s),
            cost: 0.0,
        };
        self.face_chart[s] = chart_id;

        // Degenerate seeds stay singletons
        if self.topo.is_degenerate(s) {
            return chart;
        }

        let mut heap = BinaryHeap::new();
        self.push_neighbors(&chart, chart_id, s, &mut heap);

        while let Some(Reverse(candidate)) = heap.pop() {
            let Some(eval) = self.evaluate(&chart, chart_id, candidate.face as usize) else {
                continue;
            };
            // The chart changed since this entry was queued
            if eval.cost > candidate.cost + COST_EPSILON {
                heap.push(Reverse(Candidate {
                    cost: eval.cost,
                    face: candidate.face,
                }));
                continue;
            }

            let f = candidate.face as usize;
            let face_area = self.topo.face_area[f];
            self.face_chart[f] = chart_id;
            self.flipped[f] = eval.flip;
            chart.faces.push(candidate.face);
            chart.normal_sum += self.oriented_normal(f, eval.flip) * face_area;
            chart.centroid_sum += self.topo.face_centroid[f] * face_area;
            chart.area += face_area;
            chart.boundary += self.topo.perimeter(f) - 2.0 * eval.shared;
            chart.cost += eval.cost;

            self.push_neighbors(&chart, chart_id, f, &mut heap);
        }

        chart
    }

    fn push_neighbors(
        &self,
        chart: &GrownChart,
        chart_id: u32,
        face: usize,
        heap: &mut BinaryHeap<Reverse<Candidate>>,
    ) {
        for n in self.topo.neighbors[face].iter().flatten() {
            if let Some(eval) = self.evaluate(chart, chart_id, *n as usize) {
                heap.push(Reverse(Candidate {
                    cost: eval.cost,
                    face: *n,
                }));
            }
        }
    }

    /// Growth cost of adding `face` to `chart`, or `None` when inadmissible.
    fn evaluate(&self, chart: &GrownChart, chart_id: u32, face: usize) -> Option<Evaluation> {
        let topo = self.topo;
        let config = self.config;

        if self.face_chart[face] != UNASSIGNED
            || self.materials[face] != chart.material
            || topo.is_degenerate(face)
        {
            return None;
        }

        let mut shared = 0.0;
        let mut normal_seam = 0.0;
        let mut texture_seam = 0.0;
        let mut flip = None;
        for e in 0..3 {
            let Some(n) = topo.neighbors[face][e] else {
                continue;
            };
            if self.face_chart[n as usize] != chart_id {
                continue;
            }
            if config.use_input_mesh_uvs && topo.texture_seam[face][e] {
                return None;
            }
            let needs_flip = topo.same_direction[face][e] ^ self.flipped[n as usize];
            match flip {
                None => flip = Some(needs_flip),
                Some(f) if f != needs_flip => return None,
                Some(_) => {}
            }

            let len = topo.edge_length[face][e];
            shared += len;
            normal_seam += len * topo.normal_seam[face][e];
            if topo.texture_seam[face][e] {
                texture_seam += len;
            }
        }

        let flip = flip?;
        if flip && !config.fix_winding {
            return None;
        }

        let dot = chart.normal().dot(self.oriented_normal(face, flip));
        if dot < MIN_NORMAL_DOT {
            return None;
        }

        let face_area = topo.face_area[face];
        let perimeter = topo.perimeter(face);
        let new_area = chart.area + face_area;
        let new_boundary = chart.boundary + perimeter - 2.0 * shared;
        if config.max_chart_area > 0.0 && new_area > config.max_chart_area {
            return None;
        }
        if config.max_boundary_length > 0.0 && new_boundary > config.max_boundary_length {
            return None;
        }

        let roundness = if chart.area > 0.0 && new_boundary > 0.0 {
            let old = chart.boundary * chart.boundary / chart.area;
            let new = new_boundary * new_boundary / new_area;
            1.0 - old / new
        } else {
            0.0
        };

        let outside = perimeter - shared;
        let straightness = ((outside - shared) / perimeter).min(0.0);

        let (normal_seam, texture_seam) = if shared > 0.0 {
            (normal_seam / shared, texture_seam / shared)
        } else {
            (0.0, 0.0)
        };

        let cost = config.normal_deviation_weight * (1.0 - dot).min(1.0)
            + config.roundness_weight * roundness
            + config.straightness_weight * straightness
            + config.normal_seam_weight * normal_seam
            + config.texture_seam_weight * texture_seam;

        if !cost.is_finite() || cost > config.max_cost {
            return None;
        }

        Some(Evaluation {
            cost,
            flip,
            shared,
        })
    }
}

/// Partition all faces of a mesh into charts.
///
/// Seeds start at the largest faces; each further iteration moves every seed
/// to the face nearest its chart's centroid and regrows the mesh, keeping the
/// cheapest partition.
pub(crate) fn grow_charts(
    topo: &MeshTopology,
    materials: &[u32],
    config: &ChartConfig,
) -> Partition {
    let mut by_area: Vec<u32> = (0..topo.face_count() as u32).collect();
    by_area.sort_by(|&a, &b| {
        topo.face_area[b as usize]
            .total_cmp(&topo.face_area[a as usize])
            .then(a.cmp(&b))
    });

    let mut best = Grower::new(topo, materials, config).run(by_area.iter().copied());
    let mut best_cost = best.total_cost(config);
    let mut current = best.clone();

    for _ in 1..config.max_iterations.max(1) {
        let seeds = relocate_seeds(topo, &current);
        if seeds == current.seeds {
            break;
        }

        current = Grower::new(topo, materials, config)
            .run(seeds.iter().copied().chain(by_area.iter().copied()));
        let cost = current.total_cost(config);
        if cost < best_cost || (cost == best_cost && current.charts.len() < best.charts.len()) {
            best = current.clone();
            best_cost = cost;
        }
    }

    best
}

fn relocate_seeds(topo: &MeshTopology, partition: &Partition) -> Vec<u32> {
    partition
        .charts
        .iter()
        .map(|chart| {
            let centroid = chart.centroid(topo);
            let normal = chart.normal();
            let distance = |f: u32| topo.face_centroid[f as usize].distance_squared(centroid);
            let aligned = |f: &u32| {
                let n = topo.face_normal[*f as usize];
                let n = if partition.flipped[*f as usize] { -n } else { n };
                n.dot(normal) >= SEED_NORMAL_DOT
            };
            let nearest = |faces: &mut dyn Iterator<Item = u32>| {
                faces.min_by(|&a, &b| distance(a).total_cmp(&distance(b)).then(a.cmp(&b)))
            };

            nearest(&mut chart.faces.iter().copied().filter(aligned))
                .or_else(|| nearest(&mut chart.faces.iter().copied()))
                .unwrap_or(chart.faces[0])
        })
        .collect()
}
