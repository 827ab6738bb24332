//! Chart parameterization.
//!
//! Every chart is flattened into its own UV space measured in world units,
//! so the packer can apply one texel density to all charts. Single triangles
//! are projected exactly; larger charts use LSCM with a projection fallback.

mod lscm;
mod sparse;

use std::collections::HashMap;

use glam::{DVec2, DVec3, Vec2};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::charting::{Chart, MeshCharts};
use crate::types::IndexedMesh;

/// Why an unwrap attempt was discarded.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum UnwrapError {
    #[error("chart has no usable extent")]
    Degenerate,
    #[error("solver did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },
    #[error("triangle {triangle} is flipped or collapsed in UV space")]
    Flipped { triangle: usize },
    #[error("non-finite UV coordinate")]
    NonFinite,
}

/// How a chart's UVs were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnwrapMethod {
    /// Exact projection of a single (or degenerate) triangle.
    Planar,
    Lscm,
    /// Orthogonal projection onto the chart's average plane.
    Projection,
    /// The mesh's own UVs, used as a hint.
    InputUvs,
    /// Pre-unwrapped island.
    Fixed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnwrapOptions {
    pub use_input_mesh_uvs: bool,
    pub rotate_to_axis: bool,
}

/// A chart flattened into its own UV space.
#[derive(Debug, Clone)]
pub struct ChartUv {
    /// Dense index of the owning mesh.
    pub mesh: u32,
    pub faces: Vec<u32>,
    pub material: u32,
    /// Distinct mesh vertices used by the chart.
    pub vertices: Vec<u32>,
    /// UV of each entry of `vertices`, in world units, with the minimum corner at the origin.
    pub uvs: Vec<Vec2>,
    /// Per face, indices into `vertices` in output winding order.
    pub triangles: Vec<[u32; 3]>,
    /// 3D surface area.
    pub area: f32,
    pub method: UnwrapMethod,
}

impl ChartUv {
    /// Extent of the UV bounding box.
    pub fn size(&self) -> Vec2 {
        self.uvs.iter().fold(Vec2::ZERO, |acc, &uv| acc.max(uv))
    }

    /// Unsigned area covered in UV space.
    pub fn uv_area(&self) -> f32 {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|v| self.uvs[v as usize]);
                (b - a).perp_dot(c - a).abs() * 0.5
            })
            .sum()
    }
}

/// Chart-local view of the geometry: distinct mesh vertices and the welded
/// solver vertices they map onto.
struct ChartGeometry {
    vertices: Vec<u32>,
    triangles: Vec<[u32; 3]>,
    /// Welded vertex of each local vertex.
    welded: Vec<u32>,
    welded_positions: Vec<DVec3>,
    welded_triangles: Vec<[u32; 3]>,
    area: f64,
}

impl ChartGeometry {
    fn new(mesh: &IndexedMesh, charts: &MeshCharts, faces: &[u32]) -> Self {
        let canonical = &charts.topology.canonical;
        let mut local_of: HashMap<u32, u32> = HashMap::new();
        let mut welded_of: HashMap<u32, u32> = HashMap::new();
        let mut vertices = Vec::new();
        let mut welded = Vec::new();
        let mut welded_positions = Vec::new();

        let triangles: Vec<[u32; 3]> = faces
            .iter()
            .map(|&f| {
                charts.corners(mesh, f as usize).map(|v| {
                    *local_of.entry(v as u32).or_insert_with(|| {
                        let next_weld = welded_positions.len() as u32;
                        let w = *welded_of.entry(canonical[v]).or_insert_with(|| {
                            welded_positions.push(mesh.position(v).as_dvec3());
                            next_weld
                        });
                        vertices.push(v as u32);
                        welded.push(w);
                        vertices.len() as u32 - 1
                    })
                })
            })
            .collect();

        let welded_triangles = triangles
            .iter()
            .map(|t| t.map(|l| welded[l as usize]))
            .collect();
        let area = faces
            .iter()
            .map(|&f| mesh.face_area(f as usize) as f64)
            .sum();

        Self {
            vertices,
            triangles,
            welded,
            welded_positions,
            welded_triangles,
            area,
        }
    }

    fn local_from_welded(&self, welded_uvs: &[DVec2]) -> Vec<DVec2> {
        self.welded.iter().map(|&w| welded_uvs[w as usize]).collect()
    }

    fn input_uvs(&self, mesh: &IndexedMesh) -> Vec<DVec2> {
        self.vertices
            .iter()
            .map(|&v| mesh.uv(v as usize).as_dvec2())
            .collect()
    }

    /// Exact projection of a single triangle with its first edge on the u axis.
    fn planar(&self) -> Vec<DVec2> {
        let t = self.welded_triangles[0];
        let [p0, p1, p2] = t.map(|w| self.welded_positions[w as usize]);
        let e1 = p1 - p0;
        let e2 = p2 - p0;
        let normal = e1.cross(e2);

        let welded_uvs: Vec<DVec2> = match (e1.try_normalize(), normal.try_normalize()) {
            (Some(u_axis), Some(n)) => {
                let v_axis = n.cross(u_axis);
                self.welded_positions
                    .iter()
                    .map(|&p| DVec2::new((p - p0).dot(u_axis), (p - p0).dot(v_axis)))
                    .collect()
            }
            _ => {
                // Collapsed triangle: lay it out along its longest edge
                let axis = [e1, e2, p2 - p1]
                    .into_iter()
                    .max_by(|a, b| a.length_squared().total_cmp(&b.length_squared()))
                    .and_then(|e| e.try_normalize())
                    .unwrap_or(DVec3::X);
                self.welded_positions
                    .iter()
                    .map(|&p| DVec2::new((p - p0).dot(axis), 0.0))
                    .collect()
            }
        };
        self.local_from_welded(&welded_uvs)
    }

    /// Orthogonal projection onto the plane of the area-weighted chart normal.
    fn projection(&self) -> Result<Vec<DVec2>, UnwrapError> {
        let normal: DVec3 = self
            .welded_triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|w| self.welded_positions[w as usize]);
                (b - a).cross(c - a)
            })
            .sum();
        let n = normal.try_normalize().ok_or(UnwrapError::Degenerate)?;
        let u_axis = n.any_orthonormal_vector();
        let v_axis = n.cross(u_axis);
        let welded_uvs: Vec<DVec2> = self
            .welded_positions
            .iter()
            .map(|&p| DVec2::new(p.dot(u_axis), p.dot(v_axis)))
            .collect();
        Ok(self.local_from_welded(&welded_uvs))
    }

    fn lscm(&self) -> Result<Vec<DVec2>, UnwrapError> {
        let initial = self.projection().ok().map(|local| {
            let mut welded_uvs = vec![DVec2::ZERO; self.welded_positions.len()];
            for (l, &w) in self.welded.iter().enumerate() {
                welded_uvs[w as usize] = local[l];
            }
            welded_uvs
        });
        let welded_uvs = lscm::lscm(
            &self.welded_positions,
            &self.welded_triangles,
            initial.as_deref(),
        )?;
        Ok(self.local_from_welded(&welded_uvs))
    }
}

fn signed_area(uvs: &[DVec2], t: [u32; 3]) -> f64 {
    let [a, b, c] = t.map(|v| uvs[v as usize]);
    (b - a).perp_dot(c - a) * 0.5
}

/// Check that `uvs` lays out every triangle with one orientation.
///
/// A mirrored layout (majority negative) is reflected in place.
fn validate(uvs: &mut [DVec2], triangles: &[[u32; 3]]) -> Result<(), UnwrapError> {
    if uvs.iter().any(|uv| !uv.is_finite()) {
        return Err(UnwrapError::NonFinite);
    }
    let total: f64 = triangles.iter().map(|&t| signed_area(uvs, t)).sum();
    if total < 0.0 {
        for uv in uvs.iter_mut() {
            uv.x = -uv.x;
        }
    }
    match triangles.iter().position(|&t| signed_area(uvs, t) <= 0.0) {
        Some(triangle) => Err(UnwrapError::Flipped { triangle }),
        None => Ok(()),
    }
}

/// Uniformly scale `uvs` so their area matches the chart's 3D area.
fn scale_to_area(uvs: &mut [DVec2], triangles: &[[u32; 3]], area: f64) {
    let uv_area: f64 = triangles
        .iter()
        .map(|&t| signed_area(uvs, t).abs())
        .sum();
    if uv_area > 1e-30 && area > 1e-30 {
        let s = (area / uv_area).sqrt();
        for uv in uvs.iter_mut() {
            *uv *= s;
        }
    }
}

/// Andrew's monotone chain; counter-clockwise hull without collinear points.
fn convex_hull(points: &[DVec2]) -> Vec<DVec2> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let cross = |o: DVec2, a: DVec2, b: DVec2| (a - o).perp_dot(b - o);
    let chain = |points: &mut dyn Iterator<Item = DVec2>| {
        let mut out: Vec<DVec2> = Vec::new();
        for p in points {
            while out.len() >= 2 && cross(out[out.len() - 2], out[out.len() - 1], p) <= 0.0 {
                out.pop();
            }
            out.push(p);
        }
        out.pop();
        out
    };

    let mut hull = chain(&mut pts.iter().copied());
    hull.extend(chain(&mut pts.iter().rev().copied()));
    hull
}

/// Rotate `uvs` so the minimum-area bounding rectangle is axis aligned with
/// its longer side along u.
fn align_to_axis(uvs: &mut [DVec2]) {
    let hull = convex_hull(uvs);
    if hull.len() < 3 {
        // Collinear: align the segment with u
        if let [a, b, ..] = hull.as_slice() {
            let dir = (*b - *a).normalize_or_zero();
            if dir != DVec2::ZERO {
                let rot = DVec2::new(dir.x, -dir.y);
                for uv in uvs.iter_mut() {
                    *uv = rot.rotate(*uv);
                }
            }
        }
        return;
    }

    let mut best: Option<(f64, DVec2)> = None;
    for i in 0..hull.len() {
        let Some(dir) = (hull[(i + 1) % hull.len()] - hull[i]).try_normalize() else {
            continue;
        };
        // Rotation taking `dir` onto +u
        let rot = DVec2::new(dir.x, -dir.y);
        let (min, max) = hull.iter().fold(
            (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY)),
            |(lo, hi), &p| {
                let q = rot.rotate(p);
                (lo.min(q), hi.max(q))
            },
        );
        let area = (max - min).element_product();
        if best.is_none_or(|(a, _)| area < a) {
            let extent = max - min;
            // Quarter turn so the long side is horizontal
            let rot = if extent.y > extent.x {
                DVec2::new(rot.y, -rot.x)
            } else {
                rot
            };
            best = Some((area, rot));
        }
    }

    if let Some((_, rot)) = best {
        for uv in uvs.iter_mut() {
            *uv = rot.rotate(*uv);
        }
    }
}

/// Translate so the minimum corner sits at the origin.
fn normalize_origin(uvs: &mut [DVec2]) {
    let min = uvs
        .iter()
        .fold(DVec2::splat(f64::INFINITY), |acc, &uv| acc.min(uv));
    if min.is_finite() {
        for uv in uvs.iter_mut() {
            *uv -= min;
        }
    }
}

fn finish(
    mesh_index: u32,
    geometry: ChartGeometry,
    faces: Vec<u32>,
    material: u32,
    mut uvs: Vec<DVec2>,
    method: UnwrapMethod,
    options: &UnwrapOptions,
) -> ChartUv {
    if method != UnwrapMethod::Planar {
        scale_to_area(&mut uvs, &geometry.triangles, geometry.area);
    }
    if options.rotate_to_axis {
        align_to_axis(&mut uvs);
    }
    normalize_origin(&mut uvs);

    ChartUv {
        mesh: mesh_index,
        faces,
        material,
        vertices: geometry.vertices,
        uvs: uvs.into_iter().map(|uv| uv.as_vec2()).collect(),
        triangles: geometry.triangles,
        area: geometry.area as f32,
        method,
    }
}

/// Flatten one chart. Returns more than one chart when the chart had to be
/// split into single triangles.
pub fn parameterize_chart(
    mesh_index: u32,
    mesh: &IndexedMesh,
    charts: &MeshCharts,
    chart: &Chart,
    options: &UnwrapOptions,
) -> Vec<ChartUv> {
    let geometry = ChartGeometry::new(mesh, charts, &chart.faces);
    let done = |geometry, uvs, method| {
        vec![finish(
            mesh_index,
            geometry,
            chart.faces.clone(),
            chart.material,
            uvs,
            method,
            options,
        )]
    };

    if chart.fixed {
        let uvs = geometry.input_uvs(mesh);
        return done(geometry, uvs, UnwrapMethod::Fixed);
    }

    if options.use_input_mesh_uvs {
        let mut uvs = geometry.input_uvs(mesh);
        match validate(&mut uvs, &geometry.triangles) {
            Ok(()) => return done(geometry, uvs, UnwrapMethod::InputUvs),
            Err(e) => debug!(mesh = mesh_index, faces = chart.faces.len(), "Input UVs rejected: {e}"),
        }
    }

    if chart.faces.len() == 1 || geometry.area < 1e-12 {
        if chart.faces.len() == 1 {
            let uvs = geometry.planar();
            return done(geometry, uvs, UnwrapMethod::Planar);
        }
        return split(mesh_index, mesh, charts, chart, options);
    }

    let lscm = geometry.lscm().and_then(|mut uvs| {
        validate(&mut uvs, &geometry.triangles)?;
        Ok(uvs)
    });
    match lscm {
        Ok(uvs) => return done(geometry, uvs, UnwrapMethod::Lscm),
        Err(e) => debug!(mesh = mesh_index, faces = chart.faces.len(), "LSCM rejected: {e}"),
    }

    let projection = geometry.projection().and_then(|mut uvs| {
        validate(&mut uvs, &geometry.triangles)?;
        Ok(uvs)
    });
    match projection {
        Ok(uvs) => done(geometry, uvs, UnwrapMethod::Projection),
        Err(e) => {
            warn!(
                mesh = mesh_index,
                faces = chart.faces.len(),
                "Chart could not be flattened ({e}); splitting into triangles"
            );
            split(mesh_index, mesh, charts, chart, options)
        }
    }
}

fn split(
    mesh_index: u32,
    mesh: &IndexedMesh,
    charts: &MeshCharts,
    chart: &Chart,
    options: &UnwrapOptions,
) -> Vec<ChartUv> {
    chart
        .faces
        .iter()
        .map(|&f| {
            let geometry = ChartGeometry::new(mesh, charts, &[f]);
            let uvs = geometry.planar();
            finish(
                mesh_index,
                geometry,
                vec![f],
                chart.material,
                uvs,
                UnwrapMethod::Planar,
                options,
            )
        })
        .collect()
}

/// Flatten every chart of every mesh, in parallel across charts.
///
/// Output order is mesh order, then chart order.
pub fn parameterize_all(
    meshes: &[IndexedMesh],
    charts: &[MeshCharts],
    options: &UnwrapOptions,
) -> Vec<ChartUv> {
    let jobs: Vec<(usize, &Chart)> = charts
        .iter()
        .enumerate()
        .flat_map(|(m, mc)| mc.charts.iter().map(move |c| (m, c)))
        .collect();

    jobs.par_iter()
        .map(|&(m, chart)| parameterize_chart(m as u32, &meshes[m], &charts[m], chart, options))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charting::build_charts;
    use crate::config::ChartConfig;
    use crate::testing;
    use crate::types::MeshKind;
    use approx::assert_relative_eq;

    fn unwrap_mesh(mesh: &IndexedMesh, options: UnwrapOptions) -> Vec<ChartUv> {
        let charts = build_charts(mesh, &ChartConfig::default());
        parameterize_all(std::slice::from_ref(mesh), &[charts], &options)
    }

    fn assert_positive(chart: &ChartUv) {
        for t in &chart.triangles {
            let [a, b, c] = t.map(|v| chart.uvs[v as usize]);
            assert!((b - a).perp_dot(c - a) > 0.0, "triangle flipped in {:?}", chart.method);
        }
    }

    #[test]
    fn single_triangle_is_exact() {
        let mesh = testing::single_triangle();
        let charts = unwrap_mesh(&mesh, UnwrapOptions::default());
        assert_eq!(charts.len(), 1);
        let chart = &charts[0];
        assert_eq!(chart.method, UnwrapMethod::Planar);
        assert_eq!(chart.vertices, vec![0, 1, 2]);
        assert_relative_eq!(chart.uvs[0].distance(chart.uvs[1]), 1.0, epsilon = 1e-6);
        assert_relative_eq!(chart.uvs[0].distance(chart.uvs[2]), 1.0, epsilon = 1e-6);
        assert_relative_eq!(chart.uv_area(), 0.5, epsilon = 1e-6);
        assert_positive(chart);
    }

    #[test]
    fn grid_unwraps_with_world_area() {
        let mesh = testing::grid(4, 3, 0.5);
        let charts = unwrap_mesh(&mesh, UnwrapOptions::default());
        assert_eq!(charts.len(), 1);
        let chart = &charts[0];
        assert_eq!(chart.method, UnwrapMethod::Lscm);
        assert_relative_eq!(chart.uv_area(), 3.0, max_relative = 1e-4);
        assert_relative_eq!(chart.area, 3.0, max_relative = 1e-5);
        assert_positive(chart);

        let min = chart.uvs.iter().fold(Vec2::splat(f32::MAX), |a, &b| a.min(b));
        assert!(min.abs_diff_eq(Vec2::ZERO, 1e-6));
    }

    #[test]
    fn rotate_to_axis_aligns_bounding_box() {
        // A 4 x 1 strip rotated 30 degrees in its plane
        let mut mesh = testing::grid(4, 1, 1.0);
        let (s, c) = 30f32.to_radians().sin_cos();
        for p in mesh.positions.chunks_mut(3) {
            let (x, y) = (p[0], p[1]);
            p[0] = c * x - s * y;
            p[1] = s * x + c * y;
        }
        let options = UnwrapOptions {
            rotate_to_axis: true,
            ..Default::default()
        };
        let charts = unwrap_mesh(&mesh, options);
        let size = charts[0].size();
        assert_relative_eq!(size.x, 4.0, max_relative = 1e-3);
        assert_relative_eq!(size.y, 1.0, max_relative = 1e-3);
        assert_positive(&charts[0]);
    }

    #[test]
    fn cube_sides_unwrap_separately() {
        let mesh = testing::cube();
        let charts = unwrap_mesh(&mesh, UnwrapOptions::default());
        assert_eq!(charts.len(), 6);
        for chart in &charts {
            assert_relative_eq!(chart.uv_area(), 1.0, max_relative = 1e-4);
            assert_positive(chart);
        }
    }

    #[test]
    fn fixed_islands_keep_their_shape() {
        let mut mesh = testing::grid(2, 2, 2.0);
        mesh.kind = MeshKind::PreUnwrapped;
        let charts = unwrap_mesh(&mesh, UnwrapOptions::default());
        assert_eq!(charts.len(), 1);
        let chart = &charts[0];
        assert_eq!(chart.method, UnwrapMethod::Fixed);
        // UVs span [0,1]^2 on a 4x4 surface: rescaled by 4
        assert_relative_eq!(chart.size().x, 4.0, max_relative = 1e-5);
        assert_relative_eq!(chart.size().y, 4.0, max_relative = 1e-5);
    }

    #[test]
    fn input_uvs_are_adopted_when_valid() {
        let mesh = testing::grid(2, 2, 1.0);
        let options = UnwrapOptions {
            use_input_mesh_uvs: true,
            ..Default::default()
        };
        let charts = unwrap_mesh(&mesh, options);
        assert_eq!(charts[0].method, UnwrapMethod::InputUvs);
        assert_relative_eq!(charts[0].uv_area(), 4.0, max_relative = 1e-5);
    }

    #[test]
    fn flipped_input_uvs_fall_back_to_lscm() {
        let mut mesh = testing::grid(2, 1, 1.0);
        // Fold vertex 1's UV across its neighbors
        mesh.uvs[2] = 2.0;
        mesh.uvs[3] = 0.5;
        let options = UnwrapOptions {
            use_input_mesh_uvs: true,
            ..Default::default()
        };
        let charts = unwrap_mesh(&mesh, options);
        assert_eq!(charts[0].method, UnwrapMethod::Lscm);
        assert_positive(&charts[0]);
    }

    #[test]
    fn validate_reflects_mirrored_layout() {
        let mut uvs = vec![DVec2::new(0.0, 0.0), DVec2::new(0.0, 1.0), DVec2::new(1.0, 0.0)];
        validate(&mut uvs, &[[0, 1, 2]]).unwrap();
        assert!(signed_area(&uvs, [0, 1, 2]) > 0.0);

        let mut bad = vec![DVec2::ZERO, DVec2::X, DVec2::new(2.0, 0.0)];
        assert_eq!(
            validate(&mut bad, &[[0, 1, 2]]),
            Err(UnwrapError::Flipped { triangle: 0 })
        );

        let mut nan = vec![DVec2::ZERO, DVec2::X, DVec2::new(f64::NAN, 0.0)];
        assert_eq!(validate(&mut nan, &[[0, 1, 2]]), Err(UnwrapError::NonFinite));
    }

    #[test]
    fn convex_hull_of_square_with_interior_point() {
        let pts = [
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(0.5, 0.5),
            DVec2::new(1.0, 1.0),
            DVec2::new(0.0, 1.0),
            DVec2::new(0.5, 0.0),
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&DVec2::new(0.5, 0.5)));
    }
}
