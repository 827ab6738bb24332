//! Least Squares Conformal Maps (LSCM).
//!
//! Minimizes the conformal energy of a triangulated disk with two pinned
//! vertices. The pinned unknowns are eliminated, leaving a symmetric positive
//! definite system over the free `u` and `v` coordinates.
//!
//! Lévy, Petitjean, Ray, Maillot (2002). "Least squares conformal maps for
//! automatic texture atlas generation." ACM SIGGRAPH.

use std::collections::HashMap;

use glam::{DVec2, DVec3};

use super::UnwrapError;
use super::sparse::{CsrMatrix, conjugate_gradient};

const TOLERANCE: f64 = 1e-10;

/// A vertex held at a fixed UV.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PinnedVertex {
    pub vertex: usize,
    pub uv: DVec2,
}

/// Conformal parameterization of `triangles` over `positions`.
///
/// `initial` is an optional starting guess (any similarity transform of a
/// good layout works; it is aligned to the pins first).
pub(crate) fn lscm(
    positions: &[DVec3],
    triangles: &[[u32; 3]],
    initial: Option<&[DVec2]>,
) -> Result<Vec<DVec2>, UnwrapError> {
    let n = positions.len();
    if n < 3 || triangles.is_empty() {
        return Err(UnwrapError::Degenerate);
    }

    let mut candidates = find_boundary_vertices(triangles, n);
    if candidates.is_empty() {
        candidates = (0..n).collect();
    }
    let (pin0, pin1) = select_pins(positions, &candidates).ok_or(UnwrapError::Degenerate)?;

    // Free vertex -> solver slot; u at slot, v at slot + free_count
    let mut slot = vec![usize::MAX; n];
    let mut free_count = 0;
    for (v, s) in slot.iter_mut().enumerate() {
        if v != pin0.vertex && v != pin1.vertex {
            *s = free_count;
            free_count += 1;
        }
    }
    let pinned = |v: usize| -> Option<DVec2> {
        if v == pin0.vertex {
            Some(pin0.uv)
        } else if v == pin1.vertex {
            Some(pin1.uv)
        } else {
            None
        }
    };

    let dim = 2 * free_count;
    let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(triangles.len() * 36);
    let mut rhs = vec![0.0; dim];

    for tri in triangles {
        let Some(coeffs) = gradient_coefficients(tri.map(|v| positions[v as usize])) else {
            continue;
        };
        let (grads, area) = coeffs;

        for (a, ga) in tri.iter().zip(&grads) {
            let a = *a as usize;
            if pinned(a).is_some() {
                continue;
            }
            let row_u = slot[a];
            let row_v = slot[a] + free_count;

            for (b, gb) in tri.iter().zip(&grads) {
                let b = *b as usize;
                let uu = ga.dot(*gb) * area;
                let uv = (ga.y * gb.x - ga.x * gb.y) * area;

                match pinned(b) {
                    Some(fixed) => {
                        // Known column moves to the right-hand side
                        rhs[row_u] -= uu * fixed.x + uv * fixed.y;
                        rhs[row_v] -= -uv * fixed.x + uu * fixed.y;
                    }
                    None => {
                        let col_u = slot[b];
                        let col_v = slot[b] + free_count;
                        triplets.push((row_u, col_u, uu));
                        triplets.push((row_v, col_v, uu));
                        triplets.push((row_u, col_v, uv));
                        triplets.push((row_v, col_u, -uv));
                    }
                }
            }
        }
    }

    let matrix = CsrMatrix::from_triplets(dim, dim, triplets);

    let mut x0 = vec![0.0; dim];
    if let Some(initial) = initial {
        let aligned = align_to_pins(initial, pin0, pin1);
        for (v, uv) in aligned.iter().enumerate() {
            if slot[v] != usize::MAX {
                x0[slot[v]] = uv.x;
                x0[slot[v] + free_count] = uv.y;
            }
        }
    }

    let max_iter = 2 * dim + 100;
    let solution = conjugate_gradient(&matrix, &rhs, x0, max_iter, TOLERANCE)?;

    Ok((0..n)
        .map(|v| {
            pinned(v).unwrap_or_else(|| {
                DVec2::new(solution[slot[v]], solution[slot[v] + free_count])
            })
        })
        .collect())
}

/// Per-vertex gradient coefficients of a linear function over the triangle,
/// in the triangle's own orthonormal frame, plus its area.
fn gradient_coefficients(p: [DVec3; 3]) -> Option<([DVec2; 3], f64)> {
    let e1 = p[1] - p[0];
    let e2 = p[2] - p[0];
    let normal = e1.cross(e2);
    let area = normal.length() * 0.5;
    let e1_len = e1.length();
    if e1_len < 1e-12 || area < 1e-18 {
        return None;
    }

    let x_axis = e1 / e1_len;
    let y_axis = normal.cross(e1).normalize();
    let q = [
        DVec2::ZERO,
        DVec2::new(e1_len, 0.0),
        DVec2::new(e2.dot(x_axis), e2.dot(y_axis)),
    ];

    let inv_2a = 1.0 / (2.0 * area);
    // Gradient weight of the vertex opposite edge j -> k
    let grad = |j: usize, k: usize| {
        DVec2::new((q[j].y - q[k].y) * inv_2a, (q[k].x - q[j].x) * inv_2a)
    };
    Some(([grad(1, 2), grad(2, 0), grad(0, 1)], area))
}

/// Vertices on edges used by exactly one triangle.
fn find_boundary_vertices(triangles: &[[u32; 3]], n: usize) -> Vec<usize> {
    let mut edge_count: HashMap<(u32, u32), u32> = HashMap::new();
    for tri in triangles {
        for i in 0..3 {
            let (a, b) = (tri[i], tri[(i + 1) % 3]);
            let edge = if a < b { (a, b) } else { (b, a) };
            *edge_count.entry(edge).or_insert(0) += 1;
        }
    }

    let mut is_boundary = vec![false; n];
    for ((a, b), count) in edge_count {
        if count == 1 {
            is_boundary[a as usize] = true;
            is_boundary[b as usize] = true;
        }
    }
    (0..n).filter(|&v| is_boundary[v]).collect()
}

/// The two candidates farthest apart, pinned at (0, 0) and (d, 0).
fn select_pins(positions: &[DVec3], candidates: &[usize]) -> Option<(PinnedVertex, PinnedVertex)> {
    let mut best = (0.0, candidates[0], candidates[0]);
    for (i, &a) in candidates.iter().enumerate() {
        for &b in &candidates[i + 1..] {
            let d = positions[a].distance_squared(positions[b]);
            if d > best.0 {
                best = (d, a, b);
            }
        }
    }

    let (d2, a, b) = best;
    if d2 < 1e-24 {
        return None;
    }
    Some((
        PinnedVertex {
            vertex: a,
            uv: DVec2::ZERO,
        },
        PinnedVertex {
            vertex: b,
            uv: DVec2::new(d2.sqrt(), 0.0),
        },
    ))
}

/// Similarity transform of `uvs` taking the pinned vertices onto their targets.
fn align_to_pins(uvs: &[DVec2], pin0: PinnedVertex, pin1: PinnedVertex) -> Vec<DVec2> {
    let from = uvs[pin1.vertex] - uvs[pin0.vertex];
    let to = pin1.uv - pin0.uv;
    let len2 = from.length_squared();
    if len2 < 1e-24 {
        return uvs.to_vec();
    }
    // Complex division to / from
    let rot = DVec2::new(to.dot(from), to.y * from.x - to.x * from.y) / len2;
    uvs.iter()
        .map(|&uv| pin0.uv + rot.rotate(uv - uvs[pin0.vertex]))
        .collect()
}
