//! Compressed sparse row matrices and a preconditioned conjugate gradient solver.

use super::UnwrapError;

/// Compressed Sparse Row (CSR) matrix.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    /// `row_ptr[i]..row_ptr[i + 1]` is the slice of row `i` in `col_idx`/`values`.
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from `(row, col, value)` triplets.
    ///
    /// Duplicate entries at the same position are summed.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, val) in triplets {
            if last == Some((row, col)) {
                if let Some(v) = values.last_mut() {
                    *v += val;
                }
                continue;
            }
            col_idx.push(col);
            values.push(val);
            row_ptr[row + 1] += 1;
            last = Some((row, col));
        }

        for r in 0..rows {
            row_ptr[r + 1] += row_ptr[r];
        }

        Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// y = A * x
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        debug_assert_eq!(x.len(), self.ncols());
        debug_assert_eq!(y.len(), self.nrows());

        for (i, out) in y.iter_mut().enumerate() {
            let range = self.row_ptr[i]..self.row_ptr[i + 1];
            *out = self.col_idx[range.clone()]
                .iter()
                .zip(&self.values[range])
                .map(|(&c, &v)| v * x[c])
                .sum();
        }
    }

    /// Main diagonal (zero where no entry is stored).
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.rows.min(self.cols))
            .map(|i| {
                let range = self.row_ptr[i]..self.row_ptr[i + 1];
                self.col_idx[range.clone()]
                    .iter()
                    .zip(&self.values[range])
                    .find(|&(&c, _)| c == i)
                    .map_or(0.0, |(_, &v)| v)
            })
            .collect()
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Solve `A * x = b` for symmetric positive definite `A` with Jacobi-preconditioned
/// conjugate gradients, starting from `x`.
///
/// Converges when the residual norm drops below `tolerance * |b|`.
pub fn conjugate_gradient(
    a: &CsrMatrix,
    b: &[f64],
    mut x: Vec<f64>,
    max_iter: usize,
    tolerance: f64,
) -> Result<Vec<f64>, UnwrapError> {
    let n = b.len();
    debug_assert_eq!(a.nrows(), n);
    debug_assert_eq!(a.ncols(), n);
    debug_assert_eq!(x.len(), n);

    let b_norm = dot(b, b).sqrt();
    if b_norm < 1e-300 {
        return Ok(vec![0.0; n]);
    }
    let threshold = tolerance * b_norm;

    let inv_diag: Vec<f64> = a
        .diagonal()
        .into_iter()
        .map(|d| if d.abs() > 1e-300 { 1.0 / d } else { 1.0 })
        .collect();

    let mut ap = vec![0.0; n];
    a.mul_vec(&x, &mut ap);
    let mut r: Vec<f64> = b.iter().zip(&ap).map(|(bi, ai)| bi - ai).collect();
    if dot(&r, &r).sqrt() < threshold {
        return Ok(x);
    }

    let mut z: Vec<f64> = r.iter().zip(&inv_diag).map(|(ri, di)| ri * di).collect();
    let mut p = z.clone();
    let mut rz = dot(&r, &z);

    for _ in 0..max_iter {
        a.mul_vec(&p, &mut ap);
        let p_ap = dot(&p, &ap);
        if p_ap.abs() < 1e-300 {
            break;
        }
        let alpha = rz / p_ap;

        for i in 0..n {
            x[i] += alpha * p[i];
            r[i] -= alpha * ap[i];
        }
        if dot(&r, &r).sqrt() < threshold {
            return Ok(x);
        }

        for i in 0..n {
            z[i] = r[i] * inv_diag[i];
        }
        let rz_new = dot(&r, &z);
        let beta = rz_new / rz;
        rz = rz_new;
        for i in 0..n {
            p[i] = z[i] + beta * p[i];
        }
    }

    Err(UnwrapError::NotConverged {
        iterations: max_iter,
    })
}
