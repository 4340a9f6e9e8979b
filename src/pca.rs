use crate::error::{MvpaError, Result};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2};

/// Eigenvalues below this fraction of the largest one are treated as zero
const EIGEN_FLOOR: f64 = 1e-10;

/// Principal component projection fitted on centered rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Pca {
    /// Features x components, orthonormal columns (zero columns for null directions)
    pub components: Array2<f64>,
    /// Variance captured by each component
    pub explained_variance: Array1<f64>,
    pub explained_variance_ratio: Array1<f64>,
}

impl Pca {
    /// Fits `n_components` directions of maximal variance on a centered matrix.
    ///
    /// The covariance matrix is decomposed when there are at least as many rows as
    /// features, the rows' Gram matrix otherwise.
    pub fn fit(x: ArrayView2<f64>, n_components: usize) -> Result<Pca> {
        let (n, d) = x.dim();
        let allowed = n.min(d);
        if n_components == 0 || n_components > allowed {
            return Err(MvpaError::RankExceeded {
                requested: n_components,
                allowed,
                context: format!("{} training rows x {} features", n, d),
            });
        }
        let denom = (n.max(2) - 1) as f64;

        let use_gram = d > n;
        let square = (if use_gram { x.dot(&x.t()) } else { x.t().dot(&x) }) / denom;
        let (values, vectors) = symmetric_eigen(&square);

        let total: f64 = values.iter().map(|v| v.max(0.0)).sum();
        let largest = values.first().copied().unwrap_or(0.0).max(0.0);

        let mut components = Array2::zeros((d, n_components));
        let mut explained_variance = Array1::zeros(n_components);
        for k in 0..n_components {
            let lambda = values[k];
            if lambda <= EIGEN_FLOOR * largest || lambda <= 0.0 {
                continue;
            }
            explained_variance[k] = lambda;

            let mut direction = if use_gram {
                // X^T u has squared norm lambda * (n - 1)
                x.t().dot(&vectors.column(k)) / (lambda * denom).sqrt()
            } else {
                vectors.column(k).to_owned()
            };
            flip_sign(&mut direction);
            components.column_mut(k).assign(&direction);
        }

        let explained_variance_ratio = if total > 0.0 {
            &explained_variance / total
        } else {
            Array1::zeros(n_components)
        };

        Ok(Pca { components, explained_variance, explained_variance_ratio })
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Array2<f64> {
        x.dot(&self.components)
    }

    pub fn n_components(&self) -> usize {
        self.components.ncols()
    }
}

/// Largest-magnitude loading made positive so the output does not depend on the solver
fn flip_sign(direction: &mut Array1<f64>) {
    let pivot = direction.iter()
        .copied()
        .fold(0.0f64, |best, v| if v.abs() > best.abs() { v } else { best });
    if pivot < 0.0 {
        direction.mapv_inplace(|v| -v);
    }
}

/// Eigenvalues in decreasing order with their eigenvectors as columns
fn symmetric_eigen(a: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let m = a.nrows();
    let matrix = DMatrix::from_fn(m, m, |i, j| 0.5 * (a[[i, j]] + a[[j, i]]));
    let eig = matrix.symmetric_eigen();

    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&i, &j| eig.eigenvalues[j].partial_cmp(&eig.eigenvalues[i]).unwrap_or(std::cmp::Ordering::Equal));

    let values = order.iter().map(|&i| eig.eigenvalues[i]).collect();
    let mut vectors = Array2::zeros((m, m));
    for (k, &i) in order.iter().enumerate() {
        for r in 0..m {
            vectors[[r, k]] = eig.eigenvectors[(r, i)];
        }
    }
    (values, vectors)
}
