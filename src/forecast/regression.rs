//! Ordinary least squares on a handful of features.

use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Relative cut-off below which a singular value counts as zero.
const RANK_TOLERANCE: f64 = 1e-12;

/// Linear model `y = intercept + Σ coefficients[i] · x[i]` over `N` features.
///
/// Fitted by an SVD least-squares solve on the centered design matrix. A
/// feature that is constant over the sample gets a zero coefficient, and
/// collinear features share the minimum-norm solution instead of failing
/// the fit.
///
/// # Examples
///
/// ```
/// use microgrid_sim::forecast::regression::LinearRegression;
///
/// let x = [[0.0], [1.0], [2.0], [3.0]];
/// let y = [1.0, 3.0, 5.0, 7.0];
/// let model = LinearRegression::<1>::fit(&x, &y);
/// assert!((model.predict(&[10.0]) - 21.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegression<const N: usize> {
    pub intercept: f64,
    pub coefficients: [f64; N],
}

impl<const N: usize> LinearRegression<N> {
    /// Fits the model. An empty sample yields the all-zero model.
    ///
    /// # Panics
    ///
    /// Panics if `x` and `y` differ in length.
    pub fn fit(x: &[[f64; N]], y: &[f64]) -> Self {
        assert_eq!(x.len(), y.len());
        if x.is_empty() {
            return Self {
                intercept: 0.0,
                coefficients: [0.0; N],
            };
        }

        let design = DMatrix::from_fn(x.len(), N, |i, j| x[i][j]);
        let target = DVector::from_column_slice(y);
        let x_mean: Vec<f64> = design.column_iter().map(|c| c.mean()).collect();
        let y_mean = target.mean();

        let centered = DMatrix::from_fn(x.len(), N, |i, j| design[(i, j)] - x_mean[j]);
        let centered_y = target.add_scalar(-y_mean);

        // Singular values below the tolerance are dropped, which gives the
        // minimum-norm least-squares solution for rank-deficient designs.
        let svd = centered.svd(true, true);
        let eps = svd.singular_values.max() * RANK_TOLERANCE;
        let beta = svd
            .solve(&centered_y, eps)
            .unwrap_or_else(|_| DVector::zeros(N));

        let mut coefficients = [0.0; N];
        for (c, b) in coefficients.iter_mut().zip(beta.iter()) {
            *c = *b;
        }
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(b, m)| b * m)
                .sum::<f64>();

        Self {
            intercept,
            coefficients,
        }
    }

    pub fn predict(&self, x: &[f64; N]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(x)
                .map(|(b, v)| b * v)
                .sum::<f64>()
    }
}

/// Mean absolute error between predictions and targets; 0 for empty input.
pub fn mean_absolute_error(predicted: &[f64], actual: &[f64]) -> f64 {
    if predicted.is_empty() {
        return 0.0;
    }
    predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).abs())
        .sum::<f64>()
        / predicted.len() as f64
}

/// Shuffled train/test partition of `0..n`.
///
/// The test share is `ceil(n · test_fraction)` indices, the rest train.
/// The same seed always yields the same split.
///
/// # Returns
///
/// `(train_indices, test_indices)`
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_test = ((n as f64 * test_fraction).ceil() as usize).min(n);
    let train = indices.split_off(n_test);
    (train, indices)
}
