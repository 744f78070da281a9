use nalgebra::DVector;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum RegressionError {
    #[error("Length mismatch between descriptor ({x}) and target ({y}) vectors")]
    LengthMismatch { x: usize, y: usize },
    #[error("At least 2 samples are required for a linear fit, got {0}")]
    InsufficientSamples(usize),
    #[error("Regression input contains non-finite values")]
    NonFinite,
}

/// Result of a single-variable linear fit `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// In-sample coefficient of determination (R²). 1.0 is a perfect fit and
    /// the value is negative for fits worse than predicting the mean.
    pub score: f64,
}

impl LinearFit {
    #[inline]
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// A single-variable regression primitive.
pub trait Regressor: Sync {
    fn fit(&self, x: &DVector<f64>, y: &DVector<f64>) -> Result<LinearFit, RegressionError>;
}

/// Closed-form ordinary least squares with an intercept.
///
/// A constant descriptor has no slope to fit: the slope is 0 and the intercept
/// is the target mean. When the target itself is constant the score is 1.0 for
/// an exact fit and 0.0 otherwise, so scores are always finite.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrdinaryLeastSquares;

impl Regressor for OrdinaryLeastSquares {
    fn fit(&self, x: &DVector<f64>, y: &DVector<f64>) -> Result<LinearFit, RegressionError> {
        if x.len() != y.len() {
            return Err(RegressionError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if x.len() < 2 {
            return Err(RegressionError::InsufficientSamples(x.len()));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(RegressionError::NonFinite);
        }

        let x_mean = x.mean();
        let y_mean = y.mean();
        let dx = x.add_scalar(-x_mean);
        let dy = y.add_scalar(-y_mean);

        let sxx = dx.dot(&dx);
        let slope = if sxx == 0.0 { 0.0 } else { dx.dot(&dy) / sxx };
        let intercept = y_mean - slope * x_mean;

        let residuals = y - x.map(|xi| slope * xi + intercept);
        let ss_res = residuals.norm_squared();
        let ss_tot = dy.norm_squared();
        let score = if ss_tot == 0.0 {
            if ss_res == 0.0 { 1.0 } else { 0.0 }
        } else {
            1.0 - ss_res / ss_tot
        };

        Ok(LinearFit {
            slope,
            intercept,
            score,
        })
    }
}
