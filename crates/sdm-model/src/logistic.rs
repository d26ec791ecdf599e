//! Binomial GLM (logit link) fitted by maximum likelihood.
//!
//! Features are standardised internally so the optimiser sees a well
//! conditioned problem. Coefficients, standard errors and Wald statistics are
//! reported on the original feature scale.

use argmin::core::{CostFunction, Error, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use faer::linalg::solvers::{Llt, Solve};
use faer::{Mat, Side};
use ndarray::{aview1, s, Array1, Array2, Axis};
use sdm_data::{FeatureTable, Label};
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

/// Name reported for the intercept term.
pub const INTERCEPT_NAME: &str = "(Intercept)";

/// Fitted probabilities this close to their labels indicate separation.
const SEPARATION_TOLERANCE: f64 = 1e-6;

/// Eigenvalues of the feature cross-product below this share of the largest
/// one mark the features as collinear.
const COLLINEAR_TOLERANCE: f64 = 1e-10;

/// Errors that can occur while fitting a model.
#[derive(Debug, Error)]
pub enum FitError {
    /// The table has no rows.
    #[error("No rows to fit")]
    NoRows,

    /// Only one class is present.
    #[error("Training data holds only {0:?} rows")]
    SingleClass(Label),

    /// A feature has the same value in every row.
    #[error("Feature '{band}' is constant in the training data")]
    ConstantFeature {
        /// Band name.
        band: String,
    },

    /// Features are linearly dependent, so the information matrix is singular.
    #[error("Features are collinear: information matrix is singular")]
    Collinear,

    /// The classes are perfectly separable; estimates diverge.
    #[error("Presence and background are perfectly separated by the features")]
    PerfectSeparation,

    /// Optimization failed.
    #[error("Optimization failed: {0}")]
    OptimizationFailed(String),

    /// Coefficient count does not match the band list.
    #[error("{coefficients} coefficients given for {bands} bands")]
    CoefficientCount {
        /// Number of bands.
        bands: usize,
        /// Number of coefficients.
        coefficients: usize,
    },
}

/// Optimiser settings.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitConfig {
    /// Maximum L-BFGS iterations.
    pub max_iters: u64,
    /// Gradient norm at which the optimiser stops.
    pub tolerance_grad: f64,
    /// Number of correction pairs kept by L-BFGS.
    pub history: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iters: 500,
            tolerance_grad: 1e-8,
            history: 7,
        }
    }
}

/// One model term with its Wald statistics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coefficient {
    /// Band name, or [`INTERCEPT_NAME`].
    pub name: String,
    /// Estimate on the original feature scale.
    pub estimate: f64,
    /// Standard error from the inverse information matrix.
    pub std_error: f64,
    /// Wald z statistic.
    pub z_value: f64,
    /// Two-sided p-value of the z statistic.
    pub p_value: f64,
}

impl Coefficient {
    fn without_statistics(name: impl Into<String>, estimate: f64) -> Self {
        Self {
            name: name.into(),
            estimate,
            std_error: f64::NAN,
            z_value: f64::NAN,
            p_value: f64::NAN,
        }
    }
}

/// A fitted logistic model. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogisticModel {
    band_names: Vec<String>,
    intercept: Coefficient,
    coefficients: Vec<Coefficient>,
    log_likelihood: f64,
    deviance: f64,
    null_deviance: f64,
    aic: f64,
    iterations: u64,
    observations: usize,
}

impl LogisticModel {
    /// Model with known coefficients and no fit statistics.
    pub fn from_coefficients(
        band_names: Vec<String>,
        intercept: f64,
        coefficients: Vec<f64>,
    ) -> Result<Self, FitError> {
        if band_names.len() != coefficients.len() {
            return Err(FitError::CoefficientCount {
                bands: band_names.len(),
                coefficients: coefficients.len(),
            });
        }
        let coefficients = band_names
            .iter()
            .zip(coefficients)
            .map(|(name, beta)| Coefficient::without_statistics(name.clone(), beta))
            .collect();
        Ok(Self {
            band_names,
            intercept: Coefficient::without_statistics(INTERCEPT_NAME, intercept),
            coefficients,
            log_likelihood: f64::NAN,
            deviance: f64::NAN,
            null_deviance: f64::NAN,
            aic: f64::NAN,
            iterations: 0,
            observations: 0,
        })
    }

    /// Band names in the order the model expects values.
    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    /// Intercept estimate.
    pub fn intercept(&self) -> f64 {
        self.intercept.estimate
    }

    /// Slope estimates, one per band.
    pub fn coefficients(&self) -> Vec<f64> {
        self.coefficients.iter().map(|c| c.estimate).collect()
    }

    /// Intercept followed by the band terms.
    pub fn terms(&self) -> Vec<&Coefficient> {
        std::iter::once(&self.intercept)
            .chain(self.coefficients.iter())
            .collect()
    }

    /// Term for a band, if the model has it.
    pub fn term(&self, band: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == band)
    }

    /// Maximised log-likelihood.
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Residual deviance.
    pub fn deviance(&self) -> f64 {
        self.deviance
    }

    /// Deviance of the intercept-only model.
    pub fn null_deviance(&self) -> f64 {
        self.null_deviance
    }

    /// Akaike information criterion.
    pub fn aic(&self) -> f64 {
        self.aic
    }

    /// Optimiser iterations used.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Rows the model was fitted on.
    pub fn observations(&self) -> usize {
        self.observations
    }

    /// Linear predictor for one row of values in band order.
    pub fn linear_predictor(&self, values: &[f64]) -> f64 {
        self.intercept.estimate
            + self
                .coefficients
                .iter()
                .zip(values)
                .map(|(c, x)| c.estimate * x)
                .sum::<f64>()
    }

    /// Presence probability for one row of values in band order.
    pub fn predict(&self, values: &[f64]) -> f64 {
        sigmoid(self.linear_predictor(values))
    }

    /// Presence probability for every row of a table.
    pub fn predict_table(&self, table: &FeatureTable) -> Vec<f64> {
        table.rows().iter().map(|r| self.predict(&r.values)).collect()
    }
}

/// Fit a logistic model with default optimiser settings.
pub fn fit_logistic(table: &FeatureTable) -> Result<LogisticModel, FitError> {
    fit_logistic_with_config(table, &FitConfig::default())
}

/// Fit a logistic model of label against every band of `table`.
pub fn fit_logistic_with_config(
    table: &FeatureTable,
    config: &FitConfig,
) -> Result<LogisticModel, FitError> {
    if table.is_empty() {
        return Err(FitError::NoRows);
    }
    for label in [Label::Presence, Label::Background] {
        if table.count(label) == table.len() {
            return Err(FitError::SingleClass(label));
        }
    }

    let response = Array1::from(table.responses());
    let scaler = Scaler::fit(table)?;
    let design = scaler.design(table);
    check_collinearity(&design)?;

    let p = scaler.means.len();
    let n = response.len() as f64;
    let prevalence = response.iter().sum::<f64>() / n;
    let mut init = vec![0.0; p + 1];
    init[0] = (prevalence / (1.0 - prevalence)).ln();

    let problem = NegLogLikelihood {
        design: &design,
        response: &response,
    };
    let linesearch = MoreThuenteLineSearch::new();
    let solver = LBFGS::new(linesearch, config.history)
        .with_tolerance_grad(config.tolerance_grad)
        .map_err(|e| FitError::OptimizationFailed(e.to_string()))?;

    let res = Executor::new(problem, solver)
        .configure(|state| state.param(init).max_iters(config.max_iters))
        .run()
        .map_err(|e| FitError::OptimizationFailed(e.to_string()))?;

    let iterations = res.state().get_iter();
    tracing::debug!(
        iterations,
        status = ?res.state().get_termination_status(),
        "L-BFGS finished"
    );

    let beta_std = res
        .state()
        .get_best_param()
        .cloned()
        .ok_or_else(|| FitError::OptimizationFailed("No solution found".to_string()))?;
    if beta_std.iter().any(|b| !b.is_finite()) {
        return Err(FitError::OptimizationFailed(
            "Non-finite coefficient estimate".to_string(),
        ));
    }

    let eta = design.dot(&aview1(&beta_std));
    let fitted = eta.mapv(sigmoid);
    let separated = fitted
        .iter()
        .zip(&response)
        .all(|(p, y)| (p - y).abs() < SEPARATION_TOLERANCE);
    if separated {
        return Err(FitError::PerfectSeparation);
    }

    // Information matrix on the standardised scale: X' W X
    let weights = fitted.mapv(|mu| mu * (1.0 - mu));
    let weighted = &design * &weights.insert_axis(Axis(1));
    let information = design.t().dot(&weighted);
    let covariance_std = invert_spd(&information).ok_or(FitError::Collinear)?;

    let (beta, covariance) = scaler.to_original(&beta_std, &covariance_std);

    let log_likelihood: f64 = eta
        .iter()
        .zip(&response)
        .map(|(&eta, &y)| y * eta - softplus(eta))
        .sum();
    let null_log_likelihood =
        n * (prevalence * prevalence.ln() + (1.0 - prevalence) * (1.0 - prevalence).ln());
    let deviance = -2.0 * log_likelihood;

    let names = std::iter::once(INTERCEPT_NAME.to_string()).chain(table.band_names().iter().cloned());
    let mut terms: Vec<Coefficient> = names
        .zip(&beta)
        .enumerate()
        .map(|(i, (name, &estimate))| wald(name, estimate, covariance[[i, i]].sqrt()))
        .collect();
    let intercept = terms.remove(0);

    let model = LogisticModel {
        band_names: table.band_names().to_vec(),
        intercept,
        coefficients: terms,
        log_likelihood,
        deviance,
        null_deviance: -2.0 * null_log_likelihood,
        aic: deviance + 2.0 * (p + 1) as f64,
        iterations,
        observations: table.len(),
    };

    tracing::info!(
        rows = model.observations,
        bands = p,
        iterations,
        deviance = model.deviance,
        aic = model.aic,
        "Fitted logistic model"
    );
    Ok(model)
}

// ============================================================================
// Internals
// ============================================================================

/// Per-band centring and scaling.
struct Scaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Scaler {
    fn fit(table: &FeatureTable) -> Result<Self, FitError> {
        let n = table.len() as f64;
        let p = table.band_count();
        let mut means = vec![0.0; p];
        for row in table.rows() {
            for (m, x) in means.iter_mut().zip(&row.values) {
                *m += x / n;
            }
        }

        let mut scales = vec![0.0; p];
        for row in table.rows() {
            for ((s, x), m) in scales.iter_mut().zip(&row.values).zip(&means) {
                *s += (x - m).powi(2);
            }
        }
        for (j, s) in scales.iter_mut().enumerate() {
            *s = (*s / (n - 1.0).max(1.0)).sqrt();
            if !s.is_finite() || *s <= 1e-12 * (1.0 + means[j].abs()) {
                return Err(FitError::ConstantFeature {
                    band: table.band_names()[j].clone(),
                });
            }
        }
        Ok(Self { means, scales })
    }

    /// Standardised design matrix with a leading intercept column.
    fn design(&self, table: &FeatureTable) -> Array2<f64> {
        let rows = table.rows();
        Array2::from_shape_fn((rows.len(), self.means.len() + 1), |(i, j)| {
            if j == 0 {
                1.0
            } else {
                (rows[i].values[j - 1] - self.means[j - 1]) / self.scales[j - 1]
            }
        })
    }

    /// Map standardised estimates and covariance back to the original scale.
    ///
    /// With `beta = T beta_std`, the covariance is `T C T'`.
    fn to_original(&self, beta_std: &[f64], cov_std: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
        let k = beta_std.len();
        let mut t = Array2::<f64>::zeros((k, k));
        t[[0, 0]] = 1.0;
        for j in 1..k {
            t[[0, j]] = -self.means[j - 1] / self.scales[j - 1];
            t[[j, j]] = 1.0 / self.scales[j - 1];
        }

        let beta = t.dot(&aview1(beta_std));
        let cov = t.dot(cov_std).dot(&t.t());
        (beta, cov)
    }
}

fn to_faer(a: &Array2<f64>) -> Mat<f64> {
    Mat::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Inverse of a symmetric positive definite matrix via its Cholesky factor.
fn invert_spd(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let llt = Llt::new(to_faer(a).as_ref(), Side::Lower).ok()?;
    let mut inv = Mat::<f64>::identity(n, n);
    llt.solve_in_place(inv.as_mut());
    let inv = Array2::from_shape_fn((n, n), |(i, j)| inv[(i, j)]);
    inv.iter().all(|v| v.is_finite()).then_some(inv)
}

/// Fail when the standardised features are linearly dependent.
///
/// Checks the eigenvalues of the feature cross-product `Z'Z`.
fn check_collinearity(design: &Array2<f64>) -> Result<(), FitError> {
    if design.ncols() < 3 {
        return Ok(());
    }
    let features = design.slice(s![.., 1..]);
    let cross = features.t().dot(&features);
    let eig = to_faer(&cross)
        .as_ref()
        .self_adjoint_eigen(Side::Lower)
        .map_err(|_| FitError::Collinear)?;

    let values = eig.S();
    let (mut smallest, mut largest) = (f64::INFINITY, 0.0f64);
    for idx in 0..values.dim() {
        let v = values[idx];
        if !v.is_finite() {
            return Err(FitError::Collinear);
        }
        smallest = smallest.min(v);
        largest = largest.max(v.abs());
    }
    if smallest <= COLLINEAR_TOLERANCE * largest {
        return Err(FitError::Collinear);
    }
    Ok(())
}

fn wald(name: String, estimate: f64, std_error: f64) -> Coefficient {
    let z_value = estimate / std_error;
    let p_value = if let Ok(normal) = Normal::new(0.0, 1.0) {
        2.0 * normal.sf(z_value.abs())
    } else {
        f64::NAN
    };
    Coefficient {
        name,
        estimate,
        std_error,
        z_value,
        p_value,
    }
}

fn sigmoid(eta: f64) -> f64 {
    if eta >= 0.0 {
        1.0 / (1.0 + (-eta).exp())
    } else {
        let e = eta.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^eta)` without overflow.
fn softplus(eta: f64) -> f64 {
    eta.max(0.0) + (-eta.abs()).exp().ln_1p()
}

/// Mean negative Bernoulli log-likelihood over a standardised design matrix.
struct NegLogLikelihood<'a> {
    design: &'a Array2<f64>,
    response: &'a Array1<f64>,
}

impl CostFunction for NegLogLikelihood<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, beta: &Self::Param) -> Result<Self::Output, Error> {
        let eta = self.design.dot(&aview1(beta));
        let total: f64 = eta
            .iter()
            .zip(self.response)
            .map(|(&eta, &y)| softplus(eta) - y * eta)
            .sum();
        Ok(total / self.response.len() as f64)
    }
}

impl Gradient for NegLogLikelihood<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, beta: &Self::Param) -> Result<Self::Gradient, Error> {
        let n = self.response.len() as f64;
        let residual = self.design.dot(&aview1(beta)).mapv(sigmoid) - self.response;
        Ok((self.design.t().dot(&residual) / n).to_vec())
    }
}
