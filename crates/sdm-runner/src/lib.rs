//! # sdm-runner
//!
//! End-to-end presence/background species distribution modelling.
//!
//! The runner reads a YAML [`RunConfig`], loads occurrence records and
//! environmental layers, fits and evaluates a logistic model, projects it onto
//! current and forecast climate, and writes GeoTIFF surfaces, a PNG map and a
//! JSON summary to the output directory.
//!
//! ## Example configuration
//!
//! ```yaml
//! occurrences: data/carnegiea_gigantea.csv
//! output_dir: output
//! layers:
//!   current_dir: data/wc2.1_2.5m
//!   forecast_dir: data/wc2.1_2.5m_MPI-ESM1-2-HR_ssp245_2061-2080
//! background:
//!   count: 1000
//! folds: 5
//! test_fold: 1
//! seed: 19
//! threshold: max_spec_sens
//! forecast:
//!   model: MPI-ESM1-2-HR
//!   ssp: "245"
//!   period: 2061-2080
//! ```
//!
//! Leaving out `forecast` skips the forecast projection.

mod config;
mod error;
mod pipeline;
mod render;
mod report;

pub use config::{
    BackgroundSettings, DownloadConfig, ForecastConfig, LayerConfig, RunConfig,
    BIOCLIM_VARIABLES, DEFAULT_EXTENT_PADDING, DEFAULT_RESOLUTION,
};
pub use error::PipelineError;
pub use pipeline::{
    fit_and_project, load_current_stack, load_forecast_stack, project, run, ModelRun,
    Projection, FORECAST_PREFIX, PROBABILITY_FILE, SUITABILITY_FILE, SUITABILITY_PNG,
    SUMMARY_FILE,
};
pub use render::render_suitability;
pub use report::{ForecastSummary, ModelSummary, OccurrenceCounts, RunSummary};

/// Result type for the runner.
pub type Result<T> = std::result::Result<T, PipelineError>;
