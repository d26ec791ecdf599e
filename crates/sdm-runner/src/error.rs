//! Error types for the pipeline runner.

use sdm_data::DataError;
use sdm_model::{EvalError, FitError, PredictError};
use sdm_raster::RasterError;
use thiserror::Error;

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Fit error: {0}")]
    Fit(#[from] FitError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("Prediction error: {0}")]
    Predict(#[from] PredictError),

    #[error("Forecast bands {found:?} do not provide {expected:?}")]
    ForecastBands {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No occurrence records with both latitude and longitude")]
    NoPresence,
}
