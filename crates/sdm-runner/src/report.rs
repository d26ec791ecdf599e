//! Run summary written as `summary.json`.

use crate::Result;
use chrono::{DateTime, Utc};
use sdm_data::AssemblyReport;
use sdm_model::{Coefficient, Evaluation, LogisticModel, SuitabilitySummary};
use sdm_raster::Extent;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Occurrence record counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OccurrenceCounts {
    /// Rows in the occurrence file.
    pub records: usize,
    /// Rows with both coordinates.
    pub complete: usize,
}

/// Fitted model terms and fit statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub terms: Vec<Coefficient>,
    pub log_likelihood: f64,
    pub deviance: f64,
    pub null_deviance: f64,
    pub aic: f64,
    pub iterations: u64,
    pub observations: usize,
}

impl From<&LogisticModel> for ModelSummary {
    fn from(model: &LogisticModel) -> Self {
        Self {
            terms: model.terms().into_iter().cloned().collect(),
            log_likelihood: model.log_likelihood(),
            deviance: model.deviance(),
            null_deviance: model.null_deviance(),
            aic: model.aic(),
            iterations: model.iterations(),
            observations: model.observations(),
        }
    }
}

/// Suitability under a forecast scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSummary {
    /// Scenario path segment, e.g. `MPI-ESM1-2-HR_ssp245_2061-2080`.
    pub scenario: String,
    /// Suitable share of valid cells.
    pub suitability: SuitabilitySummary,
}

/// Everything a run reports.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// When the run finished.
    pub generated_at: DateTime<Utc>,
    pub occurrences: OccurrenceCounts,
    /// Model bands in order.
    pub bands: Vec<String>,
    /// Extent the layers were cropped to.
    pub extent: Extent,
    pub seed: u64,
    pub assembly: AssemblyReport,
    pub folds: usize,
    pub test_fold: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub model: ModelSummary,
    pub evaluation: Evaluation,
    /// Suitable share of valid cells under current climate.
    pub current: SuitabilitySummary,
    pub forecast: Option<ForecastSummary>,
    /// Files written by the run.
    pub outputs: Vec<PathBuf>,
}

impl RunSummary {
    /// Write as pretty-printed JSON.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
