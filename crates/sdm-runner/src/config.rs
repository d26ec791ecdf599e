//! Run configuration loaded from YAML.
//!
//! Every field has a default, so a configuration file only needs the keys it
//! changes. Command-line flags are applied on top of the file before
//! [`RunConfig::validate`] is called.

use crate::{PipelineError, Result};
use sdm_data::{MissingPolicy, DEFAULT_BACKGROUND_COUNT, DEFAULT_FOLDS, DEFAULT_SEED};
use sdm_model::ThresholdCriterion;
use sdm_raster::{
    ClimateScenario, DEFAULT_FORECAST_MODEL, DEFAULT_FORECAST_PERIOD, DEFAULT_FORECAST_SSP,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default factor applied to the occurrence bounding box.
pub const DEFAULT_EXTENT_PADDING: f64 = 1.25;

/// Default layer resolution label.
pub const DEFAULT_RESOLUTION: &str = "2.5m";

/// Number of bioclimatic variables published per scenario.
pub const BIOCLIM_VARIABLES: usize = 19;

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Occurrence CSV with latitude/longitude columns.
    pub occurrences: PathBuf,
    /// Directory that receives every output file.
    pub output_dir: PathBuf,
    /// Where environmental layers come from.
    pub layers: LayerConfig,
    /// Factor applied to the occurrence bounding box before cropping.
    pub extent_padding: f64,
    /// Background sampling settings.
    pub background: BackgroundSettings,
    /// Number of cross-validation folds.
    pub folds: usize,
    /// Fold held out for evaluation, in `1..=folds`.
    pub test_fold: usize,
    /// Seed for background sampling and fold assignment.
    pub seed: u64,
    /// Threshold selection rule.
    pub threshold: ThresholdCriterion,
    /// Handling of points without environmental values.
    pub missing: MissingPolicy,
    /// Forecast scenario; `None` (the default) skips the forecast projection.
    pub forecast: Option<ForecastConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            occurrences: PathBuf::from("data/occurrences.csv"),
            output_dir: PathBuf::from("output"),
            layers: LayerConfig::default(),
            extent_padding: DEFAULT_EXTENT_PADDING,
            background: BackgroundSettings::default(),
            folds: DEFAULT_FOLDS,
            test_fold: 1,
            seed: DEFAULT_SEED,
            threshold: ThresholdCriterion::default(),
            missing: MissingPolicy::default(),
            forecast: None,
        }
    }
}

/// Layer source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayerConfig {
    /// Directory of current-climate GeoTIFFs. Takes precedence over `download`.
    pub current_dir: Option<PathBuf>,
    /// Directory of forecast GeoTIFFs, matched to the current bands by name.
    pub forecast_dir: Option<PathBuf>,
    /// Forecast band names standing in for the current bands, in the same
    /// order. Empty means the forecast bands carry the current names.
    pub forecast_bands: Vec<String>,
    /// Resolution label used in default layer names, e.g. `2.5m`.
    pub resolution: String,
    /// Layer names to use, in model order. Empty means every file in the
    /// directory, or all bioclimatic variables when downloading.
    pub bands: Vec<String>,
    /// Remote source used when a directory is not given.
    pub download: Option<DownloadConfig>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            current_dir: Some(PathBuf::from("data/wc2.1_2.5m")),
            forecast_dir: None,
            forecast_bands: Vec::new(),
            resolution: DEFAULT_RESOLUTION.to_string(),
            bands: Vec::new(),
            download: None,
        }
    }
}

impl LayerConfig {
    /// Layer names to request from the remote source.
    pub fn download_layers(&self) -> Vec<String> {
        if !self.bands.is_empty() {
            return self.bands.clone();
        }
        (1..=BIOCLIM_VARIABLES)
            .map(|n| format!("wc2.1_{}_bio_{}", self.resolution, n))
            .collect()
    }
}

/// Remote layer download settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadConfig {
    /// Local cache directory.
    pub cache_dir: PathBuf,
    /// URL template with `{scenario}` and `{layer}` placeholders.
    pub url_template: String,
}

/// Background sampling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundSettings {
    /// Number of background points.
    pub count: usize,
    /// Fail when fewer valid cells than `count` exist.
    pub strict: bool,
    /// Never sample a cell that holds a presence point.
    pub exclude_presence_cells: bool,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            count: DEFAULT_BACKGROUND_COUNT,
            strict: false,
            exclude_presence_cells: false,
        }
    }
}

/// Forecast scenario identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// Global climate model.
    pub model: String,
    /// Shared socio-economic pathway code.
    pub ssp: String,
    /// Time window.
    pub period: String,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_FORECAST_MODEL.to_string(),
            ssp: DEFAULT_FORECAST_SSP.to_string(),
            period: DEFAULT_FORECAST_PERIOD.to_string(),
        }
    }
}

impl ForecastConfig {
    /// Scenario these identifiers describe.
    pub fn scenario(&self) -> ClimateScenario {
        ClimateScenario::forecast(&self.model, &self.ssp, &self.period)
    }
}

impl RunConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a configuration file.
    ///
    /// Relative paths inside the file are resolved against the file's
    /// directory.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Serialise to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.extent_padding.is_finite() || self.extent_padding <= 0.0 {
            return Err(PipelineError::Config(format!(
                "extent_padding must be a positive number, got {}",
                self.extent_padding
            )));
        }
        if self.folds < 2 {
            return Err(PipelineError::Config(format!(
                "folds must be at least 2, got {}",
                self.folds
            )));
        }
        if self.test_fold == 0 || self.test_fold > self.folds {
            return Err(PipelineError::Config(format!(
                "test_fold must be in 1..={}, got {}",
                self.folds, self.test_fold
            )));
        }
        if self.background.count == 0 {
            return Err(PipelineError::Config(
                "background.count must be greater than zero".to_string(),
            ));
        }
        if self.layers.current_dir.is_none() && self.layers.download.is_none() {
            return Err(PipelineError::Config(
                "layers need either current_dir or download".to_string(),
            ));
        }
        if self.forecast.is_some()
            && self.layers.forecast_dir.is_none()
            && self.layers.download.is_none()
        {
            return Err(PipelineError::Config(
                "forecast needs layers.forecast_dir or layers.download".to_string(),
            ));
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.occurrences);
        resolve(&mut self.output_dir);
        if let Some(dir) = self.layers.current_dir.as_mut() {
            resolve(dir);
        }
        if let Some(dir) = self.layers.forecast_dir.as_mut() {
            resolve(dir);
        }
        if let Some(download) = self.layers.download.as_mut() {
            resolve(&mut download.cache_dir);
        }
    }
}
