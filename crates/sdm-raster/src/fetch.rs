//! Remote layer fetcher with local caching.
//!
//! Environmental layers are published as one GeoTIFF per variable, per
//! climate scenario. The fetcher expands a URL template, downloads the file
//! once into a cache directory, and serves the cached copy afterwards.
//!
//! ## URL templates
//!
//! Two placeholders are substituted:
//! - `{scenario}` - the scenario path segment, `current` or e.g.
//!   `MPI-ESM1-2-HR_ssp245_2061-2080`
//! - `{layer}` - the layer name, e.g. `wc2.1_2.5m_bio_1`
//!
//! Cached files live at `{cache_dir}/{scenario}/{layer}.tif`.

use crate::{RasterError, RasterStack, Result};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Default global climate model for forecasts.
pub const DEFAULT_FORECAST_MODEL: &str = "MPI-ESM1-2-HR";

/// Default shared socio-economic pathway for forecasts.
pub const DEFAULT_FORECAST_SSP: &str = "245";

/// Default forecast time window.
pub const DEFAULT_FORECAST_PERIOD: &str = "2061-2080";

/// Which climate the environmental layers describe.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClimateScenario {
    /// Present-day (baseline) climate.
    Current,
    /// Projected climate from a global climate model.
    Forecast {
        /// Global climate model name, e.g. `MPI-ESM1-2-HR`.
        model: String,
        /// Shared socio-economic pathway code, e.g. `245`.
        ssp: String,
        /// Time window, e.g. `2061-2080`.
        period: String,
    },
}

impl ClimateScenario {
    /// Create a forecast scenario.
    pub fn forecast(
        model: impl Into<String>,
        ssp: impl Into<String>,
        period: impl Into<String>,
    ) -> Self {
        ClimateScenario::Forecast {
            model: model.into(),
            ssp: ssp.into(),
            period: period.into(),
        }
    }

    /// Forecast scenario with the default model, pathway and period.
    pub fn default_forecast() -> Self {
        Self::forecast(
            DEFAULT_FORECAST_MODEL,
            DEFAULT_FORECAST_SSP,
            DEFAULT_FORECAST_PERIOD,
        )
    }

    /// Path segment used in URLs and the cache layout.
    pub fn path_segment(&self) -> String {
        match self {
            ClimateScenario::Current => "current".to_string(),
            ClimateScenario::Forecast { model, ssp, period } => {
                format!("{}_ssp{}_{}", model, ssp, period)
            }
        }
    }
}

impl fmt::Display for ClimateScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path_segment())
    }
}

/// Callback for download progress.
pub type DownloadCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Download statistics for the fetcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadStats {
    /// Number of layers downloaded this session.
    pub layers_downloaded: usize,
    /// Total bytes downloaded this session.
    pub bytes_downloaded: u64,
}

/// Layer fetcher with a local file cache.
pub struct LayerFetcher {
    /// Cache directory for downloaded layers.
    cache_dir: PathBuf,
    /// URL template with `{scenario}` and `{layer}` placeholders.
    url_template: String,
    /// HTTP client for downloading layers.
    client: reqwest::blocking::Client,
    /// Number of layers downloaded this session.
    layers_downloaded: AtomicUsize,
    /// Total bytes downloaded this session.
    bytes_downloaded: AtomicU64,
}

impl fmt::Debug for LayerFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerFetcher")
            .field("cache_dir", &self.cache_dir)
            .field("url_template", &self.url_template)
            .finish()
    }
}

impl LayerFetcher {
    /// Create a fetcher that caches into `cache_dir`.
    pub fn new<P: AsRef<Path>>(cache_dir: P, url_template: impl Into<String>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();

        // Create cache directory if it doesn't exist
        fs::create_dir_all(&cache_dir)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()?;

        Ok(Self {
            cache_dir,
            url_template: url_template.into(),
            client,
            layers_downloaded: AtomicUsize::new(0),
            bytes_downloaded: AtomicU64::new(0),
        })
    }

    /// Get the cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get download statistics for this session.
    pub fn download_stats(&self) -> DownloadStats {
        DownloadStats {
            layers_downloaded: self.layers_downloaded.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }

    /// Remote URL of a layer.
    pub fn layer_url(&self, scenario: &ClimateScenario, layer: &str) -> String {
        self.url_template
            .replace("{scenario}", &scenario.path_segment())
            .replace("{layer}", layer)
    }

    /// Local cache path of a layer.
    pub fn cache_path(&self, scenario: &ClimateScenario, layer: &str) -> PathBuf {
        self.cache_dir
            .join(scenario.path_segment())
            .join(format!("{}.tif", layer))
    }

    /// Check if a layer is cached locally.
    pub fn is_cached(&self, scenario: &ClimateScenario, layer: &str) -> bool {
        self.cache_path(scenario, layer).exists()
    }

    /// Fetch a layer, using the cache if available.
    ///
    /// Returns the path to the local file.
    pub fn fetch_layer(
        &self,
        scenario: &ClimateScenario,
        layer: &str,
        callback: Option<&DownloadCallback>,
    ) -> Result<PathBuf> {
        let cache_path = self.cache_path(scenario, layer);
        if cache_path.exists() {
            return Ok(cache_path);
        }

        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let url = self.layer_url(scenario, layer);
        if let Some(cb) = callback {
            cb(&format!("Downloading {} ({})...", layer, scenario));
        }
        tracing::info!(layer, %scenario, "Downloading layer from {}", url);

        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            return Err(RasterError::DownloadFailed {
                layer: layer.to_string(),
                url,
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes()?;

        self.layers_downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);

        // Write to a temporary name first so an interrupted download never
        // looks like a cached layer.
        let partial = cache_path.with_extension("tif.part");
        {
            let mut file = fs::File::create(&partial)?;
            file.write_all(&bytes)?;
        }
        fs::rename(&partial, &cache_path)?;

        Ok(cache_path)
    }

    /// Fetch the named layers and load them, in order, as one stack.
    pub fn fetch_stack<S: AsRef<str>>(
        &self,
        scenario: &ClimateScenario,
        layers: &[S],
        callback: Option<&DownloadCallback>,
    ) -> Result<RasterStack> {
        let paths = layers
            .iter()
            .map(|layer| self.fetch_layer(scenario, layer.as_ref(), callback))
            .collect::<Result<Vec<_>>>()?;

        if let Some(cb) = callback {
            let stats = self.download_stats();
            cb(&format!(
                "Layers ready: {} downloaded this session ({} bytes)",
                stats.layers_downloaded, stats.bytes_downloaded
            ));
        }

        RasterStack::from_files(&paths)
    }
}
