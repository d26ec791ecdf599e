//! # sdm-raster
//!
//! Environmental raster layers for species distribution modelling.
//!
//! This crate provides functionality to:
//! - Read single-band GeoTIFF layers (e.g. WorldClim bioclimatic variables)
//! - Group same-grid layers into an ordered [`RasterStack`]
//! - Crop a stack to a geographic extent and extract per-band values at a coordinate
//! - Write probability and suitability surfaces back out as GeoTIFF
//! - Download layers on demand into a local cache ([`LayerFetcher`])
//!
//! ## Overview
//!
//! ### Grid convention
//!
//! Every layer sits on a regular latitude/longitude [`Grid`]. Row 0 is the
//! northern edge and cells are areas: a coordinate belongs to the cell that
//! contains it, and sampled points are reported at cell centres. Missing
//! cells are stored as `NaN`; a GeoTIFF no-data sentinel is converted to
//! `NaN` on load.
//!
//! ### Bioclimatic layers
//!
//! WorldClim distributes 19 bioclimatic variables per resolution, named like
//! `wc2.1_2.5m_bio_1.tif` .. `wc2.1_2.5m_bio_19.tif`. Loading a directory
//! orders files naturally, so `bio_2` precedes `bio_10`.
//!
//! ## Examples
//!
//! ```no_run
//! use sdm_raster::{Extent, RasterStack};
//!
//! let stack = RasterStack::from_directory("data/wc2.1_2.5m")?;
//! let region = Extent::new(30.0, 36.0, -118.0, -110.0)?.scale(1.25)?;
//! let cropped = stack.crop(&region)?;
//!
//! if let Some(values) = cropped.extract(32.2, -110.9) {
//!     for (name, value) in cropped.band_names().iter().zip(values) {
//!         println!("{name}: {value}");
//!     }
//! }
//! # Ok::<(), sdm_raster::RasterError>(())
//! ```

mod error;
mod extent;
mod fetch;
mod grid;
mod layer;
mod stack;

pub use error::RasterError;
pub use extent::{Coordinate, Extent};
pub use fetch::{
    ClimateScenario, DownloadCallback, DownloadStats, LayerFetcher, DEFAULT_FORECAST_MODEL,
    DEFAULT_FORECAST_PERIOD, DEFAULT_FORECAST_SSP,
};
pub use grid::{Grid, Window};
pub use layer::RasterLayer;
pub use stack::RasterStack;

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;
