//! Error types for the raster crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when working with raster data.
#[derive(Debug, Error)]
pub enum RasterError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding or encoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing or malformed georeferencing tags.
    #[error("Invalid GeoTIFF {path}: {reason}")]
    InvalidGeoTiff {
        /// File being read.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Unsupported pixel layout or sample type in the TIFF file.
    #[error("Unsupported TIFF data type: {0}")]
    UnsupportedDataType(String),

    /// Extent bounds are not finite or not ordered.
    #[error("Invalid extent: {0}")]
    InvalidExtent(String),

    /// Cell buffer length does not match the grid dimensions.
    #[error("Band '{band}' has {found} cells but its grid needs {expected}")]
    DataLength {
        /// Band name.
        band: String,
        /// Cells required by the grid.
        expected: usize,
        /// Cells supplied.
        found: usize,
    },

    /// A band's grid differs from the rest of the stack.
    #[error("Band '{band}' does not share the stack grid: {reason}")]
    GridMismatch {
        /// Offending band.
        band: String,
        /// Which property differs.
        reason: String,
    },

    /// A stack needs at least one band.
    #[error("Raster stack has no bands")]
    EmptyStack,

    /// Two bands in a stack share a name.
    #[error("Duplicate band name '{0}'")]
    DuplicateBand(String),

    /// Named band is not part of the stack.
    #[error("Unknown band '{0}'")]
    UnknownBand(String),

    /// Renaming requires one name per band.
    #[error("Expected {expected} band names, got {found}")]
    BandCountMismatch {
        /// Bands in the stack.
        expected: usize,
        /// Names supplied.
        found: usize,
    },

    /// Crop extent does not overlap the raster.
    #[error("Extent ({min_lat}-{max_lat}, {min_lon}-{max_lon}) does not overlap the raster")]
    NoOverlap {
        /// Crop minimum latitude.
        min_lat: f64,
        /// Crop maximum latitude.
        max_lat: f64,
        /// Crop minimum longitude.
        min_lon: f64,
        /// Crop maximum longitude.
        max_lon: f64,
    },

    /// Directory holds no GeoTIFF files.
    #[error("No GeoTIFF files found in {0}")]
    NoRasterFiles(PathBuf),

    /// HTTP request error when fetching layers.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Failed to download a layer from the remote server.
    #[error("Failed to download layer '{layer}' from {url}: {reason}")]
    DownloadFailed {
        /// Layer name.
        layer: String,
        /// Source URL.
        url: String,
        /// Reason for failure.
        reason: String,
    },
}
