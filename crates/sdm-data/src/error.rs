//! Error types for data preparation.

use crate::Label;
use sdm_raster::RasterError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while preparing model data.
#[derive(Debug, Error)]
pub enum DataError {
    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Raster lookup error.
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    /// Required coordinate column not present in the header.
    #[error("Missing '{column}' column in {source_name}")]
    MissingColumn {
        /// Column that was looked for.
        column: &'static str,
        /// File or reader description.
        source_name: String,
    },

    /// A coordinate cell could not be parsed as a number.
    #[error("Invalid {column} value '{value}' on line {line}")]
    InvalidNumber {
        /// Column name.
        column: &'static str,
        /// Offending text.
        value: String,
        /// 1-based line number.
        line: u64,
    },

    /// Fewer valid cells than background points requested.
    #[error("Requested {requested} background points but only {available} valid cells exist")]
    InsufficientCells {
        /// Points requested.
        requested: usize,
        /// Valid cells available.
        available: usize,
    },

    /// A point has no environmental values (outside the stack or on a missing cell).
    #[error("{label:?} point ({lat}, {lon}) has missing environmental values")]
    MissingFeatures {
        /// Label of the point.
        label: Label,
        /// Latitude.
        lat: f64,
        /// Longitude.
        lon: f64,
    },

    /// A feature row's width does not match the band list.
    #[error("Row {row} has {found} values but the table has {expected} bands")]
    RowWidth {
        /// Row index.
        row: usize,
        /// Bands in the table.
        expected: usize,
        /// Values in the row.
        found: usize,
    },

    /// Fold count must be at least 2.
    #[error("Fold count must be at least 2, got {0}")]
    InvalidFoldCount(usize),

    /// Test fold outside `1..=k`.
    #[error("Test fold {fold} is outside 1..={k}")]
    InvalidTestFold {
        /// Requested test fold.
        fold: usize,
        /// Number of folds.
        k: usize,
    },

    /// Fold assignment was made for a different table.
    #[error("Fold assignment covers {folds} rows but the table has {rows}")]
    FoldLengthMismatch {
        /// Rows in the table.
        rows: usize,
        /// Rows covered by the assignment.
        folds: usize,
    },

    /// File could not be opened.
    #[error("Cannot open {path}: {source}")]
    Open {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}
