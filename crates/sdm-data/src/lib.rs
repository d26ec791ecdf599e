//! # sdm-data
//!
//! Data preparation for presence/background species distribution models.
//!
//! ## Features
//!
//! - **Occurrences**: Load presence records from CSV and drop rows with
//!   missing coordinates
//! - **Background sampling**: Draw seeded random pseudo-absence points from
//!   valid raster cells
//! - **Feature assembly**: Join presence and background points with the
//!   environmental values under them into one labelled table
//! - **Folds**: Stratified k-fold assignment and train/test splitting
//!
//! Every stage takes its inputs by reference and returns new values; no
//! table is modified in place.

mod background;
mod error;
mod folds;
mod occurrence;
mod table;

pub use background::{sample_background, BackgroundConfig, DEFAULT_BACKGROUND_COUNT, DEFAULT_SEED};
pub use error::DataError;
pub use folds::{split, stratified_folds, FoldAssignment, TrainTestSplit, DEFAULT_FOLDS};
pub use occurrence::{OccurrenceRecord, OccurrenceSet};
pub use table::{assemble, AssemblyReport, FeatureRow, FeatureTable, Label, MissingPolicy};

/// Result type for data preparation.
pub type Result<T> = std::result::Result<T, DataError>;
