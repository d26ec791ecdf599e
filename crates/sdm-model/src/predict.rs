//! Projection of a fitted model onto raster stacks.

use crate::LogisticModel;
use sdm_raster::{RasterError, RasterLayer, RasterStack};
use thiserror::Error;

/// Band name of predicted probability surfaces.
pub const PROBABILITY_BAND: &str = "probability";

/// Band name of classified suitability surfaces.
pub const SUITABILITY_BAND: &str = "suitability";

/// Errors that can occur during prediction.
#[derive(Debug, Error)]
pub enum PredictError {
    /// Stack bands differ from the model's, by name or order.
    #[error("Model expects bands {expected:?} but the stack has {found:?}")]
    BandMismatch {
        /// Model band names.
        expected: Vec<String>,
        /// Stack band names.
        found: Vec<String>,
    },

    /// Raster error.
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),
}

/// Share of valid cells classified as suitable.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SuitabilitySummary {
    /// Cells with a classification.
    pub valid_cells: usize,
    /// Cells classified suitable.
    pub suitable_cells: usize,
    /// `suitable_cells / valid_cells`, 0 when no cell is valid.
    pub suitable_fraction: f64,
}

impl SuitabilitySummary {
    /// Summarise a layer of 0/1 classifications.
    pub fn from_layer(classified: &RasterLayer) -> Self {
        let valid_cells = classified.valid_count();
        let suitable_cells = classified.data().iter().filter(|&&v| v == 1.0).count();
        let suitable_fraction = if valid_cells == 0 {
            0.0
        } else {
            suitable_cells as f64 / valid_cells as f64
        };
        Self {
            valid_cells,
            suitable_cells,
            suitable_fraction,
        }
    }
}

/// Presence probability for every cell of `stack`.
///
/// The stack's band names must equal the model's, in the same order. Cells
/// where any band is missing are `NaN` in the output.
pub fn predict_surface(
    model: &LogisticModel,
    stack: &RasterStack,
) -> Result<RasterLayer, PredictError> {
    let found = stack.band_names();
    if found.as_slice() != model.band_names() {
        return Err(PredictError::BandMismatch {
            expected: model.band_names().to_vec(),
            found,
        });
    }

    let grid = *stack.grid();
    let data: Vec<f32> = (0..grid.cell_count())
        .map(|index| match stack.cell_values(index) {
            Some(values) => model.predict(&values) as f32,
            None => f32::NAN,
        })
        .collect();

    let surface = RasterLayer::new(PROBABILITY_BAND, grid, data)?;
    tracing::info!(
        cells = grid.cell_count(),
        predicted = surface.valid_count(),
        "Predicted probability surface"
    );
    Ok(surface)
}

/// Binary suitability map: 1 where probability >= `threshold`, 0 elsewhere.
///
/// Missing cells stay missing.
pub fn classify(surface: &RasterLayer, threshold: f64) -> RasterLayer {
    surface.map(SUITABILITY_BAND, |p| {
        if f64::from(p) >= threshold {
            1.0
        } else {
            0.0
        }
    })
}
