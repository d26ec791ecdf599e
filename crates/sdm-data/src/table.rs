//! Labelled feature tables built from points and a raster stack.

use crate::{DataError, Result};
use sdm_raster::{Coordinate, RasterStack};

/// Class of a feature row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Label {
    /// Background (pseudo-absence) point, response 0.
    Background,
    /// Observed presence point, response 1.
    Presence,
}

impl Label {
    /// Numeric response value.
    pub fn value(self) -> f64 {
        match self {
            Label::Background => 0.0,
            Label::Presence => 1.0,
        }
    }
}

/// How the assembler treats points without a full set of values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MissingPolicy {
    /// Drop the point and log a warning.
    #[default]
    Drop,
    /// Fail with [`DataError::MissingFeatures`].
    Error,
}

/// One labelled point with its environmental values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureRow {
    /// Class of the point.
    pub label: Label,
    /// Location of the point.
    pub coordinate: Coordinate,
    /// One value per band, in table band order.
    pub values: Vec<f64>,
}

/// Rows sharing one band list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureTable {
    band_names: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Create a table, checking every row has one value per band.
    pub fn new(band_names: Vec<String>, rows: Vec<FeatureRow>) -> Result<Self> {
        if let Some((row, bad)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.values.len() != band_names.len())
        {
            return Err(DataError::RowWidth {
                row,
                expected: band_names.len(),
                found: bad.values.len(),
            });
        }
        Ok(Self { band_names, rows })
    }

    /// Band names, one per value column.
    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    /// All rows in order.
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of value columns.
    pub fn band_count(&self) -> usize {
        self.band_names.len()
    }

    /// Number of rows with `label`.
    pub fn count(&self, label: Label) -> usize {
        self.rows.iter().filter(|r| r.label == label).count()
    }

    /// Response vector (1 for presence, 0 for background).
    pub fn responses(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.label.value()).collect()
    }

    /// New table holding the rows at `indices`, in that order.
    ///
    /// Indices past the end are ignored.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            band_names: self.band_names.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// New table holding only rows with `label`.
    pub fn with_label(&self, label: Label) -> Self {
        Self {
            band_names: self.band_names.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| r.label == label)
                .cloned()
                .collect(),
        }
    }
}

/// Counts of points kept and dropped by [`assemble`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssemblyReport {
    /// Presence rows in the table.
    pub presence_kept: usize,
    /// Presence points without full values.
    pub presence_dropped: usize,
    /// Background rows in the table.
    pub background_kept: usize,
    /// Background points without full values.
    pub background_dropped: usize,
}

/// Join presence and background points with the stack values under them.
///
/// Presence rows come first, then background rows, each in input order.
/// Columns follow the stack's band order.
pub fn assemble(
    presence: &[Coordinate],
    background: &[Coordinate],
    stack: &RasterStack,
    policy: MissingPolicy,
) -> Result<(FeatureTable, AssemblyReport)> {
    let mut rows = Vec::with_capacity(presence.len() + background.len());
    let mut report = AssemblyReport::default();

    let groups = [(Label::Presence, presence), (Label::Background, background)];
    for (label, points) in groups {
        for &coordinate in points {
            match stack.extract(coordinate.lat, coordinate.lon) {
                Some(values) => {
                    rows.push(FeatureRow {
                        label,
                        coordinate,
                        values,
                    });
                    match label {
                        Label::Presence => report.presence_kept += 1,
                        Label::Background => report.background_kept += 1,
                    }
                }
                None if policy == MissingPolicy::Error => {
                    return Err(DataError::MissingFeatures {
                        label,
                        lat: coordinate.lat,
                        lon: coordinate.lon,
                    });
                }
                None => match label {
                    Label::Presence => report.presence_dropped += 1,
                    Label::Background => report.background_dropped += 1,
                },
            }
        }
    }

    let dropped = report.presence_dropped + report.background_dropped;
    if dropped > 0 {
        tracing::warn!(
            presence_dropped = report.presence_dropped,
            background_dropped = report.background_dropped,
            "Dropped points with missing environmental values"
        );
    }
    tracing::info!(
        presence = report.presence_kept,
        background = report.background_kept,
        bands = stack.len(),
        "Assembled feature table"
    );

    let table = FeatureTable::new(stack.band_names(), rows)?;
    Ok((table, report))
}
