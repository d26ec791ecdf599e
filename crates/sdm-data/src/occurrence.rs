//! Presence records loaded from occurrence CSV files.

use crate::{DataError, Result};
use sdm_raster::{Coordinate, Extent};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Accepted header names for the latitude column (lower case).
const LATITUDE_HEADERS: &[&str] = &["latitude", "lat", "decimallatitude"];

/// Accepted header names for the longitude column (lower case).
const LONGITUDE_HEADERS: &[&str] = &["longitude", "lon", "lng", "decimallongitude"];

/// One occurrence record. Either coordinate may be missing in the source.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OccurrenceRecord {
    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,
}

impl OccurrenceRecord {
    /// Record with both coordinates present.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    /// Coordinate of the record if both values are present and finite.
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(Coordinate::new(lat, lon))
            }
            _ => None,
        }
    }

    /// Whether the record has a usable coordinate.
    pub fn is_complete(&self) -> bool {
        self.coordinate().is_some()
    }
}

/// An ordered set of occurrence records.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OccurrenceSet {
    records: Vec<OccurrenceRecord>,
}

impl OccurrenceSet {
    /// Create a set from records.
    pub fn new(records: Vec<OccurrenceRecord>) -> Self {
        Self { records }
    }

    /// Load occurrences from a CSV file with a header row.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DataError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let set = Self::from_reader(file, &path.display().to_string())?;

        tracing::info!(
            path = %path.display(),
            records = set.len(),
            complete = set.complete_count(),
            "Loaded occurrence records"
        );
        Ok(set)
    }

    /// Load occurrences from any CSV reader. `source_name` is used in errors.
    pub fn from_reader<R: Read>(reader: R, source_name: &str) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.contains(&h.to_ascii_lowercase().as_str()))
        };
        let lat_idx = find(LATITUDE_HEADERS).ok_or_else(|| DataError::MissingColumn {
            column: "latitude",
            source_name: source_name.to_string(),
        })?;
        let lon_idx = find(LONGITUDE_HEADERS).ok_or_else(|| DataError::MissingColumn {
            column: "longitude",
            source_name: source_name.to_string(),
        })?;

        let mut records = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            records.push(OccurrenceRecord {
                latitude: parse_cell(record.get(lat_idx), "latitude", line)?,
                longitude: parse_cell(record.get(lon_idx), "longitude", line)?,
            });
        }

        Ok(Self { records })
    }

    /// All records, including incomplete ones.
    pub fn records(&self) -> &[OccurrenceRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records with a usable coordinate.
    pub fn complete_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_complete()).count()
    }

    /// Copy of the set without records missing either coordinate.
    ///
    /// Applying this twice gives the same result as applying it once.
    pub fn filter_missing(&self) -> Self {
        let records: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.is_complete())
            .copied()
            .collect();

        let dropped = self.records.len() - records.len();
        if dropped > 0 {
            tracing::debug!(dropped, kept = records.len(), "Dropped incomplete occurrences");
        }
        Self { records }
    }

    /// Coordinates of the complete records, in order.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.records.iter().filter_map(|r| r.coordinate()).collect()
    }

    /// Bounding box of the complete records.
    pub fn extent(&self) -> Option<Extent> {
        Extent::from_coordinates(&self.coordinates())
    }
}

impl FromIterator<OccurrenceRecord> for OccurrenceSet {
    fn from_iter<I: IntoIterator<Item = OccurrenceRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn parse_cell(cell: Option<&str>, column: &'static str, line: u64) -> Result<Option<f64>> {
    let text = match cell {
        None => return Ok(None),
        Some(text) => text.trim(),
    };
    if text.is_empty() || text.eq_ignore_ascii_case("na") {
        return Ok(None);
    }
    let value: f64 = text.parse().map_err(|_| DataError::InvalidNumber {
        column,
        value: text.to_string(),
        line,
    })?;
    Ok(value.is_finite().then_some(value))
}
