//! Ordered collection of same-grid raster layers.

use crate::{Extent, Grid, RasterError, RasterLayer, Result};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// An ordered stack of environmental bands sharing one grid.
///
/// Band order is significant: feature vectors extracted from the stack list
/// values in band order, and a fitted model can only be applied to a stack
/// with the same band names in the same order.
///
/// # Example
///
/// ```no_run
/// use sdm_raster::RasterStack;
///
/// let stack = RasterStack::from_directory("data/wc2.1_2.5m")?;
/// println!("{} bands: {:?}", stack.len(), stack.band_names());
///
/// // Values of every band at a coordinate (None if outside or missing)
/// let values = stack.extract(32.2, -110.9);
/// # Ok::<(), sdm_raster::RasterError>(())
/// ```
#[derive(Debug, Clone)]
pub struct RasterStack {
    /// Shared grid geometry.
    grid: Grid,
    /// Bands in order.
    bands: Vec<RasterLayer>,
}

impl RasterStack {
    /// Build a stack from layers, checking that they share one grid and have
    /// unique names.
    pub fn new(bands: Vec<RasterLayer>) -> Result<Self> {
        let first = bands.first().ok_or(RasterError::EmptyStack)?;
        let grid = *first.grid();

        let mut seen = HashSet::new();
        for band in &bands {
            if !seen.insert(band.name().to_string()) {
                return Err(RasterError::DuplicateBand(band.name().to_string()));
            }
            if let Some(reason) = grid.mismatch(band.grid()) {
                return Err(RasterError::GridMismatch {
                    band: band.name().to_string(),
                    reason,
                });
            }
        }

        Ok(Self { grid, bands })
    }

    /// Load every GeoTIFF in a directory as one stack.
    ///
    /// Files are ordered naturally by name, so `bio_2` precedes `bio_10`.
    pub fn from_directory<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_geotiff(path))
            .collect();

        if paths.is_empty() {
            return Err(RasterError::NoRasterFiles(dir.to_path_buf()));
        }

        paths.sort_by(|a, b| {
            let a = a.file_name().and_then(|s| s.to_str()).unwrap_or_default();
            let b = b.file_name().and_then(|s| s.to_str()).unwrap_or_default();
            natural_cmp(a, b)
        });

        tracing::info!("Loading {} raster layers from {}", paths.len(), dir.display());
        Self::from_files(&paths)
    }

    /// Load the given GeoTIFF files, in order, as one stack.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let bands = paths
            .iter()
            .map(RasterLayer::from_geotiff)
            .collect::<Result<Vec<_>>>()?;
        Self::new(bands)
    }

    /// Shared grid geometry.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Geographic bounds of the stack.
    pub fn extent(&self) -> Extent {
        self.grid.extent
    }

    /// Number of bands.
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    /// Always false; a stack holds at least one band.
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Band names in order.
    pub fn band_names(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.name().to_string()).collect()
    }

    /// Bands in order.
    pub fn bands(&self) -> &[RasterLayer] {
        &self.bands
    }

    /// Look up a band by name.
    pub fn band(&self, name: &str) -> Option<&RasterLayer> {
        self.bands.iter().find(|b| b.name() == name)
    }

    /// Crop every band to the cells covering `extent`.
    pub fn crop(&self, extent: &Extent) -> Result<Self> {
        let window = self.grid.window(extent).ok_or(RasterError::NoOverlap {
            min_lat: extent.min_lat,
            max_lat: extent.max_lat,
            min_lon: extent.min_lon,
            max_lon: extent.max_lon,
        })?;

        let bands: Vec<RasterLayer> = self.bands.iter().map(|b| b.crop(&window)).collect();
        tracing::debug!(
            ncols = window.ncols,
            nrows = window.nrows,
            "Cropped raster stack to {:?}",
            extent
        );

        Ok(Self {
            grid: self.grid.sub_grid(&window),
            bands,
        })
    }

    /// Values of every band at a coordinate, in band order.
    ///
    /// Returns `None` when the coordinate is outside the stack or any band is
    /// missing at that cell.
    pub fn extract(&self, lat: f64, lon: f64) -> Option<Vec<f64>> {
        let index = self.grid.cell_at(lat, lon)?;
        self.cell_values(index)
    }

    /// Values of every band at a cell index, `None` if any band is missing.
    pub fn cell_values(&self, index: usize) -> Option<Vec<f64>> {
        self.bands
            .iter()
            .map(|b| b.get(index).map(f64::from))
            .collect()
    }

    /// Indices of cells where every band holds data, in ascending order.
    pub fn valid_cells(&self) -> Vec<usize> {
        (0..self.grid.cell_count())
            .filter(|&index| self.bands.iter().all(|b| b.get(index).is_some()))
            .collect()
    }

    /// Same bands under new names, e.g. to align a forecast stack with the
    /// band names of the current-climate stack.
    pub fn rename_bands<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        if names.len() != self.bands.len() {
            return Err(RasterError::BandCountMismatch {
                expected: self.bands.len(),
                found: names.len(),
            });
        }
        let bands = self
            .bands
            .iter()
            .zip(names)
            .map(|(band, name)| band.clone().renamed(name.as_ref()))
            .collect();
        Self::new(bands)
    }

    /// Sub-stack holding the named bands in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let bands = names
            .iter()
            .map(|name| {
                self.band(name.as_ref())
                    .cloned()
                    .ok_or_else(|| RasterError::UnknownBand(name.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(bands)
    }
}

fn is_geotiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false)
}

/// Compare names treating runs of digits as numbers.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let na = take_number(&mut a_chars);
                let nb = take_number(&mut b_chars);
                match na.cmp(&nb) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            (Some(ca), Some(cb)) => {
                a_chars.next();
                b_chars.next();
                match ca.cmp(&cb) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
        }
    }
}

fn take_number<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) -> u64 {
    let mut value: u64 = 0;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        value = value.saturating_mul(10).saturating_add(d as u64);
        chars.next();
    }
    value
}
