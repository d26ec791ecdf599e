//! Regular latitude/longitude grid geometry.

use crate::{Coordinate, Extent, RasterError, Result};

/// Relative tolerance used when comparing grid bounds.
const GRID_TOLERANCE: f64 = 1e-6;

/// A regular grid of `nrows` x `ncols` area cells covering an extent.
///
/// Cells are indexed in row-major order, row 0 at the north edge and
/// column 0 at the west edge.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Grid {
    /// Outer bounds of the grid (cell edges, not centres).
    pub extent: Extent,
    /// Number of columns (west to east).
    pub ncols: usize,
    /// Number of rows (north to south).
    pub nrows: usize,
}

/// A rectangular block of cells inside a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// First row of the block.
    pub row0: usize,
    /// First column of the block.
    pub col0: usize,
    /// Rows in the block.
    pub nrows: usize,
    /// Columns in the block.
    pub ncols: usize,
}

impl Grid {
    /// Create a grid, rejecting empty dimensions and zero-area extents.
    pub fn new(extent: Extent, ncols: usize, nrows: usize) -> Result<Self> {
        if ncols == 0 || nrows == 0 {
            return Err(RasterError::InvalidExtent(format!(
                "grid must have at least one cell, got {ncols}x{nrows}"
            )));
        }
        if extent.width() <= 0.0 || extent.height() <= 0.0 {
            return Err(RasterError::InvalidExtent(
                "grid extent must have positive width and height".to_string(),
            ));
        }
        Ok(Self {
            extent,
            ncols,
            nrows,
        })
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.ncols * self.nrows
    }

    /// Cell size in degrees as (longitude, latitude).
    pub fn resolution(&self) -> (f64, f64) {
        (
            self.extent.width() / self.ncols as f64,
            self.extent.height() / self.nrows as f64,
        )
    }

    /// Index of the cell containing a coordinate, or `None` outside the grid.
    ///
    /// Points on the east or south edge belong to the last column or row.
    pub fn cell_at(&self, lat: f64, lon: f64) -> Option<usize> {
        if !lat.is_finite() || !lon.is_finite() || !self.extent.contains(lat, lon) {
            return None;
        }
        let (res_x, res_y) = self.resolution();
        let col = (((lon - self.extent.min_lon) / res_x).floor() as usize).min(self.ncols - 1);
        let row = (((self.extent.max_lat - lat) / res_y).floor() as usize).min(self.nrows - 1);
        Some(row * self.ncols + col)
    }

    /// Split a cell index into (row, column).
    pub fn row_col(&self, index: usize) -> (usize, usize) {
        (index / self.ncols, index % self.ncols)
    }

    /// Centre of a cell.
    pub fn cell_center(&self, index: usize) -> Coordinate {
        let (row, col) = self.row_col(index);
        let (res_x, res_y) = self.resolution();
        Coordinate::new(
            self.extent.max_lat - (row as f64 + 0.5) * res_y,
            self.extent.min_lon + (col as f64 + 0.5) * res_x,
        )
    }

    /// Block of whole cells covering the part of `extent` that overlaps the grid.
    ///
    /// Partially covered cells are included, so the block snaps outward.
    pub fn window(&self, extent: &Extent) -> Option<Window> {
        let overlap = self.extent.intersection(extent)?;
        let (res_x, res_y) = self.resolution();

        let col0 = snap((overlap.min_lon - self.extent.min_lon) / res_x).floor() as usize;
        let col1 = snap((overlap.max_lon - self.extent.min_lon) / res_x).ceil() as usize;
        let row0 = snap((self.extent.max_lat - overlap.max_lat) / res_y).floor() as usize;
        let row1 = snap((self.extent.max_lat - overlap.min_lat) / res_y).ceil() as usize;

        let col0 = col0.min(self.ncols - 1);
        let row0 = row0.min(self.nrows - 1);
        let col1 = col1.clamp(col0 + 1, self.ncols);
        let row1 = row1.clamp(row0 + 1, self.nrows);

        Some(Window {
            row0,
            col0,
            nrows: row1 - row0,
            ncols: col1 - col0,
        })
    }

    /// Geometry of a window cut from this grid.
    pub fn sub_grid(&self, window: &Window) -> Grid {
        let (res_x, res_y) = self.resolution();
        let max_lat = self.extent.max_lat - window.row0 as f64 * res_y;
        let min_lon = self.extent.min_lon + window.col0 as f64 * res_x;
        Grid {
            extent: Extent {
                min_lat: max_lat - window.nrows as f64 * res_y,
                max_lat,
                min_lon,
                max_lon: min_lon + window.ncols as f64 * res_x,
            },
            ncols: window.ncols,
            nrows: window.nrows,
        }
    }

    /// Describe the first difference from another grid, or `None` if they match.
    pub fn mismatch(&self, other: &Grid) -> Option<String> {
        if self.ncols != other.ncols || self.nrows != other.nrows {
            return Some(format!(
                "dimensions {}x{} vs {}x{}",
                self.ncols, self.nrows, other.ncols, other.nrows
            ));
        }
        let (res_x, res_y) = self.resolution();
        let tol_x = res_x * GRID_TOLERANCE;
        let tol_y = res_y * GRID_TOLERANCE;
        let a = &self.extent;
        let b = &other.extent;
        if (a.min_lon - b.min_lon).abs() > tol_x
            || (a.max_lon - b.max_lon).abs() > tol_x
            || (a.min_lat - b.min_lat).abs() > tol_y
            || (a.max_lat - b.max_lat).abs() > tol_y
        {
            return Some(format!("extent {:?} vs {:?}", a, b));
        }
        None
    }
}

impl Window {
    /// Number of cells in the window.
    pub fn cell_count(&self) -> usize {
        self.nrows * self.ncols
    }
}

/// Round values that are within floating-point noise of an integer.
fn snap(v: f64) -> f64 {
    let rounded = v.round();
    if (v - rounded).abs() < 1e-9 {
        rounded
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_grid() -> Grid {
        // 4 columns x 2 rows of 1-degree cells
        Grid::new(Extent::new(10.0, 12.0, -100.0, -96.0).unwrap(), 4, 2).unwrap()
    }

    #[test]
    fn test_cell_at() {
        let grid = test_grid();
        assert_eq!(grid.cell_at(11.5, -99.5), Some(0));
        assert_eq!(grid.cell_at(11.5, -96.5), Some(3));
        assert_eq!(grid.cell_at(10.5, -99.5), Some(4));
        // South-east corner belongs to the last cell
        assert_eq!(grid.cell_at(10.0, -96.0), Some(7));
        assert_eq!(grid.cell_at(9.9, -99.5), None);
        assert_eq!(grid.cell_at(f64::NAN, -99.5), None);
    }

    #[test]
    fn test_cell_center_roundtrip() {
        let grid = test_grid();
        for index in 0..grid.cell_count() {
            let center = grid.cell_center(index);
            assert_eq!(grid.cell_at(center.lat, center.lon), Some(index));
        }
        let center = grid.cell_center(5);
        assert_relative_eq!(center.lat, 10.5);
        assert_relative_eq!(center.lon, -98.5);
    }

    #[test]
    fn test_window_snaps_outward() {
        let grid = test_grid();
        let window = grid
            .window(&Extent::new(10.2, 11.2, -98.7, -97.3).unwrap())
            .unwrap();
        assert_eq!(
            window,
            Window {
                row0: 0,
                col0: 1,
                nrows: 2,
                ncols: 2
            }
        );

        let sub = grid.sub_grid(&window);
        assert_relative_eq!(sub.extent.min_lon, -99.0);
        assert_relative_eq!(sub.extent.max_lon, -97.0);
        assert_relative_eq!(sub.extent.max_lat, 12.0);
        assert_relative_eq!(sub.extent.min_lat, 10.0);
    }

    #[test]
    fn test_window_outside() {
        let grid = test_grid();
        assert!(grid
            .window(&Extent::new(40.0, 41.0, 0.0, 1.0).unwrap())
            .is_none());
    }

    #[test]
    fn test_mismatch() {
        let grid = test_grid();
        assert!(grid.mismatch(&grid).is_none());

        let shifted = Grid::new(Extent::new(10.5, 12.5, -100.0, -96.0).unwrap(), 4, 2).unwrap();
        assert!(grid.mismatch(&shifted).is_some());

        let finer = Grid::new(grid.extent, 8, 4).unwrap();
        assert!(grid.mismatch(&finer).unwrap().contains("dimensions"));
    }
}
