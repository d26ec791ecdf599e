//! PNG rendering of suitability maps.

use crate::Result;
use sdm_raster::{Coordinate, RasterLayer};
use std::path::Path;

/// Longest image side the renderer scales small grids up to.
const TARGET_SIZE: usize = 800;

/// Largest number of pixels drawn per cell.
const MAX_CELL_PIXELS: usize = 16;

const MISSING: image::Rgb<u8> = image::Rgb([235, 235, 235]);
const UNSUITABLE: image::Rgb<u8> = image::Rgb([222, 203, 164]);
const SUITABLE: image::Rgb<u8> = image::Rgb([46, 125, 50]);
const PRESENCE: image::Rgb<u8> = image::Rgb([200, 30, 30]);

/// Draw a 0/1 suitability layer with presence points on top.
///
/// Returns the image size in pixels.
pub fn render_suitability<P: AsRef<Path>>(
    suitability: &RasterLayer,
    presence: &[Coordinate],
    path: P,
) -> Result<(u32, u32)> {
    let grid = suitability.grid();
    let scale = (TARGET_SIZE / grid.ncols.max(grid.nrows)).clamp(1, MAX_CELL_PIXELS);
    let width = (grid.ncols * scale) as u32;
    let height = (grid.nrows * scale) as u32;

    let mut img = image::RgbImage::new(width, height);
    for (index, &value) in suitability.data().iter().enumerate() {
        let (row, col) = grid.row_col(index);
        let px = if value.is_nan() {
            MISSING
        } else if value >= 1.0 {
            SUITABLE
        } else {
            UNSUITABLE
        };
        for dy in 0..scale {
            for dx in 0..scale {
                img.put_pixel((col * scale + dx) as u32, (row * scale + dy) as u32, px);
            }
        }
    }

    // Markers are 3 px wide, or one cell when cells are larger.
    let radius = (scale / 2).max(1) as i64;
    let extent = grid.extent;
    for point in presence {
        if !extent.contains(point.lat, point.lon) {
            continue;
        }
        let x = ((point.lon - extent.min_lon) / extent.width() * width as f64) as i64;
        let y = ((extent.max_lat - point.lat) / extent.height() * height as f64) as i64;
        for py in (y - radius)..=(y + radius) {
            for px in (x - radius)..=(x + radius) {
                if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                    img.put_pixel(px as u32, py as u32, PRESENCE);
                }
            }
        }
    }

    img.save(path.as_ref())?;
    tracing::debug!(width, height, path = %path.as_ref().display(), "Rendered suitability map");
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdm_raster::{Extent, Grid};

    #[test]
    fn test_render_suitability() {
        let grid = Grid::new(Extent::new(0.0, 2.0, 0.0, 4.0).unwrap(), 4, 2).unwrap();
        let layer = RasterLayer::new(
            "suitability",
            grid,
            vec![1.0, 0.0, f32::NAN, 1.0, 0.0, 0.0, 1.0, 1.0],
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");

        let (width, height) =
            render_suitability(&layer, &[Coordinate::new(0.5, 3.5)], &path).unwrap();
        assert_eq!((width, height), (64, 32));

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (64, 32));
        assert_eq!(*img.get_pixel(0, 0), SUITABLE);
        assert_eq!(*img.get_pixel(20, 0), UNSUITABLE);
        assert_eq!(*img.get_pixel(40, 0), MISSING);
        // Presence marker centred in the south-east cell
        assert_eq!(*img.get_pixel(56, 24), PRESENCE);
    }
}
