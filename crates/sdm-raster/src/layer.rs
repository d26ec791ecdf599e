//! Single raster band representation.

use crate::{Extent, Grid, RasterError, Result, Window};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tiff::ColorType;

/// GeoKey directory for a geographic WGS84 raster with area cells.
///
/// Header (version 1.1.0, 3 keys) followed by GTModelType = Geographic,
/// GTRasterType = PixelIsArea, GeographicType = EPSG:4326.
const WGS84_GEO_KEYS: [u16; 16] = [1, 1, 0, 3, 1024, 0, 1, 2, 1025, 0, 1, 1, 2048, 0, 1, 4326];

/// One named band of a raster, e.g. a single bioclimatic variable.
///
/// Values are stored in row-major order (north to south, west to east).
/// Missing cells are `NaN`.
#[derive(Debug, Clone)]
pub struct RasterLayer {
    /// Band name (file stem when loaded from disk).
    name: String,
    /// Grid geometry.
    grid: Grid,
    /// Cell values.
    data: Vec<f32>,
}

impl RasterLayer {
    /// Create a layer from an in-memory buffer.
    pub fn new(name: impl Into<String>, grid: Grid, data: Vec<f32>) -> Result<Self> {
        let name = name.into();
        if data.len() != grid.cell_count() {
            return Err(RasterError::DataLength {
                band: name,
                expected: grid.cell_count(),
                found: data.len(),
            });
        }
        Ok(Self { name, grid, data })
    }

    /// Create a layer with every cell set to `value`.
    pub fn filled(name: impl Into<String>, grid: Grid, value: f32) -> Self {
        Self {
            name: name.into(),
            data: vec![value; grid.cell_count()],
            grid,
        }
    }

    /// Load a layer from a GeoTIFF file.
    ///
    /// The extent is read from the ModelTiepoint/ModelPixelScale tags, or from
    /// a ModelTransformation matrix when those are absent. The band is named
    /// after the file stem.
    pub fn from_geotiff<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut decoder = Self::open_decoder(path)?;
        let (width, height) = decoder.dimensions()?;
        let extent = Self::read_georeference(&mut decoder, path, width, height)?;
        Self::decode_layer(decoder, path, extent)
    }

    fn open_decoder(path: &Path) -> Result<Decoder<File>> {
        let file = File::open(path)?;
        let mut decoder = Decoder::new(file)?;

        // Global 30 arc-second layers are 43200 x 21600 pixels = ~933 million
        // cells; allow up to 4 GB so they can be read before cropping.
        let mut limits = Limits::default();
        limits.decoding_buffer_size = 4 * 1024 * 1024 * 1024;
        limits.intermediate_buffer_size = 4 * 1024 * 1024 * 1024;
        limits.ifd_value_size = 1024 * 1024 * 1024;
        decoder = decoder.with_limits(limits);

        match decoder.colortype()? {
            ColorType::Gray(_) => Ok(decoder),
            other => Err(RasterError::UnsupportedDataType(format!(
                "{}: expected a single-band image, found {:?}",
                path.display(),
                other
            ))),
        }
    }

    fn decode_layer(mut decoder: Decoder<File>, path: &Path, extent: Extent) -> Result<Self> {
        let (width, height) = decoder.dimensions()?;
        let grid = Grid::new(extent, width as usize, height as usize)?;

        let mut data = Self::decode_samples(&mut decoder)?;
        if let Some(nodata) = Self::read_nodata_value(&mut decoder) {
            mask_nodata(&mut data, nodata);
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("band")
            .to_string();

        tracing::debug!(
            band = %name,
            ncols = grid.ncols,
            nrows = grid.nrows,
            "Loaded raster layer from {}",
            path.display()
        );

        Self::new(name, grid, data)
    }

    /// Read the geographic bounds from GeoTIFF tags.
    fn read_georeference<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
        path: &Path,
        width: u32,
        height: u32,
    ) -> Result<Extent> {
        // First try ModelTiepoint (33922) and ModelPixelScale (33550)
        let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag);
        let pixel_scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag);

        if let (Ok(tiepoint), Ok(scale)) = (tiepoint, pixel_scale) {
            if tiepoint.len() >= 6 && scale.len() >= 2 {
                // Tiepoint format: [i, j, k, x, y, z] where (i,j) is pixel coords and (x,y) is geo coords
                let (i, j) = (tiepoint[0], tiepoint[1]);
                let scale_x = scale[0];
                let scale_y = scale[1];
                let max_lat = tiepoint[4] + j * scale_y;
                let min_lon = tiepoint[3] - i * scale_x;

                return Extent::new(
                    max_lat - height as f64 * scale_y,
                    max_lat,
                    min_lon,
                    min_lon + width as f64 * scale_x,
                )
                .map_err(|e| RasterError::InvalidGeoTiff {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }

        // Fallback: 4x4 ModelTransformation matrix without rotation
        if let Ok(m) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
            if m.len() >= 16 && m[1] == 0.0 && m[4] == 0.0 {
                let (scale_x, origin_x) = (m[0], m[3]);
                let (scale_y, origin_y) = (-m[5], m[7]);
                return Extent::new(
                    origin_y - height as f64 * scale_y,
                    origin_y,
                    origin_x,
                    origin_x + width as f64 * scale_x,
                )
                .map_err(|e| RasterError::InvalidGeoTiff {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }

        Err(RasterError::InvalidGeoTiff {
            path: path.to_path_buf(),
            reason: "missing ModelTiepoint/ModelPixelScale or ModelTransformation tags"
                .to_string(),
        })
    }

    /// Decode cell values, widening every sample type to `f32`.
    fn decode_samples<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
    ) -> Result<Vec<f32>> {
        let result = decoder.read_image()?;

        match result {
            DecodingResult::F32(data) => Ok(data),
            DecodingResult::F64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        }
    }

    /// Try to read the no-data value from the GDAL_NODATA tag.
    fn read_nodata_value<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
        // GDAL_NODATA tag is 42113, stored as ASCII string
        decoder
            .get_tag_ascii_string(Tag::GdalNodata)
            .ok()
            .and_then(|s| s.trim().trim_end_matches('\0').parse().ok())
    }

    /// Write the layer as a single-band 32-bit float GeoTIFF.
    ///
    /// Missing cells are written as `NaN` and flagged through GDAL_NODATA.
    pub fn write_geotiff<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
        let mut image = encoder.new_image::<colortype::Gray32Float>(
            self.grid.ncols as u32,
            self.grid.nrows as u32,
        )?;

        let (res_x, res_y) = self.grid.resolution();
        let scale = [res_x, res_y, 0.0];
        let tiepoint = [
            0.0,
            0.0,
            0.0,
            self.grid.extent.min_lon,
            self.grid.extent.max_lat,
            0.0,
        ];
        image.encoder().write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
        image.encoder().write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
        image.encoder().write_tag(Tag::GeoKeyDirectoryTag, &WGS84_GEO_KEYS[..])?;
        image.encoder().write_tag(Tag::GdalNodata, "nan")?;
        image.write_data(&self.data)?;

        tracing::debug!(band = %self.name, "Wrote GeoTIFF {}", path.display());
        Ok(())
    }

    /// Get the value of a cell by index, `None` for missing cells.
    pub fn get(&self, index: usize) -> Option<f32> {
        self.data.get(index).copied().filter(|v| v.is_finite())
    }

    /// Copy out a block of cells as a new layer.
    pub fn crop(&self, window: &Window) -> Self {
        let mut data = Vec::with_capacity(window.cell_count());
        for row in window.row0..window.row0 + window.nrows {
            let start = row * self.grid.ncols + window.col0;
            data.extend_from_slice(&self.data[start..start + window.ncols]);
        }
        Self {
            name: self.name.clone(),
            grid: self.grid.sub_grid(window),
            data,
        }
    }

    /// Apply a function to every valid cell, keeping missing cells missing.
    pub fn map<F>(&self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(f32) -> f32,
    {
        let data = self
            .data
            .iter()
            .map(|&v| if v.is_finite() { f(v) } else { f32::NAN })
            .collect();
        Self {
            name: name.into(),
            grid: self.grid,
            data,
        }
    }

    /// Same cells under a different band name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Band name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Grid geometry.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Raw cell buffer (row-major, `NaN` = missing).
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Number of cells holding data.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }

    /// Minimum and maximum over valid cells, `None` if every cell is missing.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Replace sentinel values with `NaN`.
fn mask_nodata(data: &mut [f32], nodata: f32) {
    if nodata.is_nan() {
        return;
    }
    let tolerance = nodata.abs().max(1.0) * 1e-6;
    for v in data.iter_mut() {
        if (*v - nodata).abs() <= tolerance {
            *v = f32::NAN;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_2x2() -> Grid {
        Grid::new(Extent::new(0.0, 2.0, 0.0, 2.0).unwrap(), 2, 2).unwrap()
    }

    #[test]
    fn test_new_checks_length() {
        let result = RasterLayer::new("bio1", grid_2x2(), vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            result,
            Err(RasterError::DataLength {
                expected: 4,
                found: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_mask_nodata() {
        let mut data = vec![-9999.0, 12.5, -9999.0001, 0.0];
        mask_nodata(&mut data, -9999.0);
        assert!(data[0].is_nan());
        assert_eq!(data[1], 12.5);
        assert!(data[2].is_nan());
        assert_eq!(data[3], 0.0);

        let mut worldclim = vec![-3.4e38_f32, 4.0];
        mask_nodata(&mut worldclim, -3.4e38);
        assert!(worldclim[0].is_nan());
        assert_eq!(worldclim[1], 4.0);
    }

    #[test]
    fn test_map_preserves_missing() {
        let layer = RasterLayer::new("p", grid_2x2(), vec![0.1, 0.6, f32::NAN, 0.9]).unwrap();
        let binary = layer.map("binary", |v| if v >= 0.5 { 1.0 } else { 0.0 });

        assert_eq!(binary.name(), "binary");
        assert_eq!(binary.data()[0], 0.0);
        assert_eq!(binary.data()[1], 1.0);
        assert!(binary.data()[2].is_nan());
        assert_eq!(binary.valid_count(), 3);
        assert_eq!(layer.min_max(), Some((0.1, 0.9)));
    }

    #[test]
    fn test_crop() {
        let grid = Grid::new(Extent::new(0.0, 3.0, 0.0, 3.0).unwrap(), 3, 3).unwrap();
        let layer = RasterLayer::new("v", grid, (0..9).map(|v| v as f32).collect()).unwrap();
        let window = Window {
            row0: 1,
            col0: 1,
            nrows: 2,
            ncols: 2,
        };
        let cropped = layer.crop(&window);
        assert_eq!(cropped.data(), &[4.0, 5.0, 7.0, 8.0]);
        assert_eq!(cropped.grid().extent, Extent::new(0.0, 2.0, 1.0, 3.0).unwrap());
    }
}
