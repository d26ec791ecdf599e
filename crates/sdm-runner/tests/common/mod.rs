//! Shared fixtures: a simulated landscape written to disk as GeoTIFFs.

#![allow(dead_code)]

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sdm_raster::{Coordinate, Extent, Grid, RasterLayer, RasterStack};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SIZE: usize = 40;

/// Three-band landscape. Temperature falls from south to north and elevation
/// has scattered missing cells.
pub fn landscape(seed: u64, warming: f32) -> RasterStack {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let grid = Grid::new(Extent::new(30.0, 40.0, -120.0, -110.0).unwrap(), SIZE, SIZE).unwrap();
    let temperature = (0..SIZE * SIZE)
        .map(|i| (SIZE - 1 - i / SIZE) as f32 + rng.gen_range(-2.0..2.0) + warming)
        .collect();
    let precipitation = (0..SIZE * SIZE)
        .map(|_| rng.gen_range(100.0..900.0))
        .collect();
    let elevation = (0..SIZE * SIZE)
        .map(|i| if i % 97 == 0 { f32::NAN } else { rng.gen_range(0.0..2500.0) })
        .collect();
    RasterStack::new(vec![
        RasterLayer::new("temperature", grid, temperature).unwrap(),
        RasterLayer::new("precipitation", grid, precipitation).unwrap(),
        RasterLayer::new("elevation", grid, elevation).unwrap(),
    ])
    .unwrap()
}

/// Presence points drawn with a probability rising with temperature.
pub fn presence_points(stack: &RasterStack, seed: u64, count: usize) -> Vec<Coordinate> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let temperature = stack.band("temperature").unwrap();
    let mut cells = stack.valid_cells();
    cells.shuffle(&mut rng);

    let mut points = Vec::new();
    for cell in cells.into_iter().cycle() {
        if points.len() == count {
            break;
        }
        let t = f64::from(temperature.get(cell).unwrap());
        let p = 1.0 / (1.0 + (-(-6.0 + 0.25 * t)).exp());
        if rng.gen::<f64>() < p {
            points.push(stack.grid().cell_center(cell));
        }
    }
    points
}

/// Write every band of `stack` as `<band>.tif` under `dir`.
pub fn write_stack(stack: &RasterStack, dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    for band in stack.bands() {
        band.write_geotiff(dir.join(format!("{}.tif", band.name())))
            .unwrap();
    }
}

/// Write an occurrence CSV, appending `missing` rows without coordinates.
pub fn write_occurrences(points: &[Coordinate], missing: usize, path: &Path) {
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "species,latitude,longitude").unwrap();
    for point in points {
        writeln!(file, "Carnegiea gigantea,{},{}", point.lat, point.lon).unwrap();
    }
    for _ in 0..missing {
        writeln!(file, "Carnegiea gigantea,NA,").unwrap();
    }
}

/// Paths of a prepared run directory.
pub struct Fixture {
    pub occurrences: PathBuf,
    pub current_dir: PathBuf,
    pub forecast_dir: PathBuf,
    pub presence: usize,
}

/// Lay out current and forecast layers plus 60 occurrences (and 2 incomplete
/// rows) under `root`.
pub fn prepare(root: &Path) -> Fixture {
    let current = landscape(3, 0.0);
    let forecast = landscape(3, 3.0);
    let points = presence_points(&current, 5, 60);

    let current_dir = root.join("current");
    let forecast_dir = root.join("forecast");
    write_stack(&current, &current_dir);
    write_stack(&forecast, &forecast_dir);

    let occurrences = root.join("occurrences.csv");
    write_occurrences(&points, 2, &occurrences);

    Fixture {
        occurrences,
        current_dir,
        forecast_dir,
        presence: points.len(),
    }
}
