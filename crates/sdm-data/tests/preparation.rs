//! End-to-end data preparation: CSV occurrences through to a train/test split.

use sdm_data::{
    assemble, sample_background, split, stratified_folds, BackgroundConfig, Label, MissingPolicy,
    OccurrenceSet,
};
use sdm_raster::{Extent, Grid, RasterLayer, RasterStack};
use std::io::Write;

/// 20 x 20 quarter-degree grid with two smooth bands and a missing corner.
fn stack() -> RasterStack {
    let grid = Grid::new(Extent::new(30.0, 35.0, -115.0, -110.0).unwrap(), 20, 20).unwrap();
    let temperature = (0..400)
        .map(|i| {
            let (row, col) = (i / 20, i % 20);
            if row < 2 && col < 2 {
                f32::NAN
            } else {
                10.0 + row as f32 * 0.5 + col as f32 * 0.1
            }
        })
        .collect();
    let precipitation = (0..400)
        .map(|i| 200.0 + ((i * 37) % 113) as f32)
        .collect();
    RasterStack::new(vec![
        RasterLayer::new("bio1", grid, temperature).unwrap(),
        RasterLayer::new("bio12", grid, precipitation).unwrap(),
    ])
    .unwrap()
}

fn write_occurrences(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("occurrences.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "species,latitude,longitude").unwrap();
    for i in 0..12 {
        writeln!(file, "Carnegiea gigantea,{},{}", 30.6 + i as f64 * 0.35, -114.4 + i as f64 * 0.3).unwrap();
    }
    writeln!(file, "Carnegiea gigantea,NA,-112.0").unwrap();
    writeln!(file, "Carnegiea gigantea,33.0,").unwrap();
    // Outside the stack
    writeln!(file, "Carnegiea gigantea,40.0,-100.0").unwrap();
    path
}

#[test]
fn test_prepare_training_data() {
    let dir = tempfile::tempdir().unwrap();
    let occurrences = OccurrenceSet::from_csv(write_occurrences(dir.path())).unwrap();
    assert_eq!(occurrences.len(), 15);

    let presence = occurrences.filter_missing();
    assert_eq!(presence.len(), 13);
    assert_eq!(presence.filter_missing(), presence);

    let stack = stack();
    let background =
        sample_background(&stack, &BackgroundConfig::new(100, 19), &presence.coordinates())
            .unwrap();
    assert_eq!(background.len(), 100);

    let (table, report) = assemble(
        &presence.coordinates(),
        &background,
        &stack,
        MissingPolicy::Drop,
    )
    .unwrap();
    assert_eq!(report.presence_kept, 12);
    assert_eq!(report.presence_dropped, 1);
    assert_eq!(report.background_kept, 100);
    assert_eq!(table.count(Label::Presence), 12);
    assert_eq!(table.count(Label::Background), 100);
    assert_eq!(table.band_names(), ["bio1", "bio12"]);

    let folds = stratified_folds(&table, 4, 19).unwrap();
    let data = split(&table, &folds, 2).unwrap();
    assert_eq!(data.test.count(Label::Presence), 3);
    assert_eq!(data.test.count(Label::Background), 25);
    assert_eq!(data.train.len() + data.test.len(), table.len());
}

#[test]
fn test_preparation_is_reproducible() {
    let stack = stack();
    let config = BackgroundConfig::new(60, 2024);
    let run = || {
        let background = sample_background(&stack, &config, &[]).unwrap();
        let (table, _) = assemble(&[], &background, &stack, MissingPolicy::Error).unwrap();
        let folds = stratified_folds(&table, 5, 2024).unwrap();
        (background, folds)
    };
    assert_eq!(run(), run());
}
