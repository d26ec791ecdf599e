//! Seeded background (pseudo-absence) sampling.

use crate::{DataError, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sdm_raster::{Coordinate, RasterStack};
use std::collections::HashSet;

/// Default number of background points.
pub const DEFAULT_BACKGROUND_COUNT: usize = 1000;

/// Default random seed for sampling and fold assignment.
pub const DEFAULT_SEED: u64 = 19;

/// Background sampling parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BackgroundConfig {
    /// Number of points to draw.
    pub count: usize,
    /// RNG seed.
    pub seed: u64,
    /// Fail instead of returning fewer points when too few valid cells exist.
    pub strict: bool,
    /// Skip cells that already hold a presence point.
    pub exclude_presence_cells: bool,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_BACKGROUND_COUNT,
            seed: DEFAULT_SEED,
            strict: false,
            exclude_presence_cells: false,
        }
    }
}

impl BackgroundConfig {
    /// Config drawing `count` points with `seed`.
    pub fn new(count: usize, seed: u64) -> Self {
        Self {
            count,
            seed,
            ..Default::default()
        }
    }
}

/// Draw background points from the valid cells of `stack`.
///
/// Cells are drawn uniformly without replacement and returned as cell
/// centres. `presence` is only consulted when
/// [`BackgroundConfig::exclude_presence_cells`] is set.
pub fn sample_background(
    stack: &RasterStack,
    config: &BackgroundConfig,
    presence: &[Coordinate],
) -> Result<Vec<Coordinate>> {
    let grid = stack.grid();
    let mut candidates = stack.valid_cells();

    if config.exclude_presence_cells {
        let occupied: HashSet<usize> = presence
            .iter()
            .filter_map(|c| grid.cell_at(c.lat, c.lon))
            .collect();
        candidates.retain(|cell| !occupied.contains(cell));
    }

    let available = candidates.len();
    let amount = config.count.min(available);
    if amount < config.count {
        if config.strict {
            return Err(DataError::InsufficientCells {
                requested: config.count,
                available,
            });
        }
        tracing::warn!(
            requested = config.count,
            available,
            "Fewer valid cells than requested background points, sampling all of them"
        );
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let points: Vec<Coordinate> = rand::seq::index::sample(&mut rng, available, amount)
        .into_iter()
        .map(|i| grid.cell_center(candidates[i]))
        .collect();

    tracing::info!(
        sampled = points.len(),
        candidates = available,
        seed = config.seed,
        "Sampled background points"
    );
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdm_raster::{Extent, Grid, RasterLayer};

    /// 10 x 10 one-degree grid with the first row missing.
    fn stack() -> RasterStack {
        let grid = Grid::new(Extent::new(0.0, 10.0, 0.0, 10.0).unwrap(), 10, 10).unwrap();
        let data = (0..100)
            .map(|i| if i < 10 { f32::NAN } else { i as f32 })
            .collect();
        RasterStack::new(vec![RasterLayer::new("bio1", grid, data).unwrap()]).unwrap()
    }

    #[test]
    fn test_sample_deterministic() {
        let stack = stack();
        let config = BackgroundConfig::new(25, 42);
        let a = sample_background(&stack, &config, &[]).unwrap();
        let b = sample_background(&stack, &config, &[]).unwrap();
        assert_eq!(a.len(), 25);
        assert_eq!(a, b);

        let c = sample_background(&stack, &BackgroundConfig::new(25, 43), &[]).unwrap();
        assert_ne!(a, c, "different seeds should give different samples");
    }

    #[test]
    fn test_sample_valid_cells_without_replacement() {
        let stack = stack();
        let points = sample_background(&stack, &BackgroundConfig::new(50, 7), &[]).unwrap();

        let cells: HashSet<usize> = points
            .iter()
            .map(|p| stack.grid().cell_at(p.lat, p.lon).unwrap())
            .collect();
        assert_eq!(cells.len(), 50, "cells must not repeat");
        assert!(cells.iter().all(|&c| c >= 10), "missing cells must not be sampled");
        assert!(points.iter().all(|p| stack.extract(p.lat, p.lon).is_some()));
    }

    #[test]
    fn test_insufficient_cells() {
        let stack = stack();
        let points = sample_background(&stack, &BackgroundConfig::new(500, 1), &[]).unwrap();
        assert_eq!(points.len(), 90);

        let strict = BackgroundConfig {
            strict: true,
            ..BackgroundConfig::new(500, 1)
        };
        assert!(matches!(
            sample_background(&stack, &strict, &[]),
            Err(DataError::InsufficientCells {
                requested: 500,
                available: 90
            })
        ));
    }

    #[test]
    fn test_exclude_presence_cells() {
        let stack = stack();
        let presence = vec![Coordinate::new(0.5, 0.5), Coordinate::new(5.5, 5.5)];
        let config = BackgroundConfig {
            exclude_presence_cells: true,
            ..BackgroundConfig::new(200, 3)
        };
        let points = sample_background(&stack, &config, &presence).unwrap();
        assert_eq!(points.len(), 88);
        assert!(!points.contains(&Coordinate::new(0.5, 0.5)));
        assert!(!points.contains(&Coordinate::new(5.5, 5.5)));
    }
}
