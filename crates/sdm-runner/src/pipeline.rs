//! Pipeline orchestration: occurrences and layers in, maps and summary out.
//!
//! Stages run once, in order:
//!
//! 1. Load occurrences and drop incomplete records
//! 2. Load the current-climate stack and crop it to the padded occurrence extent
//! 3. Sample background points and assemble the labelled feature table
//! 4. Assign stratified folds and hold one out
//! 5. Fit the logistic model on the remaining folds
//! 6. Select a threshold on the held-out fold
//! 7. Project onto the current (and optionally forecast) stack and classify
//! 8. Write GeoTIFFs, a PNG map and `summary.json`

use crate::config::RunConfig;
use crate::render::render_suitability;
use crate::report::{ForecastSummary, ModelSummary, OccurrenceCounts, RunSummary};
use crate::{PipelineError, Result};
use sdm_data::{
    assemble, sample_background, split, stratified_folds, AssemblyReport, BackgroundConfig,
    FeatureTable, FoldAssignment, OccurrenceSet,
};
use sdm_model::{
    classify, evaluate_held_out, fit_logistic, predict_surface, Evaluation, LogisticModel,
    SuitabilitySummary,
};
use sdm_raster::{
    ClimateScenario, Coordinate, DownloadCallback, Extent, LayerFetcher, RasterLayer, RasterStack,
};
use std::path::{Path, PathBuf};

/// Probability GeoTIFF file name.
pub const PROBABILITY_FILE: &str = "probability.tif";
/// Classified suitability GeoTIFF file name.
pub const SUITABILITY_FILE: &str = "suitability.tif";
/// Rendered suitability map file name.
pub const SUITABILITY_PNG: &str = "suitability.png";
/// Run summary file name.
pub const SUMMARY_FILE: &str = "summary.json";
/// Prefix for forecast outputs.
pub const FORECAST_PREFIX: &str = "forecast_";

/// A model projected onto one stack.
#[derive(Debug, Clone)]
pub struct Projection {
    /// Presence probability per cell.
    pub probability: RasterLayer,
    /// 0/1 classification at the threshold.
    pub suitability: RasterLayer,
    /// Suitable share of valid cells.
    pub summary: SuitabilitySummary,
}

/// Results of the in-memory stages for one stack.
#[derive(Debug, Clone)]
pub struct ModelRun {
    /// Sampled background points.
    pub background: Vec<Coordinate>,
    /// Labelled feature table.
    pub table: FeatureTable,
    /// Points kept and dropped during assembly.
    pub assembly: AssemblyReport,
    /// Fold id per table row.
    pub folds: FoldAssignment,
    /// Rows used for fitting.
    pub train_rows: usize,
    /// Rows held out.
    pub test_rows: usize,
    /// Fitted model.
    pub model: LogisticModel,
    /// Held-out evaluation and threshold.
    pub evaluation: Evaluation,
    /// Projection onto the fitting stack.
    pub current: Projection,
}

/// Project `model` onto `stack` and classify at `threshold`.
pub fn project(model: &LogisticModel, stack: &RasterStack, threshold: f64) -> Result<Projection> {
    let probability = predict_surface(model, stack)?;
    let suitability = classify(&probability, threshold);
    let summary = SuitabilitySummary::from_layer(&suitability);
    Ok(Projection {
        probability,
        suitability,
        summary,
    })
}

/// Run sampling, assembly, folding, fitting, evaluation and projection.
pub fn fit_and_project(
    presence: &[Coordinate],
    stack: &RasterStack,
    config: &RunConfig,
) -> Result<ModelRun> {
    let sampler = BackgroundConfig {
        count: config.background.count,
        seed: config.seed,
        strict: config.background.strict,
        exclude_presence_cells: config.background.exclude_presence_cells,
    };
    let background = sample_background(stack, &sampler, presence)?;

    let (table, assembly) = assemble(presence, &background, stack, config.missing)?;
    let folds = stratified_folds(&table, config.folds, config.seed)?;
    let data = split(&table, &folds, config.test_fold)?;

    let model = fit_logistic(&data.train)?;
    let evaluation = evaluate_held_out(&model, &data.test, config.threshold)?;
    let current = project(&model, stack, evaluation.threshold)?;

    tracing::info!(
        suitable_fraction = current.summary.suitable_fraction,
        "Current climate projection complete"
    );

    Ok(ModelRun {
        background,
        train_rows: data.train.len(),
        test_rows: data.test.len(),
        table,
        assembly,
        folds,
        model,
        evaluation,
        current,
    })
}

/// Run the full pipeline described by `config`.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    config.validate()?;

    let occurrences = OccurrenceSet::from_csv(&config.occurrences)?;
    let presence_set = occurrences.filter_missing();
    let presence = presence_set.coordinates();
    let extent = presence_set
        .extent()
        .ok_or(PipelineError::NoPresence)?
        .scale(config.extent_padding)?;
    tracing::info!(
        presence = presence.len(),
        dropped = occurrences.len() - presence.len(),
        min_lat = extent.min_lat,
        max_lat = extent.max_lat,
        min_lon = extent.min_lon,
        max_lon = extent.max_lon,
        "Loaded occurrences"
    );

    let stack = load_current_stack(config, &extent)?;
    // Forecast layers are loaded up front so a bad forecast source fails
    // before any output is written.
    let forecast_input = match &config.forecast {
        Some(forecast) => {
            let scenario = forecast.scenario();
            let forecast_stack = load_forecast_stack(config, &scenario, &stack, &extent)?;
            Some((scenario, forecast_stack))
        }
        None => None,
    };

    let model_run = fit_and_project(&presence, &stack, config)?;

    std::fs::create_dir_all(&config.output_dir)?;
    let mut outputs = write_projection(&config.output_dir, "", &model_run.current, &presence)?;

    let forecast = match forecast_input {
        Some((scenario, forecast_stack)) => {
            let projection = project(
                &model_run.model,
                &forecast_stack,
                model_run.evaluation.threshold,
            )?;
            tracing::info!(
                %scenario,
                suitable_fraction = projection.summary.suitable_fraction,
                "Forecast projection complete"
            );
            outputs.extend(write_projection(
                &config.output_dir,
                FORECAST_PREFIX,
                &projection,
                &presence,
            )?);
            Some(ForecastSummary {
                scenario: scenario.path_segment(),
                suitability: projection.summary,
            })
        }
        None => None,
    };

    let summary_path = config.output_dir.join(SUMMARY_FILE);
    outputs.push(summary_path.clone());

    let summary = RunSummary {
        generated_at: chrono::Utc::now(),
        occurrences: OccurrenceCounts {
            records: occurrences.len(),
            complete: presence.len(),
        },
        bands: stack.band_names(),
        extent: stack.extent(),
        seed: config.seed,
        assembly: model_run.assembly,
        folds: config.folds,
        test_fold: config.test_fold,
        train_rows: model_run.train_rows,
        test_rows: model_run.test_rows,
        model: ModelSummary::from(&model_run.model),
        evaluation: model_run.evaluation.clone(),
        current: model_run.current.summary,
        forecast,
        outputs,
    };
    summary.write_json(&summary_path)?;

    tracing::info!(
        output_dir = %config.output_dir.display(),
        threshold = summary.evaluation.threshold,
        auc = summary.evaluation.auc,
        "Run complete"
    );
    Ok(summary)
}

/// Load the current-climate stack, select configured bands and crop.
pub fn load_current_stack(config: &RunConfig, extent: &Extent) -> Result<RasterStack> {
    let layers = &config.layers;
    let stack = match (&layers.current_dir, &layers.download) {
        (Some(dir), _) => {
            let stack = RasterStack::from_directory(dir)?;
            if layers.bands.is_empty() {
                stack
            } else {
                stack.select(&layers.bands)?
            }
        }
        (None, Some(download)) => fetch(
            &download.cache_dir,
            &download.url_template,
            &ClimateScenario::Current,
            &layers.download_layers(),
        )?,
        (None, None) => {
            return Err(PipelineError::Config(
                "layers need either current_dir or download".to_string(),
            ))
        }
    };
    Ok(stack.crop(extent)?)
}

/// Load the forecast stack and align its bands with `current`.
///
/// Bands are matched by name. When `layers.forecast_bands` is set, those
/// forecast bands are taken in order and renamed to the current band names.
/// Any other difference is a [`PipelineError::ForecastBands`] error.
pub fn load_forecast_stack(
    config: &RunConfig,
    scenario: &ClimateScenario,
    current: &RasterStack,
    extent: &Extent,
) -> Result<RasterStack> {
    let layers = &config.layers;
    let names = current.band_names();
    let stack = match (&layers.forecast_dir, &layers.download) {
        (Some(dir), _) => RasterStack::from_directory(dir)?,
        (None, Some(download)) => fetch(
            &download.cache_dir,
            &download.url_template,
            scenario,
            &layers.download_layers(),
        )?,
        (None, None) => {
            return Err(PipelineError::Config(
                "forecast needs layers.forecast_dir or layers.download".to_string(),
            ))
        }
    };

    let aligned = if !layers.forecast_bands.is_empty() {
        if layers.forecast_bands.len() != names.len()
            || layers.forecast_bands.iter().any(|b| stack.band(b).is_none())
        {
            return Err(PipelineError::ForecastBands {
                expected: layers.forecast_bands.clone(),
                found: stack.band_names(),
            });
        }
        stack.select(&layers.forecast_bands)?.rename_bands(&names)?
    } else if names.iter().all(|name| stack.band(name).is_some()) {
        stack.select(&names)?
    } else {
        return Err(PipelineError::ForecastBands {
            expected: names,
            found: stack.band_names(),
        });
    };
    Ok(aligned.crop(extent)?)
}

fn fetch(
    cache_dir: &Path,
    url_template: &str,
    scenario: &ClimateScenario,
    layers: &[String],
) -> Result<RasterStack> {
    let fetcher = LayerFetcher::new(cache_dir, url_template)?;
    let progress: DownloadCallback = Box::new(|message: &str| tracing::info!("{}", message));
    Ok(fetcher.fetch_stack(scenario, layers, Some(&progress))?)
}

fn write_projection(
    dir: &Path,
    prefix: &str,
    projection: &Projection,
    presence: &[Coordinate],
) -> Result<Vec<PathBuf>> {
    let probability = dir.join(format!("{}{}", prefix, PROBABILITY_FILE));
    let suitability = dir.join(format!("{}{}", prefix, SUITABILITY_FILE));
    let map = dir.join(format!("{}{}", prefix, SUITABILITY_PNG));

    projection.probability.write_geotiff(&probability)?;
    projection.suitability.write_geotiff(&suitability)?;
    render_suitability(&projection.suitability, presence, &map)?;

    Ok(vec![probability, suitability, map])
}
