//! `sdm` command-line entry point.

use clap::{Args, Parser, Subcommand};
use sdm_model::ThresholdCriterion;
use sdm_runner::{ForecastConfig, RunConfig, SUMMARY_FILE};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sdm")]
#[command(about = "Presence/background species distribution modelling", long_about = None)]
#[command(version, arg_required_else_help = true)]
struct Cli {
    /// Log filter, e.g. `info` or `sdm_model=debug`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit, evaluate and project a model.
    Run(RunArgs),
    /// Print the default configuration as YAML.
    Config,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Occurrence CSV file.
    #[arg(long)]
    occurrences: Option<PathBuf>,
    /// Directory of current-climate GeoTIFFs.
    #[arg(long)]
    layers: Option<PathBuf>,
    /// Directory of forecast GeoTIFFs. Enables the forecast projection.
    #[arg(long)]
    forecast_layers: Option<PathBuf>,
    /// Output directory.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Number of background points.
    #[arg(long)]
    background: Option<usize>,
    /// Number of folds.
    #[arg(long)]
    folds: Option<usize>,
    /// Held-out fold.
    #[arg(long)]
    test_fold: Option<usize>,
    /// Random seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Threshold criterion: max_spec_sens, equal_sens_spec or no_omission.
    #[arg(long)]
    threshold: Option<ThresholdCriterion>,
    /// Factor applied to the occurrence extent.
    #[arg(long)]
    padding: Option<f64>,
    /// Fail when fewer valid cells than background points exist.
    #[arg(long)]
    strict: bool,
    /// Do not sample background in cells holding presence points.
    #[arg(long)]
    exclude_presence_cells: bool,
    /// Skip the forecast projection.
    #[arg(long)]
    no_forecast: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut RunConfig) {
        if let Some(path) = &self.occurrences {
            config.occurrences = path.clone();
        }
        if let Some(dir) = &self.layers {
            config.layers.current_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.forecast_layers {
            config.layers.forecast_dir = Some(dir.clone());
            config.forecast.get_or_insert_with(ForecastConfig::default);
        }
        if let Some(dir) = &self.output {
            config.output_dir = dir.clone();
        }
        if let Some(count) = self.background {
            config.background.count = count;
        }
        if let Some(folds) = self.folds {
            config.folds = folds;
        }
        if let Some(fold) = self.test_fold {
            config.test_fold = fold;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(criterion) = self.threshold {
            config.threshold = criterion;
        }
        if let Some(padding) = self.padding {
            config.extent_padding = padding;
        }
        if self.strict {
            config.background.strict = true;
        }
        if self.exclude_presence_cells {
            config.background.exclude_presence_cells = true;
        }
        if self.no_forecast {
            config.forecast = None;
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(args: &RunArgs) -> sdm_runner::Result<()> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_yaml_file(path)?,
        None => RunConfig::default(),
    };
    args.apply(&mut config);

    let summary = sdm_runner::run(&config)?;

    println!("Presence records:   {}", summary.occurrences.complete);
    println!(
        "Training rows:      {} ({} held out in fold {})",
        summary.train_rows, summary.test_rows, summary.test_fold
    );
    for term in &summary.model.terms {
        println!(
            "  {:<24} {:>12.5} (SE {:.5}, p {:.4})",
            term.name, term.estimate, term.std_error, term.p_value
        );
    }
    println!(
        "Threshold ({}):  {:.4}  sens {:.3}  spec {:.3}  AUC {:.3}",
        summary.evaluation.criterion,
        summary.evaluation.threshold,
        summary.evaluation.sensitivity,
        summary.evaluation.specificity,
        summary.evaluation.auc
    );
    println!(
        "Suitable (current): {:.1}%",
        summary.current.suitable_fraction * 100.0
    );
    if let Some(forecast) = &summary.forecast {
        println!(
            "Suitable ({}): {:.1}%",
            forecast.scenario,
            forecast.suitability.suitable_fraction * 100.0
        );
    }
    println!(
        "Summary written to {}",
        config.output_dir.join(SUMMARY_FILE).display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let result = match &cli.command {
        Command::Run(args) => run(args),
        Command::Config => RunConfig::default().to_yaml().map(|yaml| print!("{}", yaml)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
