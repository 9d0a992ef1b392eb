use std::path::{Path, PathBuf};
use std::time::Duration;

use analytics::{KpiEngine, KpiReport};
use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use configuration::{ForecastTarget, Settings};
use core_types::CanonicalDataset;
use indicatif::{ProgressBar, ProgressStyle};
use ingestion::{
    ConsolidationEngine, ConsolidationOptions, RecordAdapter, RejectionSummary, SourceAdapter,
};
use ml_features::FeatureBuilder;
use ml_trainer::{EnsembleForecaster, EvaluationReport, ModelStore, PredictionTable};

/// Timestamp format shared by every output file of a run.
const RUN_STAMP: &str = "%Y%m%d_%H%M%S";
const LATEST_DATASET: &str = "consolidated_latest.csv";

/// The main entry point for the Civitas service-request pipeline.
#[tokio::main]
async fn main() {
    // A missing .env file is fine; the config file and defaults still apply.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = configuration::load_config_from(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    let _log_guard =
        configuration::init_tracing(&settings.logging).context("failed to initialise logging")?;

    match cli.command {
        Commands::Consolidate => {
            handle_consolidate(&settings).await?;
        }
        Commands::Kpis(args) => {
            let dataset = load_dataset(&settings, args.input.as_deref())?;
            handle_kpis(&settings, &dataset)?;
        }
        Commands::Features(args) => handle_features(&settings, args)?,
        Commands::Train(args) => {
            let dataset = load_dataset(&settings, args.dataset.input.as_deref())?;
            handle_train(&settings, &dataset, args.target, args.test_fraction)?;
        }
        Commands::Predict(args) => handle_predict(&settings, args)?,
        Commands::Run(args) => handle_run(&settings, args).await?,
    }
    Ok(())
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Consolidates citizen service requests, reports service KPIs and forecasts demand.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every source, merge them into the canonical dataset and write it out.
    Consolidate,
    /// Compute the KPI report over a consolidated dataset.
    Kpis(DatasetArgs),
    /// Export the feature matrix of a consolidated dataset as Parquet.
    Features(FeaturesArgs),
    /// Train and persist a forecasting ensemble.
    Train(TrainArgs),
    /// Forecast the coming days with a stored ensemble.
    Predict(PredictArgs),
    /// Run the whole pipeline: consolidate, KPIs, train, predict.
    Run(RunArgs),
}

#[derive(Args)]
struct DatasetArgs {
    /// Consolidated dataset CSV. Defaults to the latest one in the processed directory.
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Args)]
struct FeaturesArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Output Parquet file.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct TrainArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// What to forecast. Defaults to the configured target.
    #[arg(long, value_enum)]
    target: Option<ForecastTarget>,

    /// Share of samples held out for evaluation.
    #[arg(long)]
    test_fraction: Option<f64>,
}

#[derive(Args)]
struct PredictArgs {
    /// Model key (`YYYYmmdd_HHMMSS_mmm`) or `latest`.
    #[arg(long, default_value = "latest")]
    model: String,

    /// Number of days to forecast.
    #[arg(long)]
    horizon: Option<u32>,

    /// Restrict the forecast to these categories (repeatable).
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Output CSV file.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, value_enum)]
    target: Option<ForecastTarget>,

    #[arg(long)]
    horizon: Option<u32>,
}

// ==============================================================================
// Command Logic
// ==============================================================================

/// Extracts the configured sources concurrently, adapts and consolidates them, and
/// writes the canonical dataset together with its rejections.
async fn handle_consolidate(settings: &Settings) -> anyhow::Result<CanonicalDataset> {
    let stamp = run_stamp();
    let spinner = spinner(format!("Extracting {} sources...", settings.sources.0.len()))?;
    let extracts = ingestion::extract_all(&settings.sources.0, &settings.etl).await;
    spinner.finish_with_message("Extraction complete!");

    let mut streams = Vec::with_capacity(extracts.len());
    for ((kind, result), source) in extracts.into_iter().zip(&settings.sources.0) {
        let raws = result.with_context(|| format!("failed to extract source '{kind}'"))?;
        let stream = SourceAdapter::from_settings(source).adapt_all(&raws);
        tracing::info!(
            source = %kind,
            rows = raws.len(),
            adapted = stream.records.len(),
            "source adapted"
        );
        streams.push(stream);
    }

    let engine = ConsolidationEngine::new(
        &settings.categories,
        ConsolidationOptions {
            sort_by_requested_at: settings.etl.sort_by_requested_at,
        },
    );
    let outcome = engine.consolidate(&streams);

    let processed = &settings.etl.processed_data_dir;
    let dataset_path = processed.join(format!("consolidated_{stamp}.csv"));
    ingestion::write_canonical_csv(&outcome.dataset, &dataset_path)?;
    ingestion::write_canonical_csv(&outcome.dataset, &processed.join(LATEST_DATASET))?;

    let reports = &settings.etl.reports_dir;
    ingestion::write_rejected_csv(&outcome.rejected, &reports.join(format!("rejected_{stamp}.csv")))?;
    let summary = RejectionSummary::from_outcome(&outcome);
    ingestion::write_rejection_summary(
        &summary,
        &reports.join(format!("rejection_summary_{stamp}.json")),
    )?;

    println!(
        "Consolidated {} of {} records ({} rejected, {:.1}%) into {}",
        summary.accepted,
        summary.total_input,
        summary.rejected,
        summary.rejection_rate * 100.0,
        dataset_path.display()
    );
    Ok(outcome.dataset)
}

fn handle_kpis(settings: &Settings, dataset: &CanonicalDataset) -> anyhow::Result<KpiReport> {
    let report = KpiEngine::new(settings.kpis.clone())
        .calculate(dataset, Utc::now())
        .context("failed to compute KPIs")?;

    let path = settings
        .etl
        .reports_dir
        .join(format!("kpis_{}.json", report.computed_at.format(RUN_STAMP)));
    write_json(&report, &path)?;

    println!("{}", kpi_table(&report));
    if report.has_insufficient_data() {
        println!("Some KPIs could not be computed from the available records.");
    }
    println!("KPI report written to {}", path.display());
    Ok(report)
}

fn handle_features(settings: &Settings, args: FeaturesArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(settings, args.dataset.input.as_deref())?;
    let builder = FeatureBuilder::fit(&dataset).context("failed to fit encoders")?;
    let vectors = builder.build(&dataset);
    let target: Vec<f64> = dataset
        .iter()
        .map(|record| record.attention_hours.unwrap_or(f64::NAN))
        .collect();

    let mut frame = ml_features::to_frame(&vectors, Some(("attention_hours", target.as_slice())))?;
    let path = args.output.unwrap_or_else(|| {
        settings
            .etl
            .processed_data_dir
            .join(format!("features_{}.parquet", run_stamp()))
    });
    ml_features::write_parquet(&mut frame, &path)?;

    println!(
        "Wrote {} feature rows x {} columns to {}",
        frame.height(),
        frame.width(),
        path.display()
    );
    Ok(())
}

fn handle_train(
    settings: &Settings,
    dataset: &CanonicalDataset,
    target: Option<ForecastTarget>,
    test_fraction: Option<f64>,
) -> anyhow::Result<()> {
    let target = target.unwrap_or(settings.model.target);
    let test_fraction = test_fraction.unwrap_or(settings.model.test_fraction);

    let spinner = spinner(format!("Training ensemble on {} records...", dataset.len()))?;
    let forecaster = EnsembleForecaster::new(settings.model.clone());
    let trained = forecaster.train(dataset, target, test_fraction);
    spinner.finish_and_clear();
    let (ensemble, report) = trained.context("training failed")?;

    let store = ModelStore::new(&settings.model.models_dir);
    let model_path = store.save(&ensemble)?;

    let report_path = settings.etl.reports_dir.join(format!(
        "evaluation_{}.json",
        report.trained_at.format(RUN_STAMP)
    ));
    report.write_json(&report_path)?;

    println!("{}", evaluation_table(&report));
    println!(
        "Model {} saved to {}; evaluation written to {}",
        report.model_id,
        model_path.display(),
        report_path.display()
    );
    Ok(())
}

fn handle_predict(settings: &Settings, args: PredictArgs) -> anyhow::Result<()> {
    let store = ModelStore::new(&settings.model.models_dir);
    let ensemble = store
        .load(&args.model)
        .with_context(|| format!("failed to load model '{}'", args.model))?;
    let horizon = args.horizon.unwrap_or(settings.model.horizon_days);

    let table = if args.categories.is_empty() {
        ensemble.predict(horizon)?
    } else {
        ensemble.predict_for_categories(horizon, &args.categories)?
    };
    write_predictions(settings, &table, args.output)
}

async fn handle_run(settings: &Settings, args: RunArgs) -> anyhow::Result<()> {
    let dataset = handle_consolidate(settings).await?;
    handle_kpis(settings, &dataset)?;
    handle_train(settings, &dataset, args.target, None)?;
    handle_predict(
        settings,
        PredictArgs {
            model: "latest".to_string(),
            horizon: args.horizon,
            categories: Vec::new(),
            output: None,
        },
    )
}

// ==============================================================================
// Helpers
// ==============================================================================

fn run_stamp() -> String {
    Utc::now().format(RUN_STAMP).to_string()
}

fn spinner(message: String) -> anyhow::Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    Ok(spinner)
}

fn load_dataset(settings: &Settings, input: Option<&Path>) -> anyhow::Result<CanonicalDataset> {
    let path = input
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.etl.processed_data_dir.join(LATEST_DATASET));
    let dataset = ingestion::read_canonical_csv(&path)
        .with_context(|| format!("failed to read consolidated dataset {}", path.display()))?;
    tracing::info!(path = %path.display(), records = dataset.len(), "dataset loaded");
    Ok(dataset)
}

fn write_json<T: serde::Serialize>(value: &T, path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn write_predictions(
    settings: &Settings,
    table: &PredictionTable,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let path = output.unwrap_or_else(|| {
        settings
            .etl
            .reports_dir
            .join(format!("predictions_{}.csv", run_stamp()))
    });
    table.write_csv(&path)?;

    let mut summary = Table::new();
    summary
        .load_preset(UTF8_FULL)
        .set_header(vec!["Category", "Days", "Mean", "Std", "Min", "Max"]);
    for row in table.summary_by_category() {
        summary.add_row(vec![
            row.category,
            row.days.to_string(),
            format!("{:.2}", row.mean),
            fmt_opt(row.std),
            format!("{:.2}", row.min),
            format!("{:.2}", row.max),
        ]);
    }
    println!("{summary}");
    println!("{} predictions written to {}", table.len(), path.display());
    Ok(())
}

fn kpi_table(report: &KpiReport) -> Table {
    let attention = &report.attention_time;
    let resolution = &report.resolution_rate;
    let wait = &report.wait_time;
    let demand = &report.category_demand;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["KPI", "Value"]);
    table.add_row(vec!["Records".to_string(), report.total_records.to_string()]);
    table.add_row(vec!["Mean attention (h)".to_string(), fmt_opt(attention.mean_hours)]);
    table.add_row(vec!["Median attention (h)".to_string(), fmt_opt(attention.median_hours)]);
    table.add_row(vec![
        format!("Within {}h (%)", attention.threshold_hours),
        fmt_opt(attention.within_threshold_pct),
    ]);
    table.add_row(vec!["Resolution rate (%)".to_string(), fmt_opt(resolution.rate_pct)]);
    table.add_row(vec![
        format!("Meets {}% target", resolution.target_pct),
        resolution
            .meets_target
            .map_or_else(|| "n/a".to_string(), |met| (if met { "yes" } else { "no" }).to_string()),
    ]);
    table.add_row(vec!["Pending requests".to_string(), wait.pending_count.to_string()]);
    table.add_row(vec!["Mean wait (h)".to_string(), fmt_opt(wait.mean_wait_hours)]);
    table.add_row(vec![
        "Top category".to_string(),
        demand.mode_category.clone().unwrap_or_else(|| "n/a".to_string()),
    ]);
    table
}

fn evaluation_table(report: &EvaluationReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Model", "RMSE", "MAE", "R2"]);
    for (name, metrics) in [
        ("Random forest", &report.random_forest),
        ("Gradient boosting", &report.gradient_boosting),
        ("Ensemble", &report.ensemble),
    ] {
        table.add_row(vec![
            name.to_string(),
            fmt_opt(metrics.rmse),
            fmt_opt(metrics.mae),
            fmt_opt(metrics.r2),
        ]);
    }
    table
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}
