//! Command-line parsing for the site visitor forecaster.
//!
//! Argument parsing and command dispatch stay separate from the modeling
//! code; `app` turns these structs into service calls.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{CvWindow, ServiceConfig};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "sitecast", version, about = "Daily site visitor forecasting")]
pub struct Cli {
    #[command(flatten)]
    pub service: ServiceArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the `SITE_FORECAST_*` environment settings.
#[derive(Debug, Args, Clone, Default)]
pub struct ServiceArgs {
    /// History CSV (site_id,date,visitor_count,...).
    #[arg(long, global = true, value_name = "CSV")]
    pub data: Option<PathBuf>,

    /// Directory holding persisted models.
    #[arg(long, global = true, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,

    /// Model file prefix (`<prefix>_<site>.json`).
    #[arg(long, global = true)]
    pub model_prefix: Option<String>,

    /// Model configuration JSON.
    #[arg(long, global = true, value_name = "JSON")]
    pub model_config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub cache_ttl_hours: Option<i64>,
}

impl ServiceArgs {
    /// Apply flags on top of an environment-derived config.
    pub fn apply(&self, mut config: ServiceConfig) -> ServiceConfig {
        if let Some(path) = &self.data {
            config.data_path = Some(path.clone());
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(prefix) = &self.model_prefix {
            config.model_file_prefix = prefix.clone();
        }
        if let Some(path) = &self.model_config {
            config.model_config_path = Some(path.clone());
        }
        if let Some(hours) = self.cache_ttl_hours {
            config.cache_ttl_hours = hours;
        }
        config
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a synthetic multi-site history CSV.
    Sample(SampleArgs),
    /// Fit, cross-validate and persist models.
    Train(TrainArgs),
    /// Forecast daily visitors for one site.
    Forecast(ForecastArgs),
    /// Run rolling-origin cross-validation without persisting anything.
    Cv(CvArgs),
    /// Show the stored metrics of a site's model.
    Metrics(MetricsArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct SampleArgs {
    /// Output CSV path.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,

    /// Comma-separated site ids.
    #[arg(long, value_delimiter = ',', default_value = "ACAD,GRCA,YELL,ZION")]
    pub sites: Vec<String>,

    /// First date (YYYY-MM-DD).
    #[arg(long, default_value = "2022-01-01")]
    pub start: NaiveDate,

    #[arg(long, default_value_t = 1095)]
    pub days: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Parser, Clone)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["site", "all"])))]
pub struct TrainArgs {
    #[arg(long)]
    pub site: Option<String>,

    /// Train every site in the history.
    #[arg(long)]
    pub all: bool,

    /// Run the training on a background thread and wait for it.
    #[arg(long, requires = "site")]
    pub background: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct ForecastArgs {
    #[arg(long)]
    pub site: String,

    /// First forecast date (defaults to today).
    #[arg(long)]
    pub start: Option<NaiveDate>,

    #[arg(long, default_value_t = 30)]
    pub horizon: u32,

    /// Interval width override, in (0, 1).
    #[arg(long)]
    pub width: Option<f64>,

    /// Export forecast rows to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export per-component contributions to CSV.
    #[arg(long, value_name = "CSV")]
    pub breakdown: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct CvArgs {
    #[arg(long)]
    pub site: String,

    /// Initial training window (days).
    #[arg(long, default_value_t = 60)]
    pub initial: usize,

    /// Step between cutoffs (days).
    #[arg(long, default_value_t = 30)]
    pub period: usize,

    /// Days scored after each cutoff.
    #[arg(long, default_value_t = 30)]
    pub horizon: usize,

    #[arg(long, value_enum, default_value_t = CvWindow::Expanding)]
    pub window: CvWindow,

    /// Minimum fraction of folds that must succeed.
    #[arg(long, default_value_t = 0.5)]
    pub min_fold_fraction: f64,
}

#[derive(Debug, Parser, Clone)]
pub struct MetricsArgs {
    #[arg(long)]
    pub site: String,
}
