//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - installs the tracing subscriber
//! - parses CLI arguments and merges them over the environment config
//! - dispatches to the service layer
//! - prints reports and writes optional exports

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Command, CvArgs, ForecastArgs, MetricsArgs, SampleArgs, TrainArgs};
use crate::clock::{Clock, SystemClock};
use crate::domain::{CvConfig, ServiceConfig};
use crate::error::AppError;
use crate::io::{write_breakdown_csv, write_forecast_csv};

pub mod pipeline;

/// Entry point for the `sitecast` binary.
pub fn run() -> Result<(), AppError> {
    init_tracing();
    let cli = crate::cli::Cli::parse();
    let config = cli.service.apply(ServiceConfig::from_env()?);

    match cli.command {
        Command::Sample(args) => handle_sample(args),
        Command::Train(args) => handle_train(&config, args),
        Command::Forecast(args) => handle_forecast(&config, args),
        Command::Cv(args) => handle_cv(&config, args),
        Command::Metrics(args) => handle_metrics(&config, args),
    }
}

/// Logs go to stderr so reports on stdout stay pipeable. `RUST_LOG` overrides
/// the default `info` filter.
fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .try_init();
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    if args.sites.is_empty() || args.days == 0 {
        return Err(AppError::new(2, "sample needs at least one site and one day"));
    }
    let rows = pipeline::write_sample(&args.out, &args.sites, args.start, args.days, args.seed)?;
    println!(
        "Wrote {rows} rows for {} site(s) to {}",
        args.sites.len(),
        args.out.display()
    );
    Ok(())
}

fn handle_train(config: &ServiceConfig, args: TrainArgs) -> Result<(), AppError> {
    let service = Arc::new(pipeline::build_service(config, Arc::new(SystemClock))?);

    if args.all {
        let outcomes = service.train_all()?;
        println!("{}", crate::report::format_train_outcomes(&outcomes));
        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        if !outcomes.is_empty() && failed == outcomes.len() {
            return Err(AppError::new(4, "training failed for every site"));
        }
        return Ok(());
    }

    let Some(site) = args.site else {
        return Err(AppError::new(2, "train needs --site or --all"));
    };

    let metrics = if args.background {
        let ack = service.retrain_in_background(&site);
        info!(site = %ack.site_id, requested_at = %ack.requested_at, "retrain acknowledged");
        ack.wait()?
    } else {
        service.retrain(&site)?.metrics.clone()
    };

    if let Some(model) = service.cache().get(&site) {
        print!("{}", crate::report::format_model_summary(&model));
    }
    println!("{}", crate::report::format_metrics(&site, &metrics));
    Ok(())
}

fn handle_forecast(config: &ServiceConfig, args: ForecastArgs) -> Result<(), AppError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let start = args.start.unwrap_or_else(|| clock.today());
    let service = pipeline::build_service(config, clock)?;

    let run = pipeline::run_forecast(&service, &args.site, start, args.horizon, args.width)?;
    println!("{}", crate::report::format_forecast(&args.site, &run.rows, run.width));

    if let Some(path) = &args.export {
        write_forecast_csv(path, &args.site, &run.rows)?;
        info!(path = %path.display(), "wrote forecast CSV");
    }
    if let Some(path) = &args.breakdown {
        write_breakdown_csv(path, &args.site, &run.breakdown)?;
        info!(path = %path.display(), "wrote breakdown CSV");
    }
    Ok(())
}

fn handle_cv(config: &ServiceConfig, args: CvArgs) -> Result<(), AppError> {
    let cv_config = CvConfig {
        initial_days: args.initial,
        period_days: args.period,
        horizon_days: args.horizon,
        window: args.window,
        min_fold_fraction: args.min_fold_fraction,
    };
    let report = pipeline::run_cv(config, &args.site, &cv_config, &SystemClock)?;
    println!("{}", crate::report::format_cv_report(&args.site, &report));
    Ok(())
}

fn handle_metrics(config: &ServiceConfig, args: MetricsArgs) -> Result<(), AppError> {
    let metrics = pipeline::stored_metrics(config, &args.site)?;
    println!("{}", crate::report::format_metrics(&args.site, &metrics));
    Ok(())
}
