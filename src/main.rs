use clap::Parser;
use eplan::app::App;
use eplan::cli::Args;
use eplan::config::Config;
use eplan::logging::setup_logging;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config before anything else so startup logs are never dropped.
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        job = ?args.job,
        "starting eplan scraper"
    );

    let app = match App::new(config).await {
        Ok(app) => app,
        Err(e) => {
            error!(error = ?e, "failed to initialize application");
            return ExitCode::FAILURE;
        }
    };

    match app.run_job(args.job).await {
        Ok(()) => {
            info!(job = ?args.job, "job completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = ?e, job = ?args.job, "job failed");
            ExitCode::FAILURE
        }
    }
}
