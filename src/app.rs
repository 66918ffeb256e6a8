use crate::cli::JobName;
use crate::config::Config;
use crate::jobs;
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::info;

/// Main application struct: configuration plus the warehouse pool.
///
/// The browser session is not held here; each job acquires its own and
/// tears it down on every exit path.
pub struct App {
    config: Config,
    pool: sqlx::PgPool,
}

impl App {
    /// Connect to the warehouse and run migrations.
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .connect(&config.database_url)
            .await
            .context("failed to create database pool")?;
        info!(max_connections = 4, "database pool established");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;
        info!("database migrations completed");

        Ok(App { config, pool })
    }

    /// Run the selected job to completion.
    pub async fn run_job(&self, job: JobName) -> Result<(), anyhow::Error> {
        jobs::run(job, &self.pool, &self.config).await
    }
}
