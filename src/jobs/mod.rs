//! The three scrape jobs, selected by the CLI.

pub mod applications;
pub mod commencements;
pub mod completions;

use crate::cli::JobName;
use crate::config::Config;
use crate::util::fmt_duration;
use anyhow::Result;
use sqlx::PgPool;
use std::time::Instant;
use tracing::info;

pub async fn run(job: JobName, pool: &PgPool, config: &Config) -> Result<()> {
    let started = Instant::now();
    let result = match job {
        JobName::RawApplications => applications::run(pool, config).await,
        JobName::CommencementNotices => commencements::run(pool, config).await,
        JobName::CompletionCertificates => completions::run(pool, config).await,
    };
    if result.is_ok() {
        info!(duration = fmt_duration(started.elapsed()), "job finished");
    }
    result
}
