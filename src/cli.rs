use clap::{Parser, ValueEnum};

/// Scraper for Irish planning-application portals.
#[derive(Debug, Parser)]
#[command(name = "eplan", version, about)]
pub struct Args {
    /// Which scrape job to run.
    #[arg(long, value_enum)]
    pub job: JobName,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = TracingFormat::Pretty)]
    pub tracing: TracingFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JobName {
    /// Resolve pending applications to detail-page records.
    RawApplications,
    /// Look up commencement notices on the building-control register.
    CommencementNotices,
    /// Collect completion certificates for matched notices.
    CompletionCertificates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    Pretty,
    Json,
}
