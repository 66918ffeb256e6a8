//! Raw planning-application job: the row driver loop.
//!
//! For each pending application, either follow its stored detail link or
//! fall back to the authority's search form, then extract the record from
//! the detail page. Single-row failures are logged and skipped; only
//! warehouse upload failures abort the run.

use crate::authority::Authority;
use crate::browser::{Session, SessionError};
use crate::config::Config;
use crate::data::applications;
use crate::data::batch::Batch;
use crate::data::models::{ExtractedRecord, SourceRow};
use crate::retry::{Backoff, RetryPolicy};
use crate::scrape::extract::{self, DetailFields};
use crate::scrape::{navigate, search};
use crate::util::parse_portal_date;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Proactive session recycle interval, bounding Chrome's resource growth.
const SESSION_RECYCLE_INTERVAL: usize = 31;

/// Direct detail-link navigation; the legacy portals load slowly.
const DIRECT_NAV_RETRY: RetryPolicy = RetryPolicy::new(3, Backoff::Fixed(Duration::from_secs(10)));

/// Navigation to an authority's search page.
const SEARCH_NAV_RETRY: RetryPolicy = RetryPolicy::new(3, Backoff::Fixed(Duration::from_secs(3)));

/// Search-form submission, with linearly increasing backoff.
const SEARCH_SUBMIT_RETRY: RetryPolicy =
    RetryPolicy::new(3, Backoff::Linear(Duration::from_secs(1)));

/// Bounded wait for the result page after a search submission.
const POST_SEARCH_WAIT: Duration = Duration::from_secs(10);

/// Link patterns known to point somewhere other than a usable detail page.
const BAD_LINK_PATTERNS: &[&str] = &["fingal", "pleanala", "wexfordcoco.ie/application_maps"];

pub async fn run(pool: &PgPool, config: &Config) -> Result<()> {
    let rows = applications::pending_rows(pool)
        .await
        .context("failed to load pending applications")?;
    info!(rows = rows.len(), "pending applications loaded");
    if rows.is_empty() {
        return Ok(());
    }

    let mut session = Session::launch(config.browser_settings())
        .await
        .context("failed to launch browser session")?;
    let result = drive_rows(&mut session, pool, config, &rows).await;
    session.close().await;
    result
}

async fn drive_rows(
    session: &mut Session,
    pool: &PgPool,
    config: &Config,
    rows: &[SourceRow],
) -> Result<()> {
    let mut batch = Batch::new(config.application_batch_size);
    for (index, row) in rows.iter().enumerate() {
        if index > 0 && index % SESSION_RECYCLE_INTERVAL == 0 {
            session
                .recycle()
                .await
                .context("failed to recycle browser session")?;
        }

        info!(
            row = index,
            uan = %row.unique_application_number,
            authority = %row.planning_authority,
            "processing application"
        );
        match process_row(session, row).await {
            Ok(Some(record)) => batch.push(record),
            Ok(None) => info!(uan = %row.unique_application_number, "no record produced"),
            Err(e) => {
                warn!(uan = %row.unique_application_number, error = %e, "row failed, continuing")
            }
        }

        if batch.is_full() {
            let records = batch.take();
            info!(records = records.len(), "flushing batch");
            applications::append_records(pool, &records)
                .await
                .context("warehouse upload failed")?;
        }
    }

    if !batch.is_empty() {
        let records = batch.take();
        info!(records = records.len(), "flushing final batch");
        applications::append_records(pool, &records)
            .await
            .context("warehouse upload failed")?;
    }
    Ok(())
}

/// Resolve one source row to a record, or `None` when the application
/// could not be located.
async fn process_row(
    session: &mut Session,
    row: &SourceRow,
) -> Result<Option<ExtractedRecord>, SessionError> {
    let authority = Authority::from_name(&row.planning_authority);
    let url = normalize_detail_url(row.link_app_details.as_deref().unwrap_or(""), authority);

    if is_unusable_link(&url) {
        let Some(search_url) = authority.profile().search_url else {
            warn!(authority = %row.planning_authority, "no search page for authority, skipping");
            return Ok(None);
        };
        session.goto_checked(search_url, SEARCH_NAV_RETRY).await?;
        let before_search = session.current_url().await;
        if !search::submit_search(
            session,
            authority,
            &row.application_number,
            search_url,
            SEARCH_SUBMIT_RETRY,
        )
        .await
        {
            return Ok(None);
        }
        if !session
            .wait_until_url_changes(&before_search, POST_SEARCH_WAIT)
            .await
        {
            warn!("result page did not load after search submission");
            return Ok(None);
        }
        if !navigate::find_and_open(session, authority, &row.application_number).await? {
            return Ok(None);
        }
    } else {
        session.goto_checked(&url, DIRECT_NAV_RETRY).await?;
        sleep(Duration::from_secs(2)).await;
    }

    Ok(scrape_detail(session, row, authority).await)
}

/// Extract a record from whatever detail page the session now shows.
async fn scrape_detail(
    session: &Session,
    row: &SourceRow,
    authority: Authority,
) -> Option<ExtractedRecord> {
    let url = session.current_url().await;
    if extract::is_server_error(&session.page_source().await) {
        warn!(uan = %row.unique_application_number, "server error page, storing empty record");
        return Some(ExtractedRecord::empty(row, url));
    }
    if !extract::detail_page_ready(session, authority).await {
        warn!(uan = %row.unique_application_number, "detail page content never loaded, skipping");
        return None;
    }
    let fields = extract::extract_detail(session, authority).await;
    Some(build_record(row, fields, session.current_url().await))
}

fn build_record(row: &SourceRow, fields: DetailFields, url: String) -> ExtractedRecord {
    let development_description = fields.description().to_owned();
    ExtractedRecord {
        unique_application_number: row.unique_application_number.clone(),
        application_number: row.application_number.clone(),
        application_status: extract::resolve_status(&fields.status_non_owner, &fields.status_owner),
        development_description,
        application_type: fields.application_type,
        decision: fields.decision,
        appeal_decision: fields.appeal_decision,
        appeal_type: fields.appeal_type,
        decision_date: parse_portal_date(&fields.decision_date),
        received_date: parse_portal_date(&fields.received_date),
        appeal_decision_date: parse_portal_date(&fields.appeal_decision_date),
        grant_date: parse_portal_date(&fields.grant_date),
        applicant: fields.applicant,
        url,
        created_at: Utc::now(),
    }
}

/// Stored-link fix-ups: force https and trim the stray trailing "E" some
/// Wexford exports carry.
fn normalize_detail_url(url: &str, authority: Authority) -> String {
    let mut url = url.trim().to_owned();
    if let Some(rest) = url.strip_prefix("http://") {
        url = format!("https://{rest}");
    }
    if authority == Authority::Wexford && url.ends_with('E') {
        url.truncate(url.len() - 1);
    }
    url
}

/// Whether a stored link should be ignored in favour of the search path.
fn is_unusable_link(url: &str) -> bool {
    url.is_empty() || BAD_LINK_PATTERNS.iter().any(|pattern| url.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn source_row() -> SourceRow {
        SourceRow {
            unique_application_number: "SD21A/0123".to_owned(),
            application_number: "21A/0123".to_owned(),
            planning_authority: "South Dublin County Council".to_owned(),
            link_app_details: None,
        }
    }

    #[test]
    fn normalizes_protocol_and_wexford_suffix() {
        assert_eq!(
            normalize_detail_url("http://example.ie/app/1", Authority::DublinCity),
            "https://example.ie/app/1"
        );
        assert_eq!(
            normalize_detail_url("https://example.ie/app/20211234E", Authority::Wexford),
            "https://example.ie/app/20211234"
        );
        // Only Wexford links get the suffix trim.
        assert_eq!(
            normalize_detail_url("https://example.ie/app/20211234E", Authority::DublinCity),
            "https://example.ie/app/20211234E"
        );
    }

    #[test]
    fn bad_links_route_to_the_search_path() {
        assert!(is_unusable_link(""));
        assert!(is_unusable_link("https://www.fingal.ie/planning/1"));
        assert!(is_unusable_link("https://www.pleanala.ie/case/1"));
        assert!(is_unusable_link(
            "https://www.wexfordcoco.ie/application_maps/1"
        ));
        assert!(!is_unusable_link(
            "https://www.eplanning.ie/LouthCC/AppFileRefDetails/1/0"
        ));
    }

    #[test]
    fn record_builder_resolves_status_and_dates() {
        let fields = DetailFields {
            status_non_owner: "Granted by Fingal County Council".to_owned(),
            decision_date: "13/11/2019".to_owned(),
            proposal: "extension to dwelling".to_owned(),
            ..DetailFields::default()
        };
        let record = build_record(&source_row(), fields, "https://x.ie".to_owned());
        assert_eq!(record.application_status, "granted");
        assert_eq!(
            record.decision_date,
            NaiveDate::from_ymd_opt(2019, 11, 13)
        );
        assert_eq!(record.development_description, "extension to dwelling");
        assert_eq!(record.received_date, None);
    }
}
