//! Commencement-notice job against the national building-control register.
//!
//! Each pending application is either resolved through a stored notice
//! link or through the register's full-text search, walking paginated
//! accordion results. Extracted authorities must fuzzy-match the expected
//! one before non-identity fields are trusted.

use crate::browser::{Session, SessionError};
use crate::config::Config;
use crate::data::batch::Batch;
use crate::data::commencements;
use crate::data::models::{CommencementRecord, CommencementRow, NO_MATCH};
use crate::retry::{Backoff, RetryPolicy};
use crate::util::parse_register_date;
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

const SEARCH_BASE: &str = "https://www.nbco.localgov.ie/en/bcms/search?search_api_views_fulltext=";
const SITE_BASE: &str = "https://www.nbco.localgov.ie/";

const RESULT_ITEM_CSS: &str = ".item-list ul .accordion-item";
const RESULT_LINK_CSS: &str = "a.btn-small";
const PAGER_NEXT_CSS: &str = "li.pager-next a";

const NAV_RETRY: RetryPolicy = RetryPolicy::new(3, Backoff::Fixed(Duration::from_secs(2)));
const FIELD_WAIT: Duration = Duration::from_secs(5);

/// Similarity floor for accepting the register's authority as the one the
/// warehouse expects.
const AUTHORITY_MATCH_THRESHOLD: f64 = 0.9;

pub async fn run(pool: &PgPool, config: &Config) -> Result<()> {
    let rows = commencements::pending_rows(pool)
        .await
        .context("failed to load pending commencement lookups")?;
    info!(rows = rows.len(), "pending commencement lookups loaded");
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
    rows: &[CommencementRow],
) -> Result<()> {
    let mut batch = Batch::new(config.notice_batch_size);
    for row in rows {
        if let Err(e) = process_row(session, row, &mut batch).await {
            warn!(uan = %row.unique_application_number, error = %e, "row failed, continuing");
        }
        if batch.is_full() {
            let records = batch.take();
            info!(records = records.len(), "flushing batch");
            commencements::append_records(pool, &records)
                .await
                .context("warehouse upload failed")?;
        }
    }

    if !batch.is_empty() {
        let records = batch.take();
        info!(records = records.len(), "flushing final batch");
        commencements::append_records(pool, &records)
            .await
            .context("warehouse upload failed")?;
    }
    Ok(())
}

async fn process_row(
    session: &mut Session,
    row: &CommencementRow,
    batch: &mut Batch<CommencementRecord>,
) -> Result<(), SessionError> {
    // A previously resolved link short-circuits the search entirely.
    if let Some(link) = row
        .ncbo_link
        .as_deref()
        .map(str::trim)
        .filter(|link| !link.is_empty())
    {
        let record = scrape_notice_page(session, link, row).await?;
        batch.push(record);
        return Ok(());
    }

    let mut page_url = search_url(&row.unique_application_number);
    info!(uan = %row.unique_application_number, url = %page_url, "searching register");
    loop {
        session.goto_checked(&page_url, NAV_RETRY).await?;

        let links = result_links(session).await;
        if links.is_empty() {
            info!(uan = %row.unique_application_number, "no register results, storing no-match row");
            batch.push(CommencementRecord::no_match(row));
            return Ok(());
        }

        // Grab the pager target before detail navigation invalidates it.
        let next_page = next_page_url(session).await;

        for link in links {
            sleep(Duration::from_secs(1)).await;
            let record = scrape_notice_page(session, &link, row).await?;
            batch.push(record);
        }

        match next_page {
            Some(next) => {
                info!(url = %next, "following register pagination");
                page_url = next;
                sleep(Duration::from_secs(2)).await;
            }
            None => {
                info!("no more result pages");
                return Ok(());
            }
        }
    }
}

/// Detail links of every result on the current page.
async fn result_links(session: &Session) -> Vec<String> {
    let Ok(items) = session.page().find_elements(RESULT_ITEM_CSS).await else {
        return Vec::new();
    };
    let mut links = Vec::new();
    for item in items {
        if let Ok(anchor) = item.find_element(RESULT_LINK_CSS).await {
            if let Ok(Some(href)) = anchor.attribute("href").await {
                links.push(absolute_url(&href));
            }
        }
    }
    links
}

async fn next_page_url(session: &Session) -> Option<String> {
    let anchor = session.page().find_element(PAGER_NEXT_CSS).await.ok()?;
    let href = anchor.attribute("href").await.ok().flatten()?;
    Some(absolute_url(&href))
}

async fn scrape_notice_page(
    session: &mut Session,
    link: &str,
    row: &CommencementRow,
) -> Result<CommencementRecord, SessionError> {
    session.goto_checked(link, NAV_RETRY).await?;

    let extracted_authority = css_text(
        session,
        ".field-name-field-notice-local-authority .field-item",
        "",
    )
    .await;
    let matched = authority_matches(&extracted_authority, &row.planning_authority);
    if matched {
        info!(uan = %row.unique_application_number, authority = %extracted_authority, "register authority matched");
    } else {
        info!(
            uan = %row.unique_application_number,
            found = %extracted_authority,
            expected = %row.planning_authority,
            "register authority did not match"
        );
    }

    let notice_type = css_text(session, ".field-name-field-notice-type .field-item", "Not Found").await;
    let raw_date = css_text(
        session,
        ".field-name-field-commencement-date .date-display-single",
        "Not Found",
    )
    .await;
    let owner_company =
        css_text(session, ".field-name-field-owner-company .field-item", "Not Found").await;
    let development_location = css_text(
        session,
        ".field-name-field-development-location .field-item",
        "Not Found",
    )
    .await;
    let builder_name =
        css_text(session, ".field-name-field-builder-name .field-item", "Not Found").await;
    let notice_description = css_text(
        session,
        ".field-name-field-notice-description .field-item",
        "Not Found",
    )
    .await;
    let notice_name =
        css_text(session, "header.notice-section h1.notice-title", "Not Found").await;
    // The register's own markup misspells "planning" here.
    let planning_permission_number = css_text(
        session,
        ".field-name-field-plannning-permission-num .field-item",
        "Not Found",
    )
    .await;

    let keep = |value: String| if matched { value } else { String::new() };
    Ok(CommencementRecord {
        unique_application_number: row.unique_application_number.clone(),
        planning_authority: row.planning_authority.clone(),
        extracted_authority,
        notice_type: if matched { notice_type } else { NO_MATCH.to_owned() },
        commencement_date: parse_register_date(&raw_date),
        owner_company: keep(owner_company),
        development_location: keep(development_location),
        builder_name: keep(builder_name),
        notice_description: keep(notice_description),
        notice_name: keep(notice_name),
        details_link: link.to_owned(),
        planning_permission_number: keep(planning_permission_number),
    })
}

/// Trimmed text of the first element matching `selector`, with a default
/// for anything missing or empty.
async fn css_text(session: &Session, selector: &str, default: &str) -> String {
    match session.wait_for_css(selector, FIELD_WAIT).await {
        Ok(element) => element
            .inner_text()
            .await
            .ok()
            .flatten()
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| default.to_owned()),
        Err(_) => default.to_owned(),
    }
}

/// Register full-text search URL for an application. The register indexes
/// the bare reference, so the 3-character county prefix is dropped.
fn search_url(unique_application_number: &str) -> String {
    let uan = unique_application_number.trim();
    let trimmed = uan
        .char_indices()
        .nth(3)
        .map(|(index, _)| &uan[index..])
        .unwrap_or(uan);
    format!("{SEARCH_BASE}{trimmed}")
}

/// Whether the register's authority is close enough to the expected one.
/// Limerick merged into a single city-and-county body; the warehouse still
/// carries the pre-merger name.
fn authority_matches(extracted: &str, expected: &str) -> bool {
    let extracted = extracted.trim();
    let expected = expected.trim();
    if extracted.is_empty() || expected.is_empty() {
        return false;
    }
    if extracted == "Limerick City and County Council" && expected == "Limerick County Council" {
        return true;
    }
    strsim::normalized_levenshtein(&extracted.to_lowercase(), &expected.to_lowercase())
        >= AUTHORITY_MATCH_THRESHOLD
}

/// Resolve a possibly relative register href against the site base.
fn absolute_url(href: &str) -> String {
    if Url::parse(href).is_ok() {
        return href.to_owned();
    }
    Url::parse(SITE_BASE)
        .ok()
        .and_then(|base| base.join(href).ok())
        .map(|resolved| resolved.to_string())
        .unwrap_or_else(|| href.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_drops_the_county_prefix() {
        assert_eq!(
            search_url("WEX20210123"),
            format!("{SEARCH_BASE}20210123")
        );
        // Short references are used as-is.
        assert_eq!(search_url("AB1"), format!("{SEARCH_BASE}AB1"));
    }

    #[test]
    fn authority_match_tolerates_small_differences() {
        assert!(authority_matches(
            "Wexford County Council",
            "Wexford County Council"
        ));
        assert!(authority_matches(
            "Wexford  County Council",
            "Wexford County Council"
        ));
        assert!(!authority_matches(
            "Wexford County Council",
            "Mayo County Council"
        ));
        assert!(!authority_matches("", "Mayo County Council"));
    }

    #[test]
    fn limerick_merger_is_special_cased() {
        assert!(authority_matches(
            "Limerick City and County Council",
            "Limerick County Council"
        ));
    }

    #[test]
    fn relative_hrefs_resolve_against_the_site_base() {
        assert_eq!(
            absolute_url("/en/bcms/search?page=1"),
            "https://www.nbco.localgov.ie/en/bcms/search?page=1"
        );
        assert_eq!(
            absolute_url("https://www.nbco.localgov.ie/en/x"),
            "https://www.nbco.localgov.ie/en/x"
        );
    }
}
