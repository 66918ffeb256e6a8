//! Completion-certificate job: revisit matched commencement notices and
//! collect the certificates listed on each. Certificate data sits behind a
//! register login.

use crate::browser::{Session, SessionError};
use crate::config::{Config, RegisterCredentials};
use crate::data::batch::Batch;
use crate::data::completions;
use crate::data::models::{CompletionRecord, CompletionRow};
use crate::retry::{Backoff, RetryPolicy};
use anyhow::{Context, Result};
use chromiumoxide::Element;
use rand::Rng;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const CERTIFICATE_CSS: &str =
    "section.notice-info .field-name-field-certificate article.node-certificate";

const NAV_RETRY: RetryPolicy = RetryPolicy::new(3, Backoff::Fixed(Duration::from_secs(2)));

const LOGIN_WAIT: Duration = Duration::from_secs(10);
const LOGGED_IN_PROBE: Duration = Duration::from_secs(5);
const LOGIN_CONFIRM_WAIT: Duration = Duration::from_secs(15);

pub async fn run(pool: &PgPool, config: &Config) -> Result<()> {
    let credentials = config
        .register_credentials()
        .context("register credentials are not configured (REGISTER_USERNAME / REGISTER_PASSWORD)")?;

    let rows = completions::pending_rows(pool)
        .await
        .context("failed to load pending completion lookups")?;
    info!(rows = rows.len(), "pending completion lookups loaded");
    if rows.is_empty() {
        return Ok(());
    }

    let mut session = Session::launch(config.browser_settings())
        .await
        .context("failed to launch browser session")?;
    let result = drive_rows(&mut session, pool, config, &rows, &credentials).await;
    session.close().await;
    result
}

async fn drive_rows(
    session: &mut Session,
    pool: &PgPool,
    config: &Config,
    rows: &[CompletionRow],
    credentials: &RegisterCredentials,
) -> Result<()> {
    let mut batch = Batch::new(config.notice_batch_size);
    for row in rows {
        info!(uan = %row.unique_application_number, url = %row.details_link, "processing notice");
        match process_row(session, row, credentials).await {
            Ok(records) => {
                for record in records {
                    batch.push(record);
                }
            }
            Err(e) => {
                warn!(uan = %row.unique_application_number, error = %e, "row failed, continuing")
            }
        }

        if batch.is_full() {
            let records = batch.take();
            info!(records = records.len(), "flushing batch");
            completions::append_records(pool, &records)
                .await
                .context("warehouse upload failed")?;
        }

        polite_delay().await;
    }

    if !batch.is_empty() {
        let records = batch.take();
        info!(records = records.len(), "flushing final batch");
        completions::append_records(pool, &records)
            .await
            .context("warehouse upload failed")?;
    }
    Ok(())
}

async fn process_row(
    session: &mut Session,
    row: &CompletionRow,
    credentials: &RegisterCredentials,
) -> Result<Vec<CompletionRecord>, SessionError> {
    session.goto_checked(&row.details_link, NAV_RETRY).await?;
    ensure_logged_in(session, credentials, &row.details_link).await?;

    let certificates = session
        .page()
        .find_elements(CERTIFICATE_CSS)
        .await
        .unwrap_or_default();
    if certificates.is_empty() {
        info!(uan = %row.unique_application_number, "no certificates listed");
        return Ok(vec![CompletionRecord::empty(
            &row.unique_application_number,
            &row.details_link,
        )]);
    }

    info!(count = certificates.len(), "certificates found");
    let mut records = Vec::with_capacity(certificates.len());
    for certificate in &certificates {
        records.push(read_certificate(certificate, row).await);
    }
    Ok(records)
}

/// Log in unless the page already shows a Log Out link. The cookie banner
/// overlaps the login link, so it is declined first when present.
async fn ensure_logged_in(
    session: &mut Session,
    credentials: &RegisterCredentials,
    return_url: &str,
) -> Result<(), SessionError> {
    if session
        .wait_for_xpath("//a[text()='Log Out']", LOGGED_IN_PROBE)
        .await
        .is_ok()
    {
        debug!("already logged in");
        return Ok(());
    }

    if let Ok(decline) = session
        .wait_for_css("#CybotCookiebotDialogBodyButtonDecline", LOGIN_WAIT)
        .await
    {
        if decline.click().await.is_ok() {
            info!("cookie banner declined");
        }
    }

    let login = session
        .wait_for_xpath("//a[text()='Log In']", LOGIN_WAIT)
        .await?;
    login.click().await?;

    session
        .wait_for_css("#edit-name", LOGIN_WAIT)
        .await?
        .type_str(&credentials.username)
        .await?;
    session
        .wait_for_css("#edit-pass", LOGIN_WAIT)
        .await?
        .type_str(&credentials.password)
        .await?;
    session
        .wait_for_css("#edit-submit", LOGIN_WAIT)
        .await?
        .click()
        .await?;

    session
        .wait_for_xpath(
            "//p[contains(text(),\"Use the tabs below to create and/or view your Notices\")]",
            LOGIN_CONFIRM_WAIT,
        )
        .await?;
    info!("register login successful");

    session.goto_checked(return_url, NAV_RETRY).await?;
    Ok(())
}

async fn read_certificate(certificate: &Element, row: &CompletionRow) -> CompletionRecord {
    let title = match certificate.find_element("span[property='dc:title']").await {
        Ok(element) => element
            .attribute("content")
            .await
            .ok()
            .flatten()
            .map(|value| value.trim().to_owned())
            .unwrap_or_default(),
        Err(_) => String::new(),
    };
    let certificate_number = element_text(certificate, ".field-name-field-cc-no .field-item").await;
    let units_text = element_text(certificate, ".field-name-field-cc-units .field-items").await;
    let total_units = parse_total_units(&units_text);
    let address = read_address(certificate).await;

    CompletionRecord {
        unique_application_number: row.unique_application_number.clone(),
        title,
        certificate_number,
        total_units,
        address,
        ncbo_link: row.details_link.clone(),
    }
}

/// Joined, de-duplicated address parts, preserving their order.
async fn read_address(certificate: &Element) -> String {
    let Ok(parts) = certificate
        .find_elements(".field-name-field-cc-address .certificate-address-part")
        .await
    else {
        return String::new();
    };
    let mut seen: Vec<String> = Vec::new();
    for part in parts {
        if let Ok(Some(text)) = part.inner_text().await {
            let text = text.trim().to_owned();
            if !text.is_empty() && !seen.contains(&text) {
                seen.push(text);
            }
        }
    }
    seen.join(", ")
}

async fn element_text(parent: &Element, selector: &str) -> String {
    match parent.find_element(selector).await {
        Ok(element) => element
            .inner_text()
            .await
            .ok()
            .flatten()
            .map(|text| text.trim().to_owned())
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

/// Best-effort cast of the register's unit count, which renders as a
/// float. Uncastable values are logged and left unset.
fn parse_total_units(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value as i32),
        _ => {
            warn!(raw, "uncastable total-units value");
            None
        }
    }
}

/// Uniform random pause between rows to keep load on the register low.
async fn polite_delay() {
    let seconds = rand::rng().random_range(2.5..6.0);
    debug!(seconds = format!("{seconds:.2}"), "delaying before next row");
    sleep(Duration::from_secs_f64(seconds)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_counts_cast_best_effort() {
        assert_eq!(parse_total_units("12"), Some(12));
        assert_eq!(parse_total_units("12.0"), Some(12));
        assert_eq!(parse_total_units(" 3 "), Some(3));
        assert_eq!(parse_total_units(""), None);
        assert_eq!(parse_total_units("n/a"), None);
        assert_eq!(parse_total_units("NaN"), None);
    }
}
