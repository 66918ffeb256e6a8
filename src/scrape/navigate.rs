//! Result-table navigation.
//!
//! Scans paginated search results for a target application reference and
//! opens its detail page. Two table layouts exist: the modern Angular
//! result table and the legacy striped table; the layout is detected by
//! probing for one and falling back to the other.

use crate::authority::Authority;
use crate::browser::{Session, SessionError};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

const TABLE_WAIT: Duration = Duration::from_secs(10);
const PAGE_CHANGE_WAIT: Duration = Duration::from_secs(10);

/// Only the first rows of each page are scanned; an exact-reference search
/// never legitimately lands further down.
const ROWS_PER_PAGE: usize = 10;

const MODERN_TABLE_XPATH: &str =
    "//div[@class='sas-table hidden-md hidden-lg']//tr[@ng-repeat='row in $data']";
const LEGACY_TABLE_XPATH: &str = "//table[contains(@class, 'table-striped')]/tbody/tr[td]";
const NEXT_CONTROL_CSS: &str = "a[ng-switch-when='next']";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableLayout {
    Modern,
    Legacy,
}

/// Case-insensitive exact match between a row's reference and the target.
pub fn reference_matches(candidate: &str, target: &str) -> bool {
    candidate.trim().eq_ignore_ascii_case(target.trim())
}

/// Whether the next-page control may be followed, judged from its parent's
/// class attribute. A missing control or a `disabled` parent stops paging.
pub fn next_control_enabled(parent_class: Option<&str>) -> bool {
    match parent_class {
        Some(class) => !class.contains("disabled"),
        None => false,
    }
}

/// Walk result pages looking for `target`; on a match, open its detail
/// page and return `true`. Returns `false` when the results are exhausted
/// without a match — the caller decides how to record the absence.
pub async fn find_and_open(
    session: &Session,
    authority: Authority,
    target: &str,
) -> Result<bool, SessionError> {
    let reference_column = authority.profile().reference_column;
    let modern_ref_css = format!("td[data-title-override*='{reference_column}'] span");

    loop {
        let (rows, layout) = match session.wait_for_xpaths(MODERN_TABLE_XPATH, TABLE_WAIT).await {
            Ok(rows) => (rows, TableLayout::Modern),
            Err(_) => match session.wait_for_xpaths(LEGACY_TABLE_XPATH, TABLE_WAIT).await {
                Ok(rows) => (rows, TableLayout::Legacy),
                Err(_) => {
                    warn!(target, "no result rows appeared within the wait");
                    return Ok(false);
                }
            },
        };
        info!(rows = rows.len(), layout = ?layout, "scanning result page");

        for row in rows.iter().take(ROWS_PER_PAGE) {
            match layout {
                TableLayout::Modern => {
                    let Ok(cell) = row.find_element(modern_ref_css.as_str()).await else {
                        continue;
                    };
                    let reference = cell.inner_text().await.ok().flatten().unwrap_or_default();
                    if reference_matches(&reference, target) {
                        info!(reference = reference.trim(), "match found, opening row");
                        row.click().await?;
                        // The Angular table swaps views in place; give it a beat.
                        sleep(Duration::from_secs(2)).await;
                        return Ok(true);
                    }
                }
                TableLayout::Legacy => {
                    let Ok(link) = row.find_element("td:first-child a").await else {
                        continue;
                    };
                    let reference = link.inner_text().await.ok().flatten().unwrap_or_default();
                    if reference_matches(&reference, target) {
                        info!(reference = reference.trim(), "match found, following link");
                        link.click().await?;
                        return Ok(true);
                    }
                }
            }
        }

        if !follow_next_page(session).await? {
            return Ok(false);
        }
    }
}

/// Follow the next-page control if it exists and is enabled, detecting
/// progress via a URL change. Returns whether a new page was reached.
async fn follow_next_page(session: &Session) -> Result<bool, SessionError> {
    let probe = session
        .eval_value(
            "(() => { \
                const next = document.querySelector(\"a[ng-switch-when='next']\"); \
                if (!next) return null; \
                return next.parentElement ? next.parentElement.className : ''; \
            })()",
        )
        .await;
    let parent_class = probe.as_ref().and_then(|v| v.as_str());
    if !next_control_enabled(parent_class) {
        info!("last result page reached, stopping pagination");
        return Ok(false);
    }

    let previous = session.current_url().await;
    let Ok(next) = session.page().find_element(NEXT_CONTROL_CSS).await else {
        return Ok(false);
    };
    next.click().await?;
    if !session
        .wait_until_url_changes(&previous, PAGE_CHANGE_WAIT)
        .await
    {
        warn!("pagination click did not advance the page, stopping");
        return Ok(false);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_match_is_case_insensitive_and_exact() {
        assert!(reference_matches("abc123", "ABC123"));
        assert!(reference_matches("  abc123 ", "abc123"));
        assert!(!reference_matches("abc123x", "abc123"));
        assert!(!reference_matches("abc12", "abc123"));
    }

    #[test]
    fn disabled_next_control_stops_pagination() {
        assert!(!next_control_enabled(Some("pagination-next disabled")));
        assert!(!next_control_enabled(None));
        assert!(next_control_enabled(Some("pagination-next")));
        assert!(next_control_enabled(Some("")));
    }
}
