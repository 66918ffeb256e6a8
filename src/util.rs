use chrono::NaiveDate;
use std::time::Duration;
use tracing::warn;

/// Format a `Duration` as a human-readable string with automatic unit scaling.
pub fn fmt_duration(d: Duration) -> String {
    format!("{d:.2?}")
}

/// Date formats seen across the portals, tried in order. All day-first.
const DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d/%m/%y",
    "%d %B %Y",
    "%d %b %Y",
    "%Y-%m-%d",
];

/// Parse a portal date string into a calendar date, day-first.
///
/// Returns `None` for empty input or anything unparseable; unparseable
/// non-empty input is logged since it usually means a layout drifted.
pub fn parse_portal_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }
    warn!(raw, "unparseable portal date");
    None
}

/// Parse the building-control register's long date format,
/// e.g. "Wednesday, 13 November, 2019".
pub fn parse_register_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "Not Found" {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%A, %d %B, %Y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_first_slash_dates() {
        assert_eq!(
            parse_portal_date("13/11/2019"),
            NaiveDate::from_ymd_opt(2019, 11, 13)
        );
        // Day-first means 03/04 is the 3rd of April, not March 4th.
        assert_eq!(
            parse_portal_date("03/04/2021"),
            NaiveDate::from_ymd_opt(2021, 4, 3)
        );
    }

    #[test]
    fn parses_textual_and_iso_dates() {
        assert_eq!(
            parse_portal_date("5 March 2020"),
            NaiveDate::from_ymd_opt(2020, 3, 5)
        );
        assert_eq!(
            parse_portal_date("2020-03-05"),
            NaiveDate::from_ymd_opt(2020, 3, 5)
        );
    }

    #[test]
    fn empty_and_garbage_dates_are_none() {
        assert_eq!(parse_portal_date(""), None);
        assert_eq!(parse_portal_date("   "), None);
        assert_eq!(parse_portal_date("pending"), None);
    }

    #[test]
    fn parses_register_long_format() {
        assert_eq!(
            parse_register_date("Wednesday, 13 November, 2019"),
            NaiveDate::from_ymd_opt(2019, 11, 13)
        );
        assert_eq!(parse_register_date("Not Found"), None);
        assert_eq!(parse_register_date(""), None);
    }
}
