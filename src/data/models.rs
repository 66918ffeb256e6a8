//! Row and record shapes moving between the warehouse and the scraper.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

/// One planning application to resolve, as returned by the source query.
#[derive(Debug, Clone, FromRow)]
pub struct SourceRow {
    pub unique_application_number: String,
    pub application_number: String,
    pub planning_authority: String,
    pub link_app_details: Option<String>,
}

/// Best-effort extraction result for one application.
///
/// Identity fields and the URL are always populated; every scraped field
/// may be empty or `None`.
#[derive(Debug, Clone)]
pub struct ExtractedRecord {
    pub unique_application_number: String,
    pub application_number: String,
    pub application_status: String,
    pub development_description: String,
    pub application_type: String,
    pub decision: String,
    pub appeal_decision: String,
    pub appeal_type: String,
    pub decision_date: Option<NaiveDate>,
    pub received_date: Option<NaiveDate>,
    pub appeal_decision_date: Option<NaiveDate>,
    pub grant_date: Option<NaiveDate>,
    pub applicant: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl ExtractedRecord {
    /// A record with every scraped field empty, used for server-error
    /// pages where only the identity of the row is known.
    pub fn empty(row: &SourceRow, url: String) -> Self {
        Self {
            unique_application_number: row.unique_application_number.clone(),
            application_number: row.application_number.clone(),
            application_status: String::new(),
            development_description: String::new(),
            application_type: String::new(),
            decision: String::new(),
            appeal_decision: String::new(),
            appeal_type: String::new(),
            decision_date: None,
            received_date: None,
            appeal_decision_date: None,
            grant_date: None,
            applicant: String::new(),
            url,
            created_at: Utc::now(),
        }
    }

    /// Whether every scraped (non-identity) field is empty.
    pub fn is_blank(&self) -> bool {
        self.application_status.is_empty()
            && self.development_description.is_empty()
            && self.application_type.is_empty()
            && self.decision.is_empty()
            && self.appeal_decision.is_empty()
            && self.appeal_type.is_empty()
            && self.decision_date.is_none()
            && self.received_date.is_none()
            && self.appeal_decision_date.is_none()
            && self.grant_date.is_none()
            && self.applicant.is_empty()
    }
}

/// One commencement-notice lookup, as returned by the source query.
#[derive(Debug, Clone, FromRow)]
pub struct CommencementRow {
    pub unique_application_number: String,
    pub planning_authority: String,
    /// Direct notice link when a prior stage already resolved one.
    pub ncbo_link: Option<String>,
}

/// A scraped commencement notice, or a "no match" marker when the register
/// had nothing for the application.
#[derive(Debug, Clone)]
pub struct CommencementRecord {
    pub unique_application_number: String,
    pub planning_authority: String,
    pub extracted_authority: String,
    pub notice_type: String,
    pub commencement_date: Option<NaiveDate>,
    pub owner_company: String,
    pub development_location: String,
    pub builder_name: String,
    pub notice_description: String,
    pub notice_name: String,
    pub details_link: String,
    pub planning_permission_number: String,
}

/// Marker stored in `notice_type` when no register entry matched.
pub const NO_MATCH: &str = "no match";

impl CommencementRecord {
    /// The record written when the register search produced no results.
    pub fn no_match(row: &CommencementRow) -> Self {
        Self {
            unique_application_number: row.unique_application_number.clone(),
            planning_authority: row.planning_authority.clone(),
            extracted_authority: String::new(),
            notice_type: NO_MATCH.to_owned(),
            commencement_date: None,
            owner_company: String::new(),
            development_location: String::new(),
            builder_name: String::new(),
            notice_description: String::new(),
            notice_name: String::new(),
            details_link: String::new(),
            planning_permission_number: String::new(),
        }
    }
}

/// One completion-certificate lookup: a notice page already known to the
/// warehouse.
#[derive(Debug, Clone, FromRow)]
pub struct CompletionRow {
    pub unique_application_number: String,
    pub details_link: String,
}

/// A completion certificate scraped from a notice page.
#[derive(Debug, Clone)]
pub struct CompletionRecord {
    pub unique_application_number: String,
    pub title: String,
    pub certificate_number: String,
    pub total_units: Option<i32>,
    pub address: String,
    pub ncbo_link: String,
}

impl CompletionRecord {
    /// The record written when a notice page lists no certificates.
    pub fn empty(unique_application_number: &str, link: &str) -> Self {
        Self {
            unique_application_number: unique_application_number.to_owned(),
            title: String::new(),
            certificate_number: String::new(),
            total_units: None,
            address: String::new(),
            ncbo_link: link.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_row() -> SourceRow {
        SourceRow {
            unique_application_number: "DUB123/45".to_owned(),
            application_number: "123/45".to_owned(),
            planning_authority: "Dublin City Council".to_owned(),
            link_app_details: None,
        }
    }

    #[test]
    fn empty_record_keeps_identity_and_nothing_else() {
        let record = ExtractedRecord::empty(&source_row(), "https://example.ie/x".to_owned());
        assert_eq!(record.unique_application_number, "DUB123/45");
        assert_eq!(record.application_number, "123/45");
        assert_eq!(record.url, "https://example.ie/x");
        assert!(record.is_blank());
    }

    #[test]
    fn no_match_record_is_marked() {
        let row = CommencementRow {
            unique_application_number: "WEX9/87".to_owned(),
            planning_authority: "Wexford County Council".to_owned(),
            ncbo_link: None,
        };
        let record = CommencementRecord::no_match(&row);
        assert_eq!(record.notice_type, NO_MATCH);
        assert!(record.details_link.is_empty());
        assert!(record.commencement_date.is_none());
    }
}
