//! Detail-page field extraction.
//!
//! Three structurally different layouts serve planning-application detail
//! pages; [`extract_detail`] dispatches on the authority's layout variant.
//! Every field is best-effort: a missing element yields an empty string for
//! that field and never fails the page.

use crate::authority::{Authority, LayoutVariant};
use crate::browser::Session;
use std::time::Duration;
use tracing::warn;

/// Bounded wait for a single named field.
const FIELD_WAIT: Duration = Duration::from_secs(5);

/// Bounded wait for a label/value lookup on tab-panel pages.
const LABEL_WAIT: Duration = Duration::from_secs(10);

/// Bounded wait for tab activation.
const TAB_WAIT: Duration = Duration::from_secs(10);

/// Shorter wait for the trailing tabs, which load with the page.
const SHORT_TAB_WAIT: Duration = Duration::from_secs(5);

/// Bounded wait for the layout's readiness marker.
const READY_WAIT: Duration = Duration::from_secs(20);
const TABBED_READY_WAIT: Duration = Duration::from_secs(10);

/// Body marker of the ePlan error page served instead of a detail page.
pub const SERVER_ERROR_MARKER: &str = "Server Error in '/ePlan' Application.";

/// Suffix phrases stripped from the resolved application status.
pub const STATUS_SUFFIXES: &[&str] = &[" by fingal county council", " - see appeal details"];

/// Raw field values scraped from one detail page. All strings; dates are
/// parsed later when the warehouse record is built.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DetailFields {
    pub status_non_owner: String,
    pub status_owner: String,
    pub decision: String,
    pub decision_date: String,
    pub received_date: String,
    pub appeal_decision: String,
    pub appeal_decision_date: String,
    pub appeal_type: String,
    pub grant_date: String,
    pub application_type: String,
    /// The decision-stage proposal text, preferred for the description.
    pub proposal: String,
    /// The development-tab description, used when no proposal is present.
    pub development_description: String,
    pub applicant: String,
}

impl DetailFields {
    /// The description column value: proposal text when present, the
    /// development description otherwise.
    pub fn description(&self) -> &str {
        if self.proposal.trim().is_empty() {
            &self.development_description
        } else {
            &self.proposal
        }
    }
}

/// Whether a page body is the ePlan server-error page.
pub fn is_server_error(body: &str) -> bool {
    body.contains(SERVER_ERROR_MARKER)
}

/// Resolve the application status: prefer the non-owner field, fall back
/// to the owner field, lowercase, and strip known suffix phrases.
/// Stripping removes every occurrence, so the operation is idempotent.
pub fn resolve_status(non_owner: &str, owner: &str) -> String {
    let source = if non_owner.trim().is_empty() {
        owner
    } else {
        non_owner
    };
    let mut status = source.to_lowercase().trim().to_owned();
    for suffix in STATUS_SUFFIXES {
        status = status.replace(suffix, "");
    }
    status
}

/// Wait for the layout's readiness marker. On timeout, accept the page
/// anyway when the body carries a known detail-page phrase; some portals
/// render the record without their usual chrome.
pub async fn detail_page_ready(session: &Session, authority: Authority) -> bool {
    let ready = match authority.profile().layout {
        LayoutVariant::FormInput => session
            .wait_for_xpath("//input[contains(@id,'reference')]", READY_WAIT)
            .await
            .is_ok(),
        LayoutVariant::LegacyTable => session
            .wait_for_xpath("//a[text()='Open All']", READY_WAIT)
            .await
            .is_ok(),
        LayoutVariant::TabbedPanels => session
            .wait_for_xpath(
                "//ul[contains(@class, 'nav-tabs') and contains(@class, 'bg-info')]",
                TABBED_READY_WAIT,
            )
            .await
            .is_ok(),
    };
    if ready {
        return true;
    }
    let body = session.page_source().await;
    if body.contains("Planning application details") || body.contains("Application details") {
        warn!("detail page loaded without its expected marker, continuing");
        true
    } else {
        false
    }
}

/// Extract all fields from a loaded detail page.
pub async fn extract_detail(session: &Session, authority: Authority) -> DetailFields {
    match authority.profile().layout {
        LayoutVariant::FormInput => extract_form_inputs(session, authority).await,
        LayoutVariant::TabbedPanels => extract_tab_panels(session).await,
        LayoutVariant::LegacyTable => extract_legacy_table(session).await,
    }
}

/// Read the `value` attribute of a named input/textarea, empty on timeout.
async fn input_value(session: &Session, element: &str, name: &str) -> String {
    let xpath = format!("//{element}[@name='{name}']");
    match session.wait_for_xpath(&xpath, FIELD_WAIT).await {
        Ok(el) => el.attribute("value").await.ok().flatten().unwrap_or_default(),
        Err(_) => {
            warn!(field = name, "named field not found on detail page");
            String::new()
        }
    }
}

/// Trimmed inner text of the first element matching `xpath`, empty on timeout.
async fn text_at(session: &Session, xpath: &str, wait: Duration) -> String {
    match session.wait_for_xpath(xpath, wait).await {
        Ok(el) => el
            .inner_text()
            .await
            .ok()
            .flatten()
            .map(|t| t.trim().to_owned())
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

/// Value cell following a `th` label cell containing `label`.
async fn label_value(session: &Session, label: &str, wait: Duration) -> String {
    let xpath = format!("//th[contains(text(), '{label}')]/following-sibling::td[1]");
    text_at(session, &xpath, wait).await
}

/// The portion of a "Label: value" cell after the first colon; the whole
/// text when no colon is present.
fn after_colon(text: &str) -> String {
    match text.split_once(':') {
        Some((_, rest)) => rest.trim().to_owned(),
        None => text.trim().to_owned(),
    }
}

async fn extract_form_inputs(session: &Session, authority: Authority) -> DetailFields {
    let mut fields = DetailFields::default();
    fields.decision_date = input_value(session, "input", "decisionDate").await;
    fields.appeal_decision_date = input_value(session, "input", "appealDecisionDate").await;
    fields.appeal_decision = input_value(session, "input", "appealDecision").await;
    fields.appeal_type = input_value(session, "input", "appealType").await;
    fields.grant_date = input_value(session, "input", "finalGrantDate").await;
    fields.application_type = input_value(session, "input", "applicationType").await;
    fields.proposal = input_value(session, "textarea", "fullProposal").await;
    fields.applicant = input_value(session, "input", "applicantSurname").await;
    fields.received_date = input_value(session, "input", "registrationDate").await;

    // South Dublin publishes the non-owner status under the owner field name.
    let status_field = if authority == Authority::SouthDublin {
        "statusOwner"
    } else {
        "statusNonOwner"
    };
    fields.status_non_owner = input_value(session, "input", status_field).await;

    fields.decision = text_at(
        session,
        "//span[contains(@class,'stat-desc-span') and @ng-bind-html='propValue']",
        FIELD_WAIT,
    )
    .await;
    fields
}

/// Click a tab link and wait for its `aria-selected` state to flip.
async fn activate_tab(session: &Session, anchor: &str, wait: Duration) -> bool {
    let link = format!("//a[@href='#{anchor}']");
    let Ok(element) = session.wait_for_xpath(&link, wait).await else {
        return false;
    };
    if element.click().await.is_err() {
        return false;
    }
    let selected = format!("//a[@href='#{anchor}' and @aria-selected='true']");
    session.wait_for_xpath(&selected, wait).await.is_ok()
}

async fn extract_tab_panels(session: &Session) -> DetailFields {
    let mut fields = DetailFields::default();

    // Application tab is loaded by default.
    fields.application_type = label_value(session, "Application Type", LABEL_WAIT).await;
    fields.status_non_owner = label_value(session, "Planning Status", LABEL_WAIT).await;
    fields.received_date = label_value(session, "Received Date:", LABEL_WAIT).await;
    fields.decision_date = label_value(session, "Decision Date:", LABEL_WAIT).await;
    fields.decision = text_at(
        session,
        "//th[contains(text(), 'Decision Type:')]/following::td[1]",
        LABEL_WAIT,
    )
    .await;

    if activate_tab(session, "Development", TAB_WAIT).await {
        fields.development_description =
            label_value(session, "Development Description:", LABEL_WAIT).await;
    } else {
        warn!("development tab activation failed");
    }

    if activate_tab(session, "Applicant", TAB_WAIT).await {
        fields.applicant = label_value(session, "Applicant name:", LABEL_WAIT).await;
    } else {
        warn!("applicant tab activation failed");
    }

    if activate_tab(session, "Decision", SHORT_TAB_WAIT).await {
        fields.grant_date = text_at(
            session,
            "//th[normalize-space(text())='Grant Date:']/following-sibling::td[1]",
            LABEL_WAIT,
        )
        .await;
        fields.proposal = label_value(session, "Decision Description:", LABEL_WAIT).await;
    } else {
        warn!("decision tab activation failed");
    }

    if activate_tab(session, "Appeal", SHORT_TAB_WAIT).await {
        fields.appeal_type = label_value(session, "Appeal Type: ", LABEL_WAIT).await;
        fields.appeal_decision = label_value(session, "Appeal Decision: ", LABEL_WAIT).await;
        fields.appeal_decision_date = label_value(session, "Decision Date:  ", LABEL_WAIT).await;
    } else {
        warn!("appeal tab activation failed");
    }

    fields
}

async fn extract_legacy_table(session: &Session) -> DetailFields {
    let mut fields = DetailFields::default();
    fields.decision_date = label_value(session, "Decision Date:", FIELD_WAIT).await;
    fields.application_type = after_colon(
        &text_at(
            session,
            "//th[contains(text(), 'Application Type:')]",
            FIELD_WAIT,
        )
        .await,
    );
    fields.applicant = label_value(session, "Applicant Name:", FIELD_WAIT).await;
    fields.status_non_owner = label_value(session, "Decision Stage:", FIELD_WAIT).await;
    fields.decision = after_colon(
        &text_at(session, "//th[contains(text(), 'Decision:')]", FIELD_WAIT).await,
    );

    fields.proposal = label_value(session, "Proposal:", FIELD_WAIT).await;
    if fields.proposal.is_empty() {
        // Some records embed the proposal in an iframe instead of the table.
        fields.proposal = iframe_body_text(session).await;
    }
    fields
}

/// Text of an embedded proposal iframe, empty when absent or cross-origin.
async fn iframe_body_text(session: &Session) -> String {
    let script = r#"
        (() => {
            const frame = document.querySelector('td > iframe');
            if (!frame) return '';
            try {
                const doc = frame.contentDocument;
                return doc && doc.body ? doc.body.innerText.trim() : '';
            } catch (e) {
                return '';
            }
        })()
    "#;
    session
        .eval_value(script)
        .await
        .and_then(|v| v.as_str().map(|s| s.to_owned()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_prefers_non_owner_field() {
        assert_eq!(resolve_status("Decided", "Pending"), "decided");
        assert_eq!(resolve_status("", "Pending"), "pending");
        assert_eq!(resolve_status("   ", "Pending"), "pending");
        assert_eq!(resolve_status("", ""), "");
    }

    #[test]
    fn status_suffixes_are_stripped() {
        assert_eq!(
            resolve_status("Granted by Fingal County Council", ""),
            "granted"
        );
        assert_eq!(
            resolve_status("Refused - see appeal details", ""),
            "refused"
        );
    }

    #[test]
    fn status_stripping_is_idempotent() {
        let once = resolve_status("Granted by Fingal County Council", "");
        let twice = resolve_status(&once, "");
        assert_eq!(once, twice);
    }

    #[test]
    fn server_error_body_is_detected() {
        let body = "<html><body>Server Error in '/ePlan' Application.</body></html>";
        assert!(is_server_error(body));
        assert!(!is_server_error("<html><body>Application details</body></html>"));
    }

    #[test]
    fn after_colon_extracts_the_value() {
        assert_eq!(after_colon("Decision: GRANT PERMISSION"), "GRANT PERMISSION");
        assert_eq!(after_colon("no colon here"), "no colon here");
        assert_eq!(after_colon("a: b: c"), "b: c");
    }

    #[test]
    fn description_prefers_proposal_text() {
        let fields = DetailFields {
            proposal: "build a house".to_owned(),
            development_description: "dev description".to_owned(),
            ..DetailFields::default()
        };
        assert_eq!(fields.description(), "build a house");

        let fields = DetailFields {
            development_description: "dev description".to_owned(),
            ..DetailFields::default()
        };
        assert_eq!(fields.description(), "dev description");
    }
}
