//! Search-form submission.

use crate::authority::{Authority, SearchSelectors};
use crate::browser::{Session, SessionError};
use crate::retry::{Backoff, RetryPolicy};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

const INPUT_WAIT: Duration = Duration::from_secs(10);
const SUBMIT_WAIT: Duration = Duration::from_secs(15);

/// Fill and submit an authority's search form, retrying with the given
/// policy. Later attempts re-navigate to the search page first.
///
/// Returns whether a submission was triggered; on `false` the caller
/// abandons this row and continues the pipeline.
pub async fn submit_search(
    session: &mut Session,
    authority: Authority,
    application_number: &str,
    search_url: &str,
    policy: RetryPolicy,
) -> bool {
    let selectors = authority.profile().search;
    for attempt in policy.attempts() {
        if attempt > 1 {
            info!(
                attempt,
                max_attempts = policy.max_attempts,
                "retrying search submission"
            );
            let renavigate = RetryPolicy::new(1, Backoff::None);
            if session.goto_checked(search_url, renavigate).await.is_err() {
                sleep(policy.delay_for(attempt)).await;
                continue;
            }
            sleep(policy.delay_for(attempt)).await;
        }
        match try_submit(session, selectors, application_number).await {
            Ok(()) => {
                info!("search submitted");
                return true;
            }
            Err(e) => warn!(attempt, error = %e, "search attempt failed"),
        }
    }
    error!(
        attempts = policy.max_attempts,
        "all search attempts failed, abandoning row"
    );
    false
}

async fn try_submit(
    session: &Session,
    selectors: SearchSelectors,
    application_number: &str,
) -> Result<(), SessionError> {
    let input = session.wait_for_css(selectors.input, INPUT_WAIT).await?;
    session.clear_input(selectors.input).await?;
    input.type_str(application_number.trim()).await?;

    let submit = session.wait_for_css(selectors.submit, SUBMIT_WAIT).await?;
    // Some portals wire the button up a moment after rendering it.
    sleep(Duration::from_secs(1)).await;
    submit.click().await?;
    Ok(())
}
