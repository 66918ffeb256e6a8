//! Error types for the browser session layer.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("timed out after {waited:?} waiting for {what}")]
    WaitTimeout { what: String, waited: Duration },
    #[error("navigation to {url} failed after {attempts} attempts")]
    NavigationFailed { url: String, attempts: u32 },
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error(transparent)]
    Cdp(#[from] chromiumoxide::error::CdpError),
}
