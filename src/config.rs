use crate::browser::BrowserSettings;
use anyhow::Context;
use figment::{Figment, providers::Env};
use serde::Deserialize;
use std::time::Duration;

/// Application configuration, extracted from the environment (and `.env`
/// via dotenvy in `main`).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Explicit Chrome binary path; autodetected when unset.
    #[serde(default)]
    pub chrome_bin: Option<String>,

    #[serde(default = "default_page_load_timeout")]
    pub page_load_timeout_secs: u64,

    /// Flush threshold for the raw-applications batch.
    #[serde(default = "default_application_batch")]
    pub application_batch_size: usize,

    /// Flush threshold for the register jobs' batches.
    #[serde(default = "default_notice_batch")]
    pub notice_batch_size: usize,

    /// Building-control register login, required by the completions job.
    #[serde(default)]
    pub register_username: Option<String>,
    #[serde(default)]
    pub register_password: Option<String>,
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_page_load_timeout() -> u64 {
    60
}

fn default_application_batch() -> usize {
    60
}

fn default_notice_batch() -> usize {
    40
}

/// Login for the building-control register.
#[derive(Debug, Clone)]
pub struct RegisterCredentials {
    pub username: String,
    pub password: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Figment::new()
            .merge(Env::raw())
            .extract()
            .context("failed to load config from environment")
    }

    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            chrome_executable: self.chrome_bin.clone(),
            page_load_timeout: Duration::from_secs(self.page_load_timeout_secs),
        }
    }

    pub fn register_credentials(&self) -> Option<RegisterCredentials> {
        match (&self.register_username, &self.register_password) {
            (Some(username), Some(password)) => Some(RegisterCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}
