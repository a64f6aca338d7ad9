use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;

/// Configuration for the application
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the hosted backend, e.g. `https://xyz.example.co`
    pub backend_url: String,
    /// Public (anon) API key of the backend project
    pub backend_anon_key: String,
    /// Direct Postgres connection; when set, the clients table is reached through it
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_session_file() -> PathBuf {
    PathBuf::from(".onboarding_session.json")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("onboarding_tracker.log")
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// This function will:
    /// 1. Load variables from .env file if it exists
    /// 2. Deserialize environment variables into Config struct
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let config = envy::from_env::<Config>()
            .context("BACKEND_URL and BACKEND_ANON_KEY must be set (environment or .env)")?;

        Ok(config)
    }

    /// Build a configuration from explicit `KEY=value` pairs instead of the process environment.
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::from_iter::<_, Config>(vars)?)
    }

    pub fn backend_url(&self) -> &str {
        self.backend_url.trim_end_matches('/')
    }

    /// Get a direct reference to the database URL, if one is configured
    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref().filter(|url| !url.is_empty())
    }

    pub fn session_file(&self) -> &Path {
        &self.session_file
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Initialize environment variables and load configuration
pub fn init() -> Result<Config> {
    Config::load()
}
