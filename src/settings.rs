//! Runtime Settings
//!
//! Process-level knobs, each backed by an environment variable. Connection
//! parameters for Infisical are not here; they arrive with every request.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Outbound HTTP settings for calls to Infisical
#[derive(Debug, Clone, Args)]
pub struct HttpSettings {
    /// Total timeout for each Infisical API call, in seconds
    #[arg(
        long = "http-timeout-secs",
        env = "INFISICAL_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        global = true
    )]
    pub timeout_secs: u64,

    /// Connect timeout for each Infisical API call, in seconds
    #[arg(
        long = "connect-timeout-secs",
        env = "INFISICAL_CONNECT_TIMEOUT_SECS",
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        global = true
    )]
    pub connect_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Build the HTTP client used for every outbound call
    pub fn build_client(&self) -> Result<Client> {
        if self.timeout_secs == 0 {
            anyhow::bail!("HTTP timeout must be at least one second");
        }
        if self.connect_timeout_secs == 0 {
            anyhow::bail!("HTTP connect timeout must be at least one second");
        }

        Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout())
            .connect_timeout(self.connect_timeout())
            .build()
            .context("Failed to build reqwest client")
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
