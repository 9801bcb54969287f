// SPDX-License-Identifier: MIT
// Copyright (C) 2026 Handoff Contributors

//! Environment-driven defaults.
//!
//! - `HANDOFF_TIMEOUT_SECS` - Request timeout in seconds (unset or 0: none)
//! - `HANDOFF_USER_AGENT` - `User-Agent` header value
//! - `HANDOFF_FAIL` - Treat HTTP status >= 400 as a failure (`1`/`true`)
//!
//! Command-line flags take precedence over these.

use std::net::SocketAddr;
use std::time::Duration;

use handoff_session::SessionConfig;
use crate::app::Cli;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
    pub fail_on_error: bool,
    pub verbose: bool,
    pub progress: bool,
    /// Settings that were present but could not be parsed, as `(key, value)`.
    /// Logged once the subscriber is installed.
    pub ignored: Vec<(&'static str, String)>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut ignored = Vec::new();
        let timeout = lookup("HANDOFF_TIMEOUT_SECS").and_then(|v| match v.trim().parse::<u64>() {
            Ok(0) => None,
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(_) => {
                ignored.push(("HANDOFF_TIMEOUT_SECS", v));
                None
            }
        });

        Self {
            timeout,
            user_agent: lookup("HANDOFF_USER_AGENT").filter(|v| !v.is_empty()),
            fail_on_error: lookup("HANDOFF_FAIL").is_some_and(|v| env_bool(&v)),
            verbose: false,
            progress: false,
            ignored,
        }
    }

    /// Apply command-line flags on top of the environment.
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(secs) = cli.timeout {
            self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        self.fail_on_error |= cli.fail;
        self.verbose |= cli.verbose;
        self.progress |= cli.progress;
        self
    }

    pub fn session_config(&self, url: &str, destination: SocketAddr) -> SessionConfig {
        let config = SessionConfig::new(url)
            .destination(destination)
            .timeout(self.timeout)
            .fail_on_error(self.fail_on_error)
            .verbose(self.verbose)
            .progress(self.progress);
        match &self.user_agent {
            Some(agent) => config.user_agent(agent.as_str()),
            None => config,
        }
    }
}

fn env_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
