// SPDX-License-Identifier: MIT
// Copyright (C) 2026 Handoff Contributors

//! Log setup.
//!
//! Standard output carries the response body, so all logging goes to stderr.
//!
//! # Configuration
//!
//! - `RUST_LOG`: Log filter (default: `warn`, or debug for handoff crates with `--verbose`)

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const QUIET_FILTER: &str = "warn";
const VERBOSE_FILTER: &str = "warn,handoff=debug,handoff_session=debug,handoff_activation=debug";

pub fn init(verbose: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { VERBOSE_FILTER } else { QUIET_FILTER })
    });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(())
}
