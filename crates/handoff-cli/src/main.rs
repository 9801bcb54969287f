// SPDX-License-Identifier: MIT
// Copyright (C) 2026 Handoff Contributors

//! Handoff - run one HTTP request over a socket the service supervisor opened.
//!
//! ```text
//! handoff <descriptor-name> <url>
//! ```
//!
//! Exit codes: 0 success, 1 usage / name / descriptor / network stack errors,
//! 2 destination address error, 4 failed request.

use std::process::ExitCode;

mod app;
mod config;
mod host;
mod telemetry;

use app::AppError;
use config::Config;
use host::SystemHost;

fn main() -> ExitCode {
    let mut host = SystemHost::default();
    match app::run(std::env::args_os(), Config::from_env(), &mut host) {
        Ok(_) => ExitCode::SUCCESS,
        Err(AppError::Usage(e)) => {
            let _ = e.print();
            ExitCode::from(AppError::Usage(e).exit_code())
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
