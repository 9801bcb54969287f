//! # handoff-activation
//!
//! Named file descriptors handed to a process by its service supervisor at
//! start (systemd socket activation, `OpenFile=` and compatible fd passing).
//!
//! ## Overview
//!
//! The supervisor opens the sockets and the process only borrows them:
//! 1. The descriptor table is read from the environment, never written
//! 2. A descriptor is selected by exact name; exactly one entry must match
//! 3. Only the selected descriptor is adopted; the rest stay untouched
//!
//! ## Environment Variables
//!
//! - `LISTEN_PID`: Pid the descriptors are meant for (no descriptors if absent or another pid)
//! - `LISTEN_FDS`: Number of inherited file descriptors (starting at fd 3)
//! - `LISTEN_FD_NAMES`: Colon-separated names for each inherited fd
//!
//! ## Platform
//!
//! This crate requires Unix (Linux / macOS). It will not compile on other platforms.

#[cfg(not(unix))]
compile_error!("handoff-activation requires a Unix platform (Linux or macOS)");

mod error;
mod name;
mod table;

pub use error::ActivationError;
pub use name::{FdName, RESERVED_NAMES};
pub use table::{ActivationVars, DescriptorTable, InheritedFd, LISTEN_FDS_START};
