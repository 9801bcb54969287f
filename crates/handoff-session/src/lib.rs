//! # handoff-session
//!
//! A one-shot HTTP/1.1 client session whose connection can come from
//! somewhere else.
//!
//! ## Overview
//!
//! A [`Session`] performs exactly one blocking request. How it gets a socket
//! is decided by its [`Connector`]:
//! - [`DirectConnector`] opens a fresh TCP socket and lets the session dial it
//! - [`BorrowedConnector`] hands over a descriptor the caller already has,
//!   reports it as connected, and never closes it
//!
//! The response body is streamed into a [`BodySink`]. A sink that accepts
//! fewer bytes than offered aborts the transfer.
//!
//! ```ignore
//! use handoff_session::{BorrowedConnector, NetworkStack, Session, SessionConfig, WriteSink};
//!
//! let stack = NetworkStack::init()?;
//! let config = SessionConfig::new("http://localhost/status");
//! let mut session = Session::new(config, BorrowedConnector::new(fd.as_fd()), WriteSink::new(std::io::stdout()));
//! let info = session.perform(&stack)?;
//! session.cleanup();
//! drop(fd); // the caller, not the session, releases the descriptor
//! ```
//!
//! ## Platform
//!
//! This crate requires Unix (Linux / macOS). It will not compile on other platforms.

#[cfg(not(unix))]
compile_error!("handoff-session requires a Unix platform (Linux or macOS)");

mod config;
mod connector;
mod error;
mod session;
mod sink;
mod stream;

pub use config::SessionConfig;
pub use connector::{BorrowedConnector, Connector, DirectConnector, SocketSetup};
pub use error::SessionError;
pub use hyper::Version;
pub use session::{NetworkStack, Session, TransferInfo};
pub use sink::{BodySink, WriteSink};
pub use stream::FdStream;
