// SPDX-License-Identifier: MIT
// Copyright (C) 2026 Handoff Contributors

//! The single request flow, from arguments to exit code.
//!
//! Everything that touches the process (inherited descriptors, the network
//! stack, stdout) sits behind [`Host`], so every exit path can be driven
//! without a service supervisor.

use std::ffi::OsString;
use std::net::{AddrParseError, Ipv4Addr, SocketAddr};

use clap::Parser;
use handoff_activation::{ActivationError, FdName};
use handoff_session::{SessionConfig, SessionError, TransferInfo};
use tracing::{debug, info, warn};

use crate::config::Config;

/// Address recorded as the destination. Never dialed: the inherited socket
/// is already connected.
pub const NOMINAL_HOST: &str = "127.0.0.1";
pub const NOMINAL_PORT: u16 = 80;

const DEPLOYMENT_HINT: &str = "this program expects to be run from a systemd service \
    where a unix socket is passed in via the directive OpenFile=/path/to/socket:fdname";

/// Handoff - one HTTP request over a socket inherited from the service supervisor
#[derive(Parser, Debug)]
#[command(name = "handoff")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Name of the inherited descriptor (the `fdname` in `OpenFile=/path:fdname`)
    pub fd_name: String,

    /// URL to request; scheme, host and path are sent as given
    pub url: String,

    /// Treat HTTP status 400 and above as a failed request
    #[arg(short, long)]
    pub fail: bool,

    /// Abort the request after this many seconds (0: no limit)
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Log request and response headers to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Log transfer progress to stderr
    #[arg(long)]
    pub progress: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Usage(clap::Error),

    #[error(transparent)]
    Name(ActivationError),

    #[error(transparent)]
    NetworkInit(SessionError),

    #[error("{0}\n{hint}", hint = DEPLOYMENT_HINT)]
    Resolution(ActivationError),

    #[error("invalid destination address: {0}")]
    Destination(AddrParseError),

    #[error("request failed with result {code}: {0}", code = .0.code())]
    Request(SessionError),
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) | Self::Name(_) | Self::NetworkInit(_) | Self::Resolution(_) => 1,
            Self::Destination(_) => 2,
            Self::Request(_) => 4,
        }
    }
}

/// The process-facing side of the flow.
pub trait Host {
    /// Owned handle to the inherited socket; releasing it closes the socket.
    type Handle;

    fn init_logging(&mut self, _verbose: bool) {}

    fn start_network(&mut self) -> Result<(), SessionError>;

    /// Find and take ownership of the descriptor named `name`.
    fn resolve(&mut self, name: &FdName) -> Result<Self::Handle, ActivationError>;

    fn destination(&self) -> Result<SocketAddr, AddrParseError> {
        nominal_destination()
    }

    /// Run one session over `handle`. The session must be torn down before
    /// this returns.
    fn transfer(
        &mut self,
        handle: &Self::Handle,
        config: SessionConfig,
    ) -> Result<TransferInfo, SessionError>;

    /// Close the handle. Called exactly once per resolved handle.
    fn release(&mut self, handle: Self::Handle);
}

pub fn nominal_destination() -> Result<SocketAddr, AddrParseError> {
    let ip: Ipv4Addr = NOMINAL_HOST.parse()?;
    Ok(SocketAddr::from((ip, NOMINAL_PORT)))
}

/// Run the whole flow. Once a handle is resolved it is released on every path.
pub fn run<I, T, H>(args: I, env: Config, host: &mut H) -> Result<TransferInfo, AppError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    H: Host,
{
    let cli = Cli::try_parse_from(args).map_err(AppError::Usage)?;
    let name = FdName::new(cli.fd_name.as_str()).map_err(AppError::Name)?;
    let config = env.with_cli(&cli);

    host.init_logging(config.verbose);
    for (key, value) in &config.ignored {
        warn!(key = *key, value = %value, "Ignoring unparseable setting");
    }
    host.start_network().map_err(AppError::NetworkInit)?;

    let handle = host.resolve(&name).map_err(AppError::Resolution)?;
    debug!(name = %name, "Resolved inherited descriptor");

    let destination = match host.destination() {
        Ok(destination) => destination,
        Err(e) => {
            host.release(handle);
            return Err(AppError::Destination(e));
        }
    };

    let result = host.transfer(&handle, config.session_config(&cli.url, destination));
    host.release(handle);

    let info = result.map_err(AppError::Request)?;
    info!(status = info.status, bytes = info.bytes, "Request complete");
    Ok(info)
}
