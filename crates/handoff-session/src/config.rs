//! Request configuration for a [`Session`](crate::Session).

use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::SessionError;

/// Default `User-Agent` sent with the request.
pub const DEFAULT_USER_AGENT: &str = concat!("handoff/", env!("CARGO_PKG_VERSION"));

/// Everything a session needs to know about its one request.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Target URL, taken verbatim; parsed when the request is performed.
    pub url: String,
    /// Address handed to the connector's `open`. Resolved from the URL when `None`.
    pub destination: Option<SocketAddr>,
    /// Emit a progress event per received chunk.
    pub progress: bool,
    /// Log request and response headers at `info` instead of `debug`.
    pub verbose: bool,
    /// Treat an HTTP status of 400 or above as a failed transfer.
    pub fail_on_error: bool,
    /// Upper bound on the whole exchange.
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl SessionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            destination: None,
            progress: false,
            verbose: false,
            fail_on_error: false,
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn destination(mut self, destination: SocketAddr) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn fail_on_error(mut self, fail: bool) -> Self {
        self.fail_on_error = fail;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Parse the target URL. Only plain `http` is carried over a handed-off socket.
    pub(crate) fn parse_url(&self) -> Result<Url, SessionError> {
        let url = Url::parse(&self.url)
            .map_err(|e| SessionError::MalformedUrl(format!("{}: {e}", self.url)))?;
        if url.scheme() != "http" {
            return Err(SessionError::UnsupportedScheme(url.scheme().to_string()));
        }
        if url.host_str().is_none() {
            return Err(SessionError::MalformedUrl(format!("{} has no host", self.url)));
        }
        Ok(url)
    }

    /// Where the session would dial: the configured destination, or the URL's host.
    pub(crate) fn resolve_destination(&self, url: &Url) -> Result<SocketAddr, SessionError> {
        if let Some(destination) = self.destination {
            return Ok(destination);
        }
        url.socket_addrs(|| None)
            .map_err(SessionError::Resolve)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                SessionError::Resolve(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no addresses for {url}"),
                ))
            })
    }
}
