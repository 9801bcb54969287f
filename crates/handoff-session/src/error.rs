use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unsupported protocol scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("failed to initialize network stack: {0}")]
    Init(#[source] std::io::Error),

    #[error("malformed URL: {0}")]
    MalformedUrl(String),

    #[error("could not resolve destination: {0}")]
    Resolve(#[source] std::io::Error),

    #[error("failed to connect: {0}")]
    Connect(#[source] std::io::Error),

    #[error("server returned HTTP status {0}")]
    HttpStatus(u16),

    #[error("body sink accepted {accepted} of {offered} bytes")]
    Write { accepted: usize, offered: usize },

    #[error("failed to flush body sink: {0}")]
    Flush(#[source] std::io::Error),

    #[error("transfer timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed sending request: {0}")]
    Send(#[source] hyper::Error),

    #[error("failed receiving response: {0}")]
    Recv(#[source] hyper::Error),
}

impl SessionError {
    /// Stable numeric result code reported to operators.
    ///
    /// Values follow the numbering long used by command-line HTTP clients,
    /// so `28` reads as a timeout and `7` as a connect failure.
    pub fn code(&self) -> u32 {
        match self {
            Self::UnsupportedScheme(_) => 1,
            Self::Init(_) => 2,
            Self::MalformedUrl(_) => 3,
            Self::Resolve(_) => 6,
            Self::Connect(_) => 7,
            Self::HttpStatus(_) => 22,
            Self::Write { .. } | Self::Flush(_) => 23,
            Self::Timeout(_) => 28,
            Self::Send(_) => 55,
            Self::Recv(_) => 56,
        }
    }
}
