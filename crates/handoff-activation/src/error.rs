use std::os::unix::io::RawFd;

#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("special file descriptor name given: '{0}'")]
    ReservedName(String),

    #[error("invalid file descriptor name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("malformed socket activation environment: {0}")]
    InvalidEnvironment(String),

    #[error("no inherited file descriptor named '{name}' (available: {available:?})")]
    NotFound { name: String, available: Vec<String> },

    #[error("{count} inherited file descriptors are named '{name}', expected exactly one")]
    Ambiguous { name: String, count: usize },

    #[error("inherited fd {fd} ('{name}') is not open: {source}")]
    InvalidDescriptor {
        fd: RawFd,
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("inherited fd {fd} ('{name}') is not a socket")]
    NotASocket { fd: RawFd, name: String },
}

impl ActivationError {
    /// True for errors raised while matching the requested name against the
    /// inherited table, as opposed to errors in the name itself.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Ambiguous { .. })
    }
}
