//! Descriptor name validation.

use std::fmt;

use crate::ActivationError;

/// Names the activation protocol uses as sentinels rather than real names:
/// `unknown` for unnamed descriptors, `stored` for the fd store, and
/// `connection` for per-connection sockets.
pub const RESERVED_NAMES: [&str; 3] = ["unknown", "stored", "connection"];

/// Longest name the supervisor accepts for a descriptor.
const MAX_NAME_LEN: usize = 255;

/// A descriptor name that can be looked up in the inherited table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FdName(String);

impl FdName {
    /// Validate a user-supplied name.
    ///
    /// Reserved sentinels are reported separately from malformed names so a
    /// caller can tell "you asked for a protocol placeholder" apart from
    /// "this can never appear in `LISTEN_FD_NAMES`".
    pub fn new(name: impl Into<String>) -> Result<Self, ActivationError> {
        let name = name.into();

        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(ActivationError::ReservedName(name));
        }

        let reason = if name.is_empty() {
            Some("name is empty")
        } else if name.len() > MAX_NAME_LEN {
            Some("name is longer than 255 bytes")
        } else if name.contains(':') {
            Some("name contains ':'")
        } else if name.chars().any(char::is_control) {
            Some("name contains control characters")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ActivationError::InvalidName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FdName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FdName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
