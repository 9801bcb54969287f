//! Inherited descriptor table.
//!
//! Reads `LISTEN_PID`, `LISTEN_FDS` and `LISTEN_FD_NAMES` (systemd socket
//! activation / `OpenFile=`). The environment is only read: the table is a
//! point-in-time view of what the supervisor passed at process start.

use std::os::unix::io::{FromRawFd, OwnedFd, RawFd};

use tracing::{debug, info};

use crate::{ActivationError, FdName};

/// First inherited descriptor number; stdin/stdout/stderr come before it.
pub const LISTEN_FDS_START: RawFd = 3;

/// Name the supervisor gives descriptors when `LISTEN_FD_NAMES` is absent.
const UNNAMED: &str = "unknown";

/// Raw socket activation variables, as found in the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationVars {
    pub listen_pid: Option<String>,
    pub listen_fds: Option<String>,
    pub listen_fd_names: Option<String>,
}

impl ActivationVars {
    /// Snapshot the variables from the process environment.
    pub fn from_env() -> Self {
        Self {
            listen_pid: std::env::var("LISTEN_PID").ok(),
            listen_fds: std::env::var("LISTEN_FDS").ok(),
            listen_fd_names: std::env::var("LISTEN_FD_NAMES").ok(),
        }
    }

    /// Build the descriptor table these variables describe for process `own_pid`.
    ///
    /// The descriptors belong to this process only when `LISTEN_PID` names
    /// it: an absent `LISTEN_PID` or `LISTEN_FDS`, or a `LISTEN_PID` naming
    /// another process, yields an empty table. Numbers that do not parse and
    /// name lists of the wrong length are errors.
    pub fn parse(&self, own_pid: u32) -> Result<DescriptorTable<InheritedFd>, ActivationError> {
        let Some(pid) = self.listen_pid.as_deref() else {
            if self.listen_fds.is_some() {
                debug!("LISTEN_FDS set without LISTEN_PID, ignoring");
            }
            return Ok(DescriptorTable::default());
        };
        let pid: u32 = pid.trim().parse().map_err(|_| {
            ActivationError::InvalidEnvironment(format!("LISTEN_PID is not a pid: {pid:?}"))
        })?;
        if pid != own_pid {
            debug!(listen_pid = pid, own_pid, "LISTEN_PID names another process, ignoring");
            return Ok(DescriptorTable::default());
        }

        let Some(count) = self.listen_fds.as_deref() else {
            return Ok(DescriptorTable::default());
        };
        let count: usize = count.trim().parse().map_err(|_| {
            ActivationError::InvalidEnvironment(format!("LISTEN_FDS is not a count: {count:?}"))
        })?;
        if RawFd::try_from(count).map_or(true, |n| n > RawFd::MAX - LISTEN_FDS_START) {
            return Err(ActivationError::InvalidEnvironment(format!(
                "LISTEN_FDS is out of range: {count}"
            )));
        }

        let names: Vec<String> = match self.listen_fd_names.as_deref() {
            Some(raw) if count > 0 => raw.split(':').map(str::to_owned).collect(),
            Some(_) => Vec::new(),
            None => vec![UNNAMED.to_owned(); count],
        };
        if names.len() != count {
            return Err(ActivationError::InvalidEnvironment(format!(
                "LISTEN_FD_NAMES has {} entries but LISTEN_FDS says {}",
                names.len(),
                count
            )));
        }

        let entries = names
            .into_iter()
            .zip(LISTEN_FDS_START..)
            .map(|(name, fd)| (name, InheritedFd { fd }))
            .collect();
        Ok(DescriptorTable { entries })
    }
}

/// A descriptor number inherited from the supervisor.
///
/// Holding one does not own the descriptor: dropping it closes nothing.
/// [`InheritedFd::adopt`] is the only way to take ownership.
#[derive(Debug, PartialEq, Eq)]
pub struct InheritedFd {
    fd: RawFd,
}

impl InheritedFd {
    pub fn raw(&self) -> RawFd {
        self.fd
    }

    /// Take ownership of the descriptor.
    ///
    /// The descriptor must be open and must be a socket. It is marked
    /// close-on-exec so it does not leak into child processes.
    pub fn adopt(self, name: &FdName) -> Result<OwnedFd, ActivationError> {
        let fd = self.fd;
        match fd_is_socket(fd) {
            Ok(true) => {}
            Ok(false) => {
                return Err(ActivationError::NotASocket {
                    fd,
                    name: name.to_string(),
                })
            }
            Err(source) => {
                return Err(ActivationError::InvalidDescriptor {
                    fd,
                    name: name.to_string(),
                    source,
                })
            }
        }

        set_cloexec(fd).map_err(|source| ActivationError::InvalidDescriptor {
            fd,
            name: name.to_string(),
            source,
        })?;

        match socket_family(fd) {
            Some(libc::AF_UNIX) => info!(fd, name = %name, family = "unix", "Adopted inherited socket"),
            Some(libc::AF_INET) => info!(fd, name = %name, family = "inet", "Adopted inherited socket"),
            Some(libc::AF_INET6) => info!(fd, name = %name, family = "inet6", "Adopted inherited socket"),
            family => debug!(fd, name = %name, ?family, "Adopted inherited socket of unexpected family"),
        }

        // SAFETY: fstat confirmed the fd is an open socket, and the table hands
        // out each InheritedFd at most once, so nothing else owns it.
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }
}

/// Named descriptors inherited at process start.
///
/// Generic over the handle type so the selection policy does not depend on
/// real descriptors.
#[derive(Debug)]
pub struct DescriptorTable<H = InheritedFd> {
    entries: Vec<(String, H)>,
}

impl<H> Default for DescriptorTable<H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl DescriptorTable<InheritedFd> {
    /// Read the table the supervisor passed to this process.
    pub fn from_env() -> Result<Self, ActivationError> {
        let table = ActivationVars::from_env().parse(std::process::id())?;
        debug!(count = table.len(), names = ?table.names().collect::<Vec<_>>(), "Read inherited descriptor table");
        Ok(table)
    }
}

impl<H> DescriptorTable<H> {
    pub fn new(entries: Vec<(String, H)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Select the one handle named `name`, removing it from the table.
    ///
    /// Exactly one entry must match: no match is [`ActivationError::NotFound`]
    /// and several matches are [`ActivationError::Ambiguous`].
    pub fn resolve(&mut self, name: &FdName) -> Result<H, ActivationError> {
        let mut matches = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, (n, _))| n == name.as_str())
            .map(|(i, _)| i);

        match (matches.next(), matches.count()) {
            (Some(pos), 0) => Ok(self.entries.remove(pos).1),
            (Some(_), rest) => Err(ActivationError::Ambiguous {
                name: name.to_string(),
                count: rest + 1,
            }),
            (None, _) => Err(ActivationError::NotFound {
                name: name.to_string(),
                available: self.names().map(str::to_owned).collect(),
            }),
        }
    }
}

/// Check via fstat that `fd` is open and refers to a socket.
fn fd_is_socket(fd: RawFd) -> std::io::Result<bool> {
    let mut stat: libc::stat = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::fstat(fd, &mut stat) };
    if result != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok((stat.st_mode & libc::S_IFMT) == libc::S_IFSOCK)
}

fn set_cloexec(fd: RawFd) -> std::io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    if flags & libc::FD_CLOEXEC != 0 {
        return Ok(());
    }
    let result = unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) };
    if result < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Address family of a socket, if the kernel reports one.
fn socket_family(fd: RawFd) -> Option<libc::c_int> {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    let result = unsafe {
        libc::getsockname(
            fd,
            (&mut storage as *mut libc::sockaddr_storage).cast(),
            &mut len,
        )
    };
    (result == 0).then_some(libc::c_int::from(storage.ss_family))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::{AsRawFd, IntoRawFd};
    use std::os::unix::net::UnixStream;

    fn vars(pid: Option<&str>, fds: Option<&str>, names: Option<&str>) -> ActivationVars {
        ActivationVars {
            listen_pid: pid.map(str::to_owned),
            listen_fds: fds.map(str::to_owned),
            listen_fd_names: names.map(str::to_owned),
        }
    }

    fn name(s: &str) -> FdName {
        FdName::new(s).unwrap()
    }

    /// No LISTEN_FDS → empty table.
    #[test]
    fn test_absent_env_is_empty() {
        let table = vars(None, None, None).parse(42).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_named_fds_numbered_from_three() {
        let mut table = vars(Some("42"), Some("2"), Some("web:svc"))
            .parse(42)
            .unwrap();
        assert_eq!(table.names().collect::<Vec<_>>(), ["web", "svc"]);
        assert_eq!(table.resolve(&name("svc")).unwrap().raw(), 4);
        assert_eq!(table.resolve(&name("web")).unwrap().raw(), 3);
    }

    /// Stray LISTEN_FDS inherited without LISTEN_PID are not ours.
    #[test]
    fn test_missing_pid_is_ignored() {
        let table = vars(None, Some("1"), Some("svc")).parse(42).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_foreign_pid_is_ignored() {
        let table = vars(Some("7"), Some("1"), Some("svc")).parse(42).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_missing_names_default_to_unknown() {
        let table = vars(Some("42"), Some("2"), None).parse(42).unwrap();
        assert_eq!(table.names().collect::<Vec<_>>(), ["unknown", "unknown"]);
    }

    #[test]
    fn test_zero_fds_with_empty_names() {
        let table = vars(Some("42"), Some("0"), Some("")).parse(42).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_malformed_env_rejected() {
        for bad in [
            vars(Some("abc"), Some("1"), Some("svc")),
            vars(Some("42"), Some("-1"), None),
            vars(Some("42"), Some("two"), None),
            vars(Some("42"), Some("2"), Some("only-one")),
            vars(Some("42"), Some("1"), Some("a:b")),
        ] {
            assert!(
                matches!(bad.parse(42), Err(ActivationError::InvalidEnvironment(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolve_exactly_one() {
        let mut table = DescriptorTable::new(vec![("svc".to_string(), 7)]);
        assert_eq!(table.resolve(&name("svc")).unwrap(), 7);
        assert!(table.is_empty());
    }

    #[test]
    fn test_resolve_missing_lists_available() {
        let mut table = DescriptorTable::new(vec![("svc".to_string(), 7)]);
        match table.resolve(&name("other")) {
            Err(ActivationError::NotFound { name, available }) => {
                assert_eq!(name, "other");
                assert_eq!(available, ["svc"]);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        // A failed lookup leaves the table alone.
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_resolve_in_empty_table() {
        let mut table: DescriptorTable<i32> = DescriptorTable::default();
        let err = table.resolve(&name("svc")).unwrap_err();
        assert!(matches!(err, ActivationError::NotFound { .. }));
        assert!(err.is_resolution());
    }

    #[test]
    fn test_resolve_duplicate_is_ambiguous() {
        let mut table = DescriptorTable::new(vec![
            ("svc".to_string(), 7),
            ("web".to_string(), 8),
            ("svc".to_string(), 9),
        ]);
        match table.resolve(&name("svc")) {
            Err(ActivationError::Ambiguous { name, count }) => {
                assert_eq!(name, "svc");
                assert_eq!(count, 2);
            }
            other => panic!("expected Ambiguous, got {other:?}"),
        }
        assert_eq!(table.len(), 3);
    }

    /// Adopting a real socket marks it close-on-exec.
    #[test]
    fn test_adopt_socket_sets_cloexec() {
        let (a, _b) = UnixStream::pair().unwrap();
        let fd = unsafe { libc::fcntl(a.as_raw_fd(), libc::F_DUPFD, 100) };
        assert!(fd >= 100, "dup failed");

        let owned = InheritedFd { fd }.adopt(&name("svc")).unwrap();
        let flags = unsafe { libc::fcntl(owned.as_raw_fd(), libc::F_GETFD) };
        assert_ne!(flags & libc::FD_CLOEXEC, 0);
        assert_eq!(socket_family(owned.as_raw_fd()), Some(libc::AF_UNIX));
    }

    #[test]
    fn test_adopt_rejects_non_socket() {
        let file = std::fs::File::open("/dev/null").unwrap();
        let fd = file.into_raw_fd();
        let err = InheritedFd { fd }.adopt(&name("svc")).unwrap_err();
        assert!(matches!(err, ActivationError::NotASocket { .. }));
        unsafe { libc::close(fd) };
    }

    #[test]
    fn test_invalid_fd_detection() {
        assert!(fd_is_socket(-1).is_err());
        assert!(matches!(
            InheritedFd { fd: -1 }.adopt(&name("svc")),
            Err(ActivationError::InvalidDescriptor { .. })
        ));
    }
}
