//! Socket open/close extension points.
//!
//! A [`Connector`] decides where the session's socket comes from, whether
//! the session still has to connect it, and what happens to it afterwards.

use std::io;
use std::net::SocketAddr;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

/// Result of the post-setup hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketSetup {
    /// The session must connect the socket to the destination itself.
    Connect,
    /// The socket is an established connection; skip the connect step.
    AlreadyConnected,
}

pub trait Connector {
    type Socket: AsFd;

    /// Produce the socket for a connection to `address`.
    fn open(&mut self, address: SocketAddr) -> io::Result<Self::Socket>;

    /// Called once the socket exists, before any connect.
    fn configure(&mut self, _socket: BorrowedFd<'_>) -> io::Result<SocketSetup> {
        Ok(SocketSetup::Connect)
    }

    /// Called exactly once when the session is done with the socket.
    fn close(&mut self, socket: Self::Socket) -> io::Result<()> {
        drop(socket);
        Ok(())
    }
}

impl<C: Connector + ?Sized> Connector for &mut C {
    type Socket = C::Socket;

    fn open(&mut self, address: SocketAddr) -> io::Result<C::Socket> {
        (**self).open(address)
    }

    fn configure(&mut self, socket: BorrowedFd<'_>) -> io::Result<SocketSetup> {
        (**self).configure(socket)
    }

    fn close(&mut self, socket: C::Socket) -> io::Result<()> {
        (**self).close(socket)
    }
}

/// Opens a new TCP socket per request and lets the session dial it.
///
/// This is the session's behavior when no descriptor is substituted, and the
/// only stock connector that reports [`SocketSetup::Connect`]. The `handoff`
/// binary always uses [`BorrowedConnector`] instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectConnector;

impl Connector for DirectConnector {
    type Socket = Socket;

    fn open(&mut self, address: SocketAddr) -> io::Result<Socket> {
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))?;
        debug!(fd = socket.as_raw_fd(), %address, "Opened socket");
        Ok(socket)
    }
}

/// Substitutes a descriptor opened elsewhere for the one the session would open.
///
/// The session only ever sees a [`BorrowedFd`], so it cannot close the
/// descriptor or keep it past the borrow; whoever owns the descriptor
/// releases it after the session is gone.
#[derive(Debug, Clone, Copy)]
pub struct BorrowedConnector<'fd> {
    fd: BorrowedFd<'fd>,
}

impl<'fd> BorrowedConnector<'fd> {
    pub fn new(fd: BorrowedFd<'fd>) -> Self {
        Self { fd }
    }
}

impl<'fd> Connector for BorrowedConnector<'fd> {
    type Socket = BorrowedFd<'fd>;

    fn open(&mut self, address: SocketAddr) -> io::Result<BorrowedFd<'fd>> {
        debug!(fd = self.fd.as_raw_fd(), nominal = %address, "Using borrowed descriptor instead of opening a socket");
        Ok(self.fd)
    }

    fn configure(&mut self, _socket: BorrowedFd<'_>) -> io::Result<SocketSetup> {
        Ok(SocketSetup::AlreadyConnected)
    }

    fn close(&mut self, socket: BorrowedFd<'fd>) -> io::Result<()> {
        debug!(fd = socket.as_raw_fd(), "Leaving borrowed descriptor open");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream;

    fn nominal() -> SocketAddr {
        "127.0.0.1:80".parse().unwrap()
    }

    #[test]
    fn test_borrowed_open_ignores_address() {
        let (a, _b) = UnixStream::pair().unwrap();
        let mut connector = BorrowedConnector::new(a.as_fd());

        let socket = connector.open(nominal()).unwrap();
        assert_eq!(socket.as_raw_fd(), a.as_raw_fd());
        let other: SocketAddr = "[::1]:8080".parse().unwrap();
        assert_eq!(connector.open(other).unwrap().as_raw_fd(), a.as_raw_fd());
    }

    #[test]
    fn test_borrowed_reports_already_connected() {
        let (a, _b) = UnixStream::pair().unwrap();
        let mut connector = BorrowedConnector::new(a.as_fd());
        assert_eq!(
            connector.configure(a.as_fd()).unwrap(),
            SocketSetup::AlreadyConnected
        );
    }

    #[test]
    fn test_borrowed_close_keeps_descriptor_open() {
        let (a, _b) = UnixStream::pair().unwrap();
        let mut connector = BorrowedConnector::new(a.as_fd());
        let socket = connector.open(nominal()).unwrap();
        connector.close(socket).unwrap();

        let flags = unsafe { libc::fcntl(a.as_raw_fd(), libc::F_GETFD) };
        assert!(flags >= 0, "descriptor was closed");
    }

    #[test]
    fn test_direct_opens_fresh_socket_and_asks_to_connect() {
        let mut connector = DirectConnector;
        let socket = connector.open(nominal()).unwrap();
        assert!(socket.as_raw_fd() >= 0);
        assert_eq!(
            connector.configure(socket.as_fd()).unwrap(),
            SocketSetup::Connect
        );
        connector.close(socket).unwrap();
    }
}
