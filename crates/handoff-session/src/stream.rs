//! Async byte stream over a borrowed descriptor.

use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, BorrowedFd};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use socket2::SockRef;
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::warn;

/// Reads and writes a descriptor it does not own.
///
/// The descriptor is put in non-blocking mode while the stream exists and
/// switched back on drop if it was blocking before. Shutdown is a no-op:
/// half-closing would end the connection for its owner too.
///
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct FdStream<'fd> {
    inner: AsyncFd<BorrowedFd<'fd>>,
    was_blocking: bool,
}

impl<'fd> FdStream<'fd> {
    pub fn new(fd: BorrowedFd<'fd>) -> io::Result<Self> {
        let socket = SockRef::from(&fd);
        let was_blocking = !socket.nonblocking()?;
        if was_blocking {
            socket.set_nonblocking(true)?;
        }

        match AsyncFd::new(fd) {
            Ok(inner) => Ok(Self {
                inner,
                was_blocking,
            }),
            Err(e) => {
                if was_blocking {
                    let _ = socket.set_nonblocking(false);
                }
                Err(e)
            }
        }
    }
}

impl Drop for FdStream<'_> {
    fn drop(&mut self) {
        if !self.was_blocking {
            return;
        }
        let fd = self.inner.get_ref();
        if let Err(e) = SockRef::from(fd).set_nonblocking(false) {
            warn!(fd = fd.as_raw_fd(), error = %e, "Failed to restore blocking mode");
        }
    }
}

impl AsyncRead for FdStream<'_> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.inner.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| read(*inner.get_ref(), unfilled)) {
                Ok(Ok(n)) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for FdStream<'_> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = ready!(self.inner.poll_write_ready(cx))?;
            match guard.try_io(|inner| write(*inner.get_ref(), buf)) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn read(fd: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
    (&*SockRef::from(&fd)).read(buf)
}

fn write(fd: BorrowedFd<'_>, buf: &[u8]) -> io::Result<usize> {
    (&*SockRef::from(&fd)).write(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsFd;
    use std::os::unix::net::UnixStream;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn is_nonblocking(fd: BorrowedFd<'_>) -> bool {
        SockRef::from(&fd).nonblocking().unwrap()
    }

    #[tokio::test]
    async fn test_read_write_over_borrowed_fd() {
        let (a, mut b) = UnixStream::pair().unwrap();
        let mut stream = FdStream::new(a.as_fd()).unwrap();

        stream.write_all(b"ping").await.unwrap();
        let mut got = [0u8; 4];
        b.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"ping");

        b.write_all(b"pong").unwrap();
        let mut got = [0u8; 4];
        stream.read_exact(&mut got).await.unwrap();
        assert_eq!(&got, b"pong");
    }

    #[tokio::test]
    async fn test_blocking_mode_restored_on_drop() {
        let (a, _b) = UnixStream::pair().unwrap();
        assert!(!is_nonblocking(a.as_fd()));

        let stream = FdStream::new(a.as_fd()).unwrap();
        assert!(is_nonblocking(a.as_fd()));
        drop(stream);

        assert!(!is_nonblocking(a.as_fd()));
    }

    #[tokio::test]
    async fn test_nonblocking_fd_left_nonblocking() {
        let (a, _b) = UnixStream::pair().unwrap();
        a.set_nonblocking(true).unwrap();

        drop(FdStream::new(a.as_fd()).unwrap());
        assert!(is_nonblocking(a.as_fd()));
    }

    #[tokio::test]
    async fn test_shutdown_leaves_connection_usable() {
        let (a, mut b) = UnixStream::pair().unwrap();
        let mut stream = FdStream::new(a.as_fd()).unwrap();
        stream.shutdown().await.unwrap();
        drop(stream);

        (&a).write_all(b"still here").unwrap();
        let mut got = [0u8; 10];
        b.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"still here");
    }

    #[tokio::test]
    async fn test_write_to_closed_peer_is_an_error() {
        let (a, b) = UnixStream::pair().unwrap();
        drop(b);
        let mut stream = FdStream::new(a.as_fd()).unwrap();

        let err = stream.write_all(b"ping").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
