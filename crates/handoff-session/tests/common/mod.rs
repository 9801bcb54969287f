//! Test utilities for session tests.
//!
//! Provides a thread-based fake HTTP server that answers exactly one request
//! on a stream it is given, and a connector wrapper that counts calls.

#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::os::unix::io::BorrowedFd;
use std::thread::{self, JoinHandle};

use handoff_session::{Connector, SocketSetup};

/// Plain 200 response with a five-byte body.
pub const HELLO_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nContent-Type: text/plain\r\n\r\nhello";

/// Read an HTTP request head, one byte at a time so nothing past the
/// blank line is consumed.
pub fn read_request_head<S: Read>(stream: &mut S) -> io::Result<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte)? == 0 {
            break;
        }
        head.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

/// Answer one request on `stream` with `response`, handing back the request
/// head and the still-open stream.
pub fn spawn_server<S>(mut stream: S, response: &'static [u8]) -> JoinHandle<(String, S)>
where
    S: Read + Write + Send + 'static,
{
    thread::spawn(move || {
        let head = read_request_head(&mut stream).expect("read request");
        stream.write_all(response).expect("write response");
        stream.flush().expect("flush response");
        (head, stream)
    })
}

/// Read the request, then stay silent until the client goes away.
pub fn spawn_silent_server<S>(mut stream: S) -> JoinHandle<String>
where
    S: Read + Write + Send + 'static,
{
    thread::spawn(move || {
        let head = read_request_head(&mut stream).expect("read request");
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest);
        head
    })
}

/// Wraps a connector and counts how often each hook runs.
pub struct CountingConnector<C> {
    pub inner: C,
    pub opened: usize,
    pub configured: usize,
    pub closed: usize,
}

impl<C> CountingConnector<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            opened: 0,
            configured: 0,
            closed: 0,
        }
    }
}

impl<C: Connector> Connector for CountingConnector<C> {
    type Socket = C::Socket;

    fn open(&mut self, address: SocketAddr) -> io::Result<C::Socket> {
        self.opened += 1;
        self.inner.open(address)
    }

    fn configure(&mut self, socket: BorrowedFd<'_>) -> io::Result<SocketSetup> {
        self.configured += 1;
        self.inner.configure(socket)
    }

    fn close(&mut self, socket: C::Socket) -> io::Result<()> {
        self.closed += 1;
        self.inner.close(socket)
    }
}

/// True if `fd` is still an open descriptor.
pub fn fd_is_open(fd: BorrowedFd<'_>) -> bool {
    use std::os::unix::io::AsRawFd;
    unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFD) >= 0 }
}
