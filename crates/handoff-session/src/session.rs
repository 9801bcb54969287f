//! Session lifecycle: configure, perform once, clean up.

use std::future::Future;
use std::net::SocketAddr;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::header::{ACCEPT, CONTENT_LENGTH, HOST, USER_AGENT};
use hyper::{Method, Request, Version};
use hyper_util::rt::TokioIo;
use socket2::{SockAddr, SockRef};
use tracing::{debug, info, warn};
use url::{Position, Url};

use crate::{BodySink, Connector, FdStream, SessionConfig, SessionError, SocketSetup};

/// The I/O runtime sessions run on.
///
/// Built once per process, before any descriptor is touched.
pub struct NetworkStack {
    runtime: tokio::runtime::Runtime,
}

impl NetworkStack {
    pub fn init() -> Result<Self, SessionError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SessionError::Init)?;
        Ok(Self { runtime })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Outcome of a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferInfo {
    pub status: u16,
    pub version: Version,
    /// Body bytes handed to the sink.
    pub bytes: u64,
}

pub struct Session<C, S> {
    config: SessionConfig,
    connector: C,
    sink: S,
}

impl<C: Connector, S: BodySink> Session<C, S> {
    pub fn new(config: SessionConfig, connector: C, sink: S) -> Self {
        Self {
            config,
            connector,
            sink,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run the request to completion, blocking the calling thread.
    ///
    /// The connector's `close` runs exactly once if `open` succeeded,
    /// whatever the outcome of the exchange.
    pub fn perform(&mut self, stack: &NetworkStack) -> Result<TransferInfo, SessionError> {
        let url = self.config.parse_url()?;
        let destination = self.config.resolve_destination(&url)?;

        let socket = self
            .connector
            .open(destination)
            .map_err(SessionError::Connect)?;
        let result = self.run(stack, &url, destination, &socket);

        if let Err(e) = self.connector.close(socket) {
            warn!(error = %e, "Connector failed to close socket");
        }
        result
    }

    /// Tear the session down, handing back the sink.
    pub fn cleanup(self) -> S {
        debug!(url = %self.config.url, "Session cleaned up");
        self.sink
    }

    fn run(
        &mut self,
        stack: &NetworkStack,
        url: &Url,
        destination: SocketAddr,
        socket: &C::Socket,
    ) -> Result<TransferInfo, SessionError> {
        let fd = socket.as_fd();
        match self.connector.configure(fd).map_err(SessionError::Connect)? {
            SocketSetup::Connect => {
                debug!(fd = fd.as_raw_fd(), %destination, "Connecting");
                SockRef::from(socket)
                    .connect(&SockAddr::from(destination))
                    .map_err(SessionError::Connect)?;
            }
            SocketSetup::AlreadyConnected => {
                debug!(fd = fd.as_raw_fd(), "Socket already connected, skipping connect");
            }
        }

        let request = build_request(url, &self.config)?;
        let config = &self.config;
        let sink = &mut self.sink;

        let info = stack.block_on(async move {
            match config.timeout {
                Some(limit) => tokio::time::timeout(limit, exchange(fd, request, sink, config))
                    .await
                    .map_err(|_| SessionError::Timeout(limit))?,
                None => exchange(fd, request, sink, config).await,
            }
        })?;

        self.sink.finish().map_err(SessionError::Flush)?;
        Ok(info)
    }
}

fn build_request(url: &Url, config: &SessionConfig) -> Result<Request<Empty<Bytes>>, SessionError> {
    let host = url
        .host_str()
        .ok_or_else(|| SessionError::MalformedUrl(format!("{url} has no host")))?;
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let target = &url[Position::BeforePath..Position::AfterQuery];

    Request::builder()
        .method(Method::GET)
        .uri(target)
        .header(HOST, authority)
        .header(USER_AGENT, config.user_agent.as_str())
        .header(ACCEPT, "*/*")
        .body(Empty::new())
        .map_err(|e| SessionError::MalformedUrl(e.to_string()))
}

/// One HTTP/1.1 request/response over `fd`, streaming the body into `sink`.
async fn exchange<S: BodySink>(
    fd: BorrowedFd<'_>,
    request: Request<Empty<Bytes>>,
    sink: &mut S,
    config: &SessionConfig,
) -> Result<TransferInfo, SessionError> {
    let stream = FdStream::new(fd).map_err(SessionError::Connect)?;
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(SessionError::Send)?;

    if config.verbose {
        info!(method = %request.method(), target = %request.uri(), headers = ?request.headers(), "Sending request");
    } else {
        debug!(method = %request.method(), target = %request.uri(), "Sending request");
    }

    let response_side = async move {
        let response = sender
            .send_request(request)
            .await
            .map_err(SessionError::Send)?;
        // No further requests; the connection winds down once the body is read.
        drop(sender);

        let status = response.status();
        let version = response.version();
        if config.verbose {
            info!(status = status.as_u16(), ?version, headers = ?response.headers(), "Received response");
        } else {
            debug!(status = status.as_u16(), ?version, "Received response");
        }

        if config.fail_on_error && status.as_u16() >= 400 {
            return Err(SessionError::HttpStatus(status.as_u16()));
        }

        let total: Option<u64> = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let mut body = response.into_body();
        let mut delivered: u64 = 0;
        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(SessionError::Recv)?;
            let Some(chunk) = frame.data_ref() else {
                continue;
            };
            let accepted = sink.accept(chunk);
            if accepted != chunk.len() {
                return Err(SessionError::Write {
                    accepted,
                    offered: chunk.len(),
                });
            }
            delivered += chunk.len() as u64;
            if config.progress {
                info!(received = delivered, total, "Transfer progress");
            }
        }

        Ok::<_, SessionError>(TransferInfo {
            status: status.as_u16(),
            version,
            bytes: delivered,
        })
    };

    let (result, conn_result) = tokio::join!(response_side, conn);
    if let Err(e) = conn_result {
        debug!(error = %e, "Connection ended with error");
    }
    result
}
