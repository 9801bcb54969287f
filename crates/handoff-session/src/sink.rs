use std::io::{self, Write};

use tracing::warn;

/// Receives the response body, one chunk at a time.
pub trait BodySink {
    /// Consume `chunk`, returning how many bytes were taken.
    ///
    /// Anything short of `chunk.len()` aborts the transfer.
    fn accept(&mut self, chunk: &[u8]) -> usize;

    /// Called after the last chunk of a successful transfer.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Streams the body into any [`Write`]r.
#[derive(Debug)]
pub struct WriteSink<W> {
    inner: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> BodySink for WriteSink<W> {
    fn accept(&mut self, chunk: &[u8]) -> usize {
        let mut accepted = 0;
        while accepted < chunk.len() {
            match self.inner.write(&chunk[accepted..]) {
                Ok(0) => break,
                Ok(n) => accepted += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, accepted, offered = chunk.len(), "Body sink write failed");
                    break;
                }
            }
        }
        accepted
    }

    fn finish(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
