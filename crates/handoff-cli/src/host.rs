// SPDX-License-Identifier: MIT
// Copyright (C) 2026 Handoff Contributors

//! The real process: inherited descriptors, a tokio reactor, stdout.

use std::io;
use std::os::unix::io::{AsFd, AsRawFd, OwnedFd};

use handoff_activation::{ActivationError, DescriptorTable, FdName};
use handoff_session::{
    BorrowedConnector, NetworkStack, Session, SessionConfig, SessionError, TransferInfo,
    WriteSink,
};
use tracing::debug;

use crate::app::Host;
use crate::telemetry;

#[derive(Default)]
pub struct SystemHost {
    stack: Option<NetworkStack>,
}

impl Host for SystemHost {
    type Handle = OwnedFd;

    fn init_logging(&mut self, verbose: bool) {
        if let Err(e) = telemetry::init(verbose) {
            eprintln!("warning: logging unavailable: {e:#}");
        }
    }

    fn start_network(&mut self) -> Result<(), SessionError> {
        self.stack = Some(NetworkStack::init()?);
        Ok(())
    }

    fn resolve(&mut self, name: &FdName) -> Result<OwnedFd, ActivationError> {
        let mut table = DescriptorTable::from_env()?;
        table.resolve(name)?.adopt(name)
    }

    fn transfer(
        &mut self,
        handle: &OwnedFd,
        config: SessionConfig,
    ) -> Result<TransferInfo, SessionError> {
        let stack = self
            .stack
            .as_ref()
            .ok_or_else(|| SessionError::Init(io::Error::other("network stack not started")))?;

        let stdout = io::stdout();
        let mut session = Session::new(
            config,
            BorrowedConnector::new(handle.as_fd()),
            WriteSink::new(stdout.lock()),
        );
        let result = session.perform(stack);
        session.cleanup();
        result
    }

    fn release(&mut self, handle: OwnedFd) {
        let fd = handle.as_raw_fd();
        drop(handle);
        debug!(fd, "Closed inherited descriptor");
    }
}
