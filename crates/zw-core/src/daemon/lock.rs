//! Singleton lock on an auxiliary loopback port.
//!
//! Holding a bound listener for the life of the process keeps a second
//! watcher from starting with the same lock port. The OS releases the port
//! when the process exits, so there is no stale-lock cleanup.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};

use thiserror::Error;

/// Failure to acquire the lock port.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("lock port {port} is held by another watcher")]
    Held { port: u16 },

    #[error("failed to bind lock port {port}: {source}")]
    Bind { port: u16, source: io::Error },
}

impl From<LockError> for zw_common::Error {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Held { port } => zw_common::Error::LockHeld { port },
            LockError::Bind { source, .. } => zw_common::Error::Io(source),
        }
    }
}

/// A held lock. Dropping it releases the port.
#[derive(Debug)]
pub struct InstanceLock {
    listener: TcpListener,
    port: u16,
}

impl InstanceLock {
    /// Bind `127.0.0.1:<port>`. Port 0 binds an ephemeral port.
    pub fn acquire(port: u16) -> Result<Self, LockError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        match TcpListener::bind(addr) {
            Ok(listener) => {
                let bound = listener.local_addr().map(|a| a.port()).unwrap_or(port);
                Ok(Self {
                    listener,
                    port: bound,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => Err(LockError::Held { port }),
            Err(source) => Err(LockError::Bind { port, source }),
        }
    }

    /// Port actually bound.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
