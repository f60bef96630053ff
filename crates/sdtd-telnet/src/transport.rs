//! Transport seam for console connections
//!
//! The client dials through a [`Connector`] so the stream can be swapped
//! for an in-memory one.

use async_trait::async_trait;
use sdtd_core::{ConsoleError, Result};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

/// Opens duplex text streams to a console
#[async_trait]
pub trait Connector: Send + Sync {
    /// Stream type produced by this connector
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Dial `address`, giving up after `timeout`
    async fn connect(&self, address: &str, timeout: Duration) -> Result<Self::Stream>;
}

/// TCP connector used against real servers
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, address: &str, timeout: Duration) -> Result<TcpStream> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| {
                ConsoleError::Connect(format!("timed out after {:?} dialing {}", timeout, address))
            })?
            .map_err(|e| ConsoleError::Connect(format!("{}: {}", address, e)))?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY on {}: {}", address, e);
        }

        Ok(stream)
    }
}
