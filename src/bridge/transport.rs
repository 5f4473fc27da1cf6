//! Byte-stream transport to the model service
//!
//! Every attempt opens its own TCP connection, writes one JSON document and
//! reads until the accumulated bytes parse as one JSON document. There is no
//! length prefix: a parse failure while bytes keep arriving means "not done
//! yet", a parse failure after the peer closed means the reply was truncated.
//! Trailing bytes after a complete document are indistinguishable from an
//! unfinished one and keep the reader waiting.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use serde::de::IgnoredAny;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, instrument};

use super::error::{BridgeError, BridgeResult};
use crate::config::ModelServiceConfig;

/// Size of each read from the socket
const READ_CHUNK: usize = 64 * 1024;

/// A request/response exchange with the model service
///
/// Implementations own the whole connection lifecycle of one exchange and
/// must never reuse a connection across calls.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Backend address for logging
    fn addr(&self) -> String;

    /// Send one serialized request and return the raw response document
    async fn exchange(&self, request: &[u8]) -> BridgeResult<Bytes>;

    /// Check that the backend accepts connections
    async fn probe(&self, timeout: Duration) -> BridgeResult<()>;
}

/// TCP transport with a cumulative per-attempt timeout
pub struct TcpTransport {
    config: ModelServiceConfig,
}

impl TcpTransport {
    pub fn new(config: ModelServiceConfig) -> Self {
        Self { config }
    }

    async fn exchange_unbounded(&self, addr: &str, request: &[u8]) -> BridgeResult<Bytes> {
        debug!(addr = %addr, "Connecting to model service");
        let mut stream = TcpStream::connect(self.config.socket_addr())
            .await
            .map_err(|source| BridgeError::Connect {
                addr: addr.to_string(),
                source,
            })?;

        let io_err = |source| BridgeError::Io {
            addr: addr.to_string(),
            source,
        };

        debug!(addr = %addr, request_bytes = request.len(), "Sending request to model service");
        stream.write_all(request).await.map_err(io_err)?;
        stream.flush().await.map_err(io_err)?;

        let response = read_document(&mut stream, addr, self.config.max_response_bytes).await;

        // The connection is never reused; a failed shutdown only means the peer is gone.
        let _ = stream.shutdown().await;
        response
    }
}

#[async_trait]
impl ModelTransport for TcpTransport {
    fn addr(&self) -> String {
        self.config.addr()
    }

    #[instrument(skip(self, request), fields(addr = %self.config.addr()))]
    async fn exchange(&self, request: &[u8]) -> BridgeResult<Bytes> {
        let addr = self.config.addr();
        let timeout = self.config.timeout;

        match tokio::time::timeout(timeout, self.exchange_unbounded(&addr, request)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    addr = %addr,
                    timeout_secs = timeout.as_secs_f64(),
                    "Request to model service timed out"
                );
                Err(BridgeError::Timeout { addr, timeout })
            }
        }
    }

    async fn probe(&self, timeout: Duration) -> BridgeResult<()> {
        let addr = self.config.addr();
        match tokio::time::timeout(timeout, TcpStream::connect(self.config.socket_addr())).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(source)) => Err(BridgeError::Connect { addr, source }),
            Err(_) => Err(BridgeError::Timeout { addr, timeout }),
        }
    }
}

/// Read from `reader` until the accumulated bytes form one complete JSON document
pub async fn read_document<R>(reader: &mut R, addr: &str, limit: usize) -> BridgeResult<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    loop {
        buf.reserve(READ_CHUNK);
        let n = reader
            .read_buf(&mut buf)
            .await
            .map_err(|source| BridgeError::Io {
                addr: addr.to_string(),
                source,
            })?;

        if (n == 0 || ends_like_document(&buf)) && is_complete_document(&buf) {
            debug!(addr = %addr, response_bytes = buf.len(), "Received response from model service");
            return Ok(buf.freeze());
        }

        if n == 0 {
            error!(addr = %addr, received = buf.len(), "Incomplete JSON response from model service");
            return Err(BridgeError::IncompleteResponse {
                addr: addr.to_string(),
                received: buf.len(),
            });
        }

        if buf.len() > limit {
            error!(addr = %addr, limit, "Model service response exceeded size limit");
            return Err(BridgeError::ResponseTooLarge {
                addr: addr.to_string(),
                limit,
            });
        }
    }
}

/// Whether the last non-whitespace byte could close an object or array
fn ends_like_document(buf: &[u8]) -> bool {
    matches!(
        buf.iter().rev().find(|b| !b.is_ascii_whitespace()),
        Some(b'}') | Some(b']')
    )
}

fn is_complete_document(buf: &[u8]) -> bool {
    serde_json::from_slice::<IgnoredAny>(buf).is_ok()
}
