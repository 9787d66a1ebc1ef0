//! Transport abstraction for the sync protocol.
//!
//! A [`Channel`] is one bidirectional message pipe to a single peer. The
//! in-memory implementation backs the tests; the TCP implementation frames
//! CBOR messages with a u32 big-endian length prefix.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, SyncError};
use crate::messages::WireMessage;

/// A bidirectional, message-oriented connection to one peer.
#[async_trait]
pub trait Channel: Send {
    /// Send a message to the peer.
    async fn send(&mut self, message: WireMessage) -> Result<()>;

    /// Receive the next message, failing with `Timeout` if none arrives
    /// within `timeout`.
    async fn recv(&mut self, timeout: Duration) -> Result<WireMessage>;
}

/// A paired in-memory channel for testing.
pub mod memory {
    use super::*;
    use tokio::sync::mpsc;

    /// One end of an in-memory channel pair.
    pub struct MemoryChannel {
        tx: mpsc::Sender<WireMessage>,
        rx: mpsc::Receiver<WireMessage>,
    }

    /// Create two connected channel ends.
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let (a_tx, b_rx) = mpsc::channel(64);
        let (b_tx, a_rx) = mpsc::channel(64);
        (
            MemoryChannel { tx: a_tx, rx: a_rx },
            MemoryChannel { tx: b_tx, rx: b_rx },
        )
    }

    #[async_trait]
    impl Channel for MemoryChannel {
        async fn send(&mut self, message: WireMessage) -> Result<()> {
            self.tx
                .send(message)
                .await
                .map_err(|_| SyncError::Transport("peer disconnected".into()))
        }

        async fn recv(&mut self, timeout: Duration) -> Result<WireMessage> {
            match tokio::time::timeout(timeout, self.rx.recv()).await {
                Ok(Some(message)) => Ok(message),
                Ok(None) => Err(SyncError::Transport("channel closed".into())),
                Err(_) => Err(SyncError::Timeout("waiting for message".into())),
            }
        }
    }
}

/// TCP transport with length-prefixed CBOR frames.
pub mod tcp {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use crate::messages::{decode_message, encode_message, limits};

    /// A channel over one TCP connection.
    pub struct TcpChannel {
        stream: TcpStream,
    }

    impl TcpChannel {
        /// Dial a peer, bounded by `timeout`.
        pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self> {
            let stream = tokio::time::timeout(timeout, TcpStream::connect(endpoint))
                .await
                .map_err(|_| SyncError::Timeout(format!("connecting to {}", endpoint)))?
                .map_err(|e| SyncError::Transport(format!("connect {}: {}", endpoint, e)))?;
            Ok(Self { stream })
        }

        /// Wrap an accepted connection.
        pub fn from_stream(stream: TcpStream) -> Self {
            Self { stream }
        }

        async fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
            let len = bytes.len() as u32;
            self.stream
                .write_all(&len.to_be_bytes())
                .await
                .map_err(|e| SyncError::Transport(format!("write: {}", e)))?;
            self.stream
                .write_all(bytes)
                .await
                .map_err(|e| SyncError::Transport(format!("write: {}", e)))?;
            self.stream
                .flush()
                .await
                .map_err(|e| SyncError::Transport(format!("flush: {}", e)))?;
            Ok(())
        }

        async fn read_frame(&mut self) -> Result<Vec<u8>> {
            let mut len_buf = [0u8; 4];
            self.stream
                .read_exact(&mut len_buf)
                .await
                .map_err(|e| SyncError::Transport(format!("read: {}", e)))?;
            let len = u32::from_be_bytes(len_buf) as usize;
            if len > limits::MAX_FRAME_BYTES {
                return Err(SyncError::InvalidMessage(format!(
                    "frame of {} bytes exceeds limit",
                    len
                )));
            }
            let mut buf = vec![0u8; len];
            self.stream
                .read_exact(&mut buf)
                .await
                .map_err(|e| SyncError::Transport(format!("read: {}", e)))?;
            Ok(buf)
        }
    }

    #[async_trait]
    impl Channel for TcpChannel {
        async fn send(&mut self, message: WireMessage) -> Result<()> {
            let bytes = encode_message(&message)?;
            self.write_frame(&bytes).await
        }

        async fn recv(&mut self, timeout: Duration) -> Result<WireMessage> {
            let bytes = tokio::time::timeout(timeout, self.read_frame())
                .await
                .map_err(|_| SyncError::Timeout("waiting for frame".into()))??;
            decode_message(&bytes)
        }
    }
}
