//! Transport layer for broker subscriber connections
//!
//! Pluggable transports behind one trait:
//!
//! ```text
//!        ┌─────────────────┐
//!        │ Transport Trait │
//!        └────────┬────────┘
//!                 │
//!        ┌────────┴────────┐
//!        ▼                 ▼
//!   TcpTransport     MemoryTransport
//!   (network)        (in-process)
//! ```
//!
//! Wire format: 1-byte frame kind + 4-byte LE payload length + JSON.

use async_trait::async_trait;
use shared::message::{Frame, FrameKind};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc};

use crate::utils::AppError;

/// Largest accepted frame payload (1 MiB); anything bigger is a protocol
/// violation and drops the connection.
const MAX_FRAME_LEN: usize = 1024 * 1024;

// ========== Transport Trait ==========

#[async_trait]
pub trait Transport: Send + Sync {
    async fn read_frame(&self) -> Result<Frame, AppError>;
    async fn write_frame(&self, frame: &Frame) -> Result<(), AppError>;
}

// Helper functions

async fn read_from_stream<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Frame, AppError> {
    // Frame kind (1 byte)
    let mut kind_buf = [0u8; 1];
    reader
        .read_exact(&mut kind_buf)
        .await
        .map_err(|e| AppError::internal(format!("Read kind failed: {e}")))?;

    let kind =
        FrameKind::try_from(kind_buf[0]).map_err(|_| AppError::invalid("Invalid frame kind"))?;

    // Payload length (4 bytes)
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| AppError::internal(format!("Read len failed: {e}")))?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(AppError::invalid(format!("Frame too large: {len} bytes")));
    }

    // Payload
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| AppError::internal(format!("Read payload failed: {e}")))?;

    Ok(Frame::new(kind, payload))
}

async fn write_to_stream<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    frame: &Frame,
) -> Result<(), AppError> {
    let mut data = Vec::with_capacity(5 + frame.payload.len());
    data.push(frame.kind as u8);
    data.extend_from_slice(&(frame.payload.len() as u32).to_le_bytes());
    data.extend_from_slice(&frame.payload);

    writer
        .write_all(&data)
        .await
        .map_err(|e| AppError::internal(format!("Write failed: {e}")))?;
    Ok(())
}

// ========== TCP Transport ==========

/// TCP transport over split stream halves
#[derive(Debug)]
pub struct TcpTransport {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpTransport {
    pub async fn connect(addr: &str) -> Result<Self, AppError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| AppError::internal(format!("TCP connect failed: {e}")))?;
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn read_frame(&self) -> Result<Frame, AppError> {
        let mut reader = self.reader.lock().await;
        read_from_stream(&mut *reader).await
    }

    async fn write_frame(&self, frame: &Frame) -> Result<(), AppError> {
        let mut writer = self.writer.lock().await;
        write_to_stream(&mut *writer, frame).await
    }
}

// ========== Memory Transport (In-Process) ==========

/// In-process transport for tests and same-process subscribers.
///
/// The broker side reads what the peer sends and writes deliveries back;
/// [`MemoryPeer`] is the subscriber-side handle.
#[derive(Debug)]
pub struct MemoryTransport {
    incoming: Mutex<mpsc::Receiver<Frame>>,
    outgoing: mpsc::Sender<Frame>,
}

/// Subscriber-side handle of a [`MemoryTransport`] pair.
#[derive(Debug)]
pub struct MemoryPeer {
    to_broker: mpsc::Sender<Frame>,
    from_broker: mpsc::Receiver<Frame>,
}

/// Create a connected (broker-side, peer-side) transport pair.
pub fn memory_pair() -> (Arc<MemoryTransport>, MemoryPeer) {
    let (to_broker, incoming) = mpsc::channel(64);
    let (outgoing, from_broker) = mpsc::channel(64);
    (
        Arc::new(MemoryTransport {
            incoming: Mutex::new(incoming),
            outgoing,
        }),
        MemoryPeer {
            to_broker,
            from_broker,
        },
    )
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read_frame(&self) -> Result<Frame, AppError> {
        let mut rx = self.incoming.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| AppError::internal("Peer disconnected"))
    }

    async fn write_frame(&self, frame: &Frame) -> Result<(), AppError> {
        self.outgoing
            .send(frame.clone())
            .await
            .map_err(|_| AppError::internal("Peer disconnected"))
    }
}

impl MemoryPeer {
    /// Send a join request to the broker.
    pub async fn join(&self, room: &str) -> Result<(), AppError> {
        self.to_broker
            .send(Frame::join(room))
            .await
            .map_err(|_| AppError::internal("Broker side closed"))
    }

    /// Receive the next delivered frame, if the connection is still open.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.from_broker.recv().await
    }

    /// Receive with a timeout; None if nothing arrives in time.
    pub async fn recv_timeout(&mut self, timeout: std::time::Duration) -> Option<Frame> {
        tokio::time::timeout(timeout, self.from_broker.recv())
            .await
            .ok()
            .flatten()
    }

    /// Drop the sending half, simulating a client disconnect.
    pub fn disconnect(self) {}
}
