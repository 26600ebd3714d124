use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{Event, HubError};

/// How long a single write may take before the connection counts as dead.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Identifier of a live connection.
pub type ConnectionId = Uuid;

/// The write half of a client session (WebSocket, channel, ...).
///
/// Framing is up to the implementation; the hub hands over one serialized
/// event per call.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Writes one text frame.
    async fn send(&self, frame: &str) -> Result<(), HubError>;

    /// Closes the underlying session. Must be safe to call more than once.
    async fn close(&self);
}

/// A registered client connection.
///
/// Writes are serialized: only one task writes to the transport at a time.
/// A write that does not finish within the write timeout fails with
/// [`HubError::Timeout`], so a peer that stops reading cannot stall senders.
pub struct Connection {
    id: ConnectionId,
    transport: Box<dyn Transport>,
    write_lock: Mutex<()>,
    write_timeout: Duration,
}

impl Connection {
    pub fn new(transport: impl Transport) -> Arc<Self> {
        Self::with_write_timeout(transport, DEFAULT_WRITE_TIMEOUT)
    }

    pub fn with_write_timeout(transport: impl Transport, write_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            transport: Box::new(transport),
            write_lock: Mutex::new(()),
            write_timeout,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Writes an already serialized frame.
    pub async fn send_frame(&self, frame: &str) -> Result<(), HubError> {
        let _guard = self.write_lock.lock().await;
        tokio::time::timeout(self.write_timeout, self.transport.send(frame))
            .await
            .unwrap_or(Err(HubError::Timeout(self.write_timeout)))
    }

    /// Serializes and writes one event.
    pub async fn send(&self, event: &Event) -> Result<(), HubError> {
        let frame = event.to_frame()?;
        self.send_frame(&frame).await
    }

    /// Closes the transport. Gives up after the write timeout.
    pub async fn close(&self) {
        let _guard = self.write_lock.lock().await;
        if tokio::time::timeout(self.write_timeout, self.transport.close())
            .await
            .is_err()
        {
            tracing::debug!(connection_id = %self.id, "Close timed out");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}
