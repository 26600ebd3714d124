use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{HubError, Transport};

/// Transport that forwards frames into an unbounded channel.
///
/// Useful for server-side consumers and tests. A send fails once the
/// receiver is dropped or the transport was closed.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

impl ChannelTransport {
    /// Creates a transport and the receiver its frames arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, frame: &str) -> Result<(), HubError> {
        if self.is_closed() {
            return Err(HubError::ConnectionClosed);
        }
        self.tx
            .send(frame.to_string())
            .map_err(|_| HubError::ConnectionClosed)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
