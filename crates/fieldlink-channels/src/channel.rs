//! Channel contract and message queues.
//!
//! Channels are deliberately uniform in shape so the hub can treat MQTT,
//! WebSocket, and Modbus interchangeably by table lookup rather than
//! branching logic. Adding a transport means implementing [`Channel`] and
//! registering it — the supervisor and router never change.

use async_trait::async_trait;
use fieldlink_core::Protocol;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Error type for channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connection(String),

    /// Outbound transmission failed
    #[error("send failed: {0}")]
    Send(String),

    /// Inbound transmission failed
    #[error("receive failed: {0}")]
    Receive(String),

    /// The peer closed the connection
    #[error("connection closed")]
    Closed,

    /// No transport binding exists for the device
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Operation exceeded its bound
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Underlying I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// An unbounded FIFO of raw envelope strings.
///
/// One instance serves as each channel's private inbound queue (fed only
/// by that channel's receive loop); another serves as the shared queue
/// the router consumes. Queues are injected at construction — there is
/// no global queue state anywhere.
pub struct MessageQueue {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl MessageQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Append a raw envelope.
    pub fn push(&self, raw: impl Into<String>) {
        // The receiver lives inside self, so the channel cannot be closed
        // while a push is possible.
        let _ = self.tx.send(raw.into());
    }

    /// Wait for the next envelope.
    ///
    /// Returns `None` only if every handle to the queue has been dropped
    /// mid-wait; callers treat that as end of stream.
    pub async fn pop(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }

    /// Take the next envelope if one is already buffered.
    pub fn try_pop(&self) -> Option<String> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniform send/receive contract over one transport.
///
/// `receive` blocks for as long as its transport session lasts and feeds
/// the private inbound queue as envelopes arrive; it returns only when
/// the session ends (the supervisor re-invokes it). `send` is one-shot:
/// every call sets up its own connection and tears it down again.
#[async_trait]
pub trait Channel: Send + Sync {
    /// The transport this channel speaks.
    fn protocol(&self) -> Protocol;

    /// The channel's private inbound queue.
    fn inbound(&self) -> &MessageQueue;

    /// Deliver one command envelope to `receiver`.
    async fn send(&self, command: &str, receiver: &str) -> ChannelResult<()>;

    /// Listen for envelopes addressed to `device_id`, pushing each onto
    /// the private inbound queue.
    async fn receive(&self, device_id: &str) -> ChannelResult<()>;
}

/// Scripted channel for tests.
///
/// Records every send and completes `receive` after an optional delay,
/// so router and supervisor behavior can be exercised without a live
/// transport.
pub struct MockChannel {
    protocol: Protocol,
    inbound: MessageQueue,
    sends: std::sync::Mutex<Vec<(String, String)>>,
    fail_sends: std::sync::atomic::AtomicBool,
    receive_delay: Duration,
}

impl MockChannel {
    /// Create a mock for the given protocol.
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            inbound: MessageQueue::new(),
            sends: std::sync::Mutex::new(Vec::new()),
            fail_sends: std::sync::atomic::AtomicBool::new(false),
            receive_delay: Duration::from_millis(10),
        }
    }

    /// Make every subsequent send report failure.
    pub fn with_failing_sends(self) -> Self {
        self.fail_sends
            .store(true, std::sync::atomic::Ordering::Relaxed);
        self
    }

    /// How long `receive` runs before completing.
    pub fn with_receive_delay(mut self, delay: Duration) -> Self {
        self.receive_delay = delay;
        self
    }

    /// Every `(command, receiver)` pair sent so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sends.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn inbound(&self) -> &MessageQueue {
        &self.inbound
    }

    async fn send(&self, command: &str, receiver: &str) -> ChannelResult<()> {
        if self.fail_sends.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(ChannelError::Send("mock send failure".to_string()));
        }
        self.sends
            .lock()
            .unwrap()
            .push((command.to_string(), receiver.to_string()));
        Ok(())
    }

    async fn receive(&self, _device_id: &str) -> ChannelResult<()> {
        tokio::time::sleep(self.receive_delay).await;
        Ok(())
    }
}
