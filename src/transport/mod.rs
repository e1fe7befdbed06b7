//! Transport abstraction for message intake and publication
//!
//! The correlation loop consumes a `Subscriber` and publishes through a
//! `Publisher`; both are traits so the in-process channel transport used
//! here can be swapped for a real broker consumer/producer without
//! touching the core. Publication is fire-and-forget with an explicit
//! `flush`, matching a buffering producer.

pub mod channel;

pub use channel::{channel_pair, ChannelPublisher, ChannelSubscriber};

use async_trait::async_trait;
use thiserror::Error;

/// Transport-level errors
///
/// Only `ChannelClosed` is fatal to a polling loop; everything else is a
/// hiccup the loop logs and rides out.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Flush failed: {0}")]
    Flush(String),

    #[error("Channel closed")]
    ChannelClosed,
}

impl TransportError {
    /// Whether a polling loop should terminate on this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::ChannelClosed)
    }
}

/// Envelope for inbound messages: the source topic plus the raw payload.
///
/// Dispatch in the correlation loop is by `topic` against the configured
/// weather/yield topic names.
#[derive(Debug, Clone)]
pub struct StreamMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl StreamMessage {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

/// Publisher - sends messages toward an output topic
#[async_trait]
pub trait Publisher<M>: Send + Sync
where
    M: Send + Sync,
{
    /// Publish a message (fire-and-forget; delivery may be buffered)
    async fn publish(&self, msg: M) -> Result<(), TransportError>;

    /// Flush any buffered output. Default is a no-op for unbuffered
    /// transports.
    async fn flush(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Subscriber - receives messages from the input topics
#[async_trait]
pub trait Subscriber<M>: Send
where
    M: Send,
{
    /// Wait for the next message. Callers bound this with a timeout to
    /// realize a bounded poll.
    async fn next(&mut self) -> Result<M, TransportError>;
}
