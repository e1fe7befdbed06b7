//! Tokio mpsc-based transport for single-process mode
//!
//! Messages pass directly between tasks with no serialization overhead.
//! Per-sender FIFO order is the channel's own guarantee, which is all the
//! ordering the correlation loop relies on.

use super::{Publisher, Subscriber, TransportError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Create a connected publisher/subscriber pair with the given capacity.
pub fn channel_pair<M: Send + Sync>(capacity: usize) -> (ChannelPublisher<M>, ChannelSubscriber<M>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChannelPublisher { tx }, ChannelSubscriber { rx })
}

/// Channel-backed publisher
pub struct ChannelPublisher<M> {
    tx: mpsc::Sender<M>,
}

impl<M> Clone for ChannelPublisher<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

#[async_trait]
impl<M> Publisher<M> for ChannelPublisher<M>
where
    M: Send + Sync + 'static,
{
    async fn publish(&self, msg: M) -> Result<(), TransportError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }
}

/// Channel-backed subscriber
pub struct ChannelSubscriber<M> {
    rx: mpsc::Receiver<M>,
}

#[async_trait]
impl<M> Subscriber<M> for ChannelSubscriber<M>
where
    M: Send + 'static,
{
    async fn next(&mut self) -> Result<M, TransportError> {
        self.rx.recv().await.ok_or(TransportError::ChannelClosed)
    }
}
