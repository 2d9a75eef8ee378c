//! Event bus and the progress reporter built on it.

mod progress;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

pub use progress::ProgressReporter;

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BusError {
    /// Nobody is listening; the event was dropped
    #[error("no subscribers")]
    NoSubscribers,
}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), BusError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// In-memory broadcast bus.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), BusError> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|_| BusError::NoSubscribers)
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_reported() {
        let bus = InMemoryBus::<u32>::new(4);
        assert_eq!(
            tokio_test::assert_err!(bus.publish(1).await),
            BusError::NoSubscribers
        );

        let mut rx = bus.subscribe();
        tokio_test::assert_ok!(bus.publish(2).await);
        assert_eq!(rx.recv().await.unwrap(), 2);
    }
}
