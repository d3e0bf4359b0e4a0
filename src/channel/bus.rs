use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use crate::channel::events::Envelope;
use crate::error::{Error, Result};

/// Pub/sub transport addressed by namespace.
#[async_trait]
pub trait EventChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, envelope: Envelope) -> Result<()>;

    /// Receives every envelope published on `namespace` from now on.
    async fn subscribe(&self, namespace: &str) -> Result<Subscription>;
}

/// Receiving end of one subscription. Disconnects when the channel goes away.
pub struct Subscription {
    pub id: Uuid,
    pub namespace: String,
    receiver: flume::Receiver<Envelope>,
}

impl Subscription {
    pub fn new(namespace: &str, receiver: flume::Receiver<Envelope>) -> Self {
        Self {
            id: Uuid::new_v4(),
            namespace: namespace.to_string(),
            receiver,
        }
    }

    /// `None` once the channel side is gone and the backlog is drained.
    pub async fn recv(&self) -> Option<Envelope> {
        self.receiver.recv_async().await.ok()
    }

    pub fn try_recv(&self) -> Option<Envelope> {
        self.receiver.try_recv().ok()
    }

    pub fn is_disconnected(&self) -> bool {
        self.receiver.is_disconnected()
    }
}

struct Subscriber {
    id: Uuid,
    namespace: String,
    sender: flume::Sender<Envelope>,
}

#[derive(Default)]
struct ChannelInner {
    closed: bool,
    subscribers: Vec<Subscriber>,
    delivered: u64,
}

/// Process-local channel on flume. Can be closed and reopened to simulate an
/// outage; closing disconnects every current subscription.
#[derive(Clone)]
pub struct InMemoryChannel {
    name: String,
    inner: Arc<Mutex<ChannelInner>>,
}

impl InMemoryChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(ChannelInner::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.subscribers.clear();
        tracing::info!("Channel {} closed", self.name);
    }

    pub fn reopen(&self) {
        self.lock().closed = false;
        tracing::info!("Channel {} reopened", self.name);
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn subscriber_count(&self, namespace: &str) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|s| s.namespace == namespace && !s.sender.is_disconnected())
            .count()
    }

    pub fn has_subscription(&self, id: Uuid) -> bool {
        self.lock()
            .subscribers
            .iter()
            .any(|s| s.id == id && !s.sender.is_disconnected())
    }

    /// Envelopes handed to at least one subscriber.
    pub fn delivered(&self) -> u64 {
        self.lock().delivered
    }
}

#[async_trait]
impl EventChannel for InMemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, envelope: Envelope) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(Error::Publish {
                channel: self.name.clone(),
                reason: "channel is closed".to_string(),
            });
        }

        let mut reached = false;
        inner.subscribers.retain(|s| {
            if s.namespace != envelope.namespace {
                return !s.sender.is_disconnected();
            }
            let ok = s.sender.send(envelope.clone()).is_ok();
            reached |= ok;
            ok
        });
        if reached {
            inner.delivered += 1;
        }

        Ok(())
    }

    async fn subscribe(&self, namespace: &str) -> Result<Subscription> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(Error::Publish {
                channel: self.name.clone(),
                reason: "cannot subscribe to a closed channel".to_string(),
            });
        }

        let (sender, receiver) = flume::unbounded();
        let subscription = Subscription::new(namespace, receiver);
        inner.subscribers.push(Subscriber {
            id: subscription.id,
            namespace: namespace.to_string(),
            sender,
        });

        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::events::{ChannelEvent, Envelope, INSIGHTS_NAMESPACE};

    fn tags_event() -> Envelope {
        Envelope::tags_extracted("o/r", "1", vec!["bug".into()], "offline")
    }

    #[tokio::test]
    async fn test_delivers_by_namespace() {
        let channel = InMemoryChannel::new("primary");
        let insights = channel.subscribe(INSIGHTS_NAMESPACE).await.unwrap();
        let issues = channel.subscribe("issues").await.unwrap();

        channel.publish(tags_event()).await.unwrap();

        let received = insights.recv().await.unwrap();
        assert!(matches!(received.event, ChannelEvent::TagsExtracted { .. }));
        assert!(issues.try_recv().is_none());
        assert_eq!(channel.delivered(), 1);
    }

    #[tokio::test]
    async fn test_close_disconnects_and_rejects() {
        let channel = InMemoryChannel::new("primary");
        let sub = channel.subscribe(INSIGHTS_NAMESPACE).await.unwrap();
        assert!(channel.has_subscription(sub.id));

        channel.close();
        assert!(sub.is_disconnected());
        assert!(sub.recv().await.is_none());
        assert!(channel.publish(tags_event()).await.is_err());
        assert!(channel.subscribe(INSIGHTS_NAMESPACE).await.is_err());

        channel.reopen();
        assert!(!channel.has_subscription(sub.id));
        assert!(channel.subscribe(INSIGHTS_NAMESPACE).await.is_ok());
    }

    #[tokio::test]
    async fn test_prunes_dropped_subscribers() {
        let channel = InMemoryChannel::new("primary");
        let sub = channel.subscribe(INSIGHTS_NAMESPACE).await.unwrap();
        drop(sub);

        channel.publish(tags_event()).await.unwrap();
        assert_eq!(channel.subscriber_count(INSIGHTS_NAMESPACE), 0);
        assert_eq!(channel.delivered(), 0);
    }
}
