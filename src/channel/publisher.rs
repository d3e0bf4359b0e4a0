use std::sync::Arc;

use serde::Serialize;

use crate::channel::bus::EventChannel;
use crate::channel::events::Envelope;

/// Where a publish attempt ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishOutcome {
    Primary,
    Alternate,
    /// No channel accepted the envelope.
    Skipped,
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        !matches!(self, PublishOutcome::Skipped)
    }
}

/// Publishes on the primary channel and retries once on the alternate.
pub struct FallbackPublisher {
    primary: Arc<dyn EventChannel>,
    alternate: Option<Arc<dyn EventChannel>>,
}

impl FallbackPublisher {
    pub fn new(primary: Arc<dyn EventChannel>) -> Self {
        Self {
            primary,
            alternate: None,
        }
    }

    pub fn with_alternate(mut self, alternate: Arc<dyn EventChannel>) -> Self {
        self.alternate = Some(alternate);
        self
    }

    pub fn primary(&self) -> Arc<dyn EventChannel> {
        self.primary.clone()
    }

    pub async fn publish(&self, envelope: Envelope) -> PublishOutcome {
        let kind = envelope.event.kind();

        let primary_error = match self.primary.publish(envelope.clone()).await {
            Ok(()) => return PublishOutcome::Primary,
            Err(e) => e,
        };

        let Some(alternate) = &self.alternate else {
            tracing::warn!(
                "Dropping {} event, {} rejected it: {}",
                kind,
                self.primary.name(),
                primary_error
            );
            return PublishOutcome::Skipped;
        };

        tracing::warn!(
            "Publishing {} on {} failed, trying {}: {}",
            kind,
            self.primary.name(),
            alternate.name(),
            primary_error
        );

        match alternate.publish(envelope).await {
            Ok(()) => PublishOutcome::Alternate,
            Err(e) => {
                tracing::warn!("Dropping {} event, {} also failed: {}", kind, alternate.name(), e);
                PublishOutcome::Skipped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::bus::InMemoryChannel;
    use crate::channel::events::INSIGHTS_NAMESPACE;

    fn envelope() -> Envelope {
        Envelope::tags_extracted("o/r", "1", vec!["bug".into()], "offline")
    }

    #[tokio::test]
    async fn test_falls_through_channels() {
        let primary = InMemoryChannel::new("primary");
        let alternate = InMemoryChannel::new("alternate");
        let sub = alternate.subscribe(INSIGHTS_NAMESPACE).await.unwrap();

        let publisher = FallbackPublisher::new(Arc::new(primary.clone()))
            .with_alternate(Arc::new(alternate.clone()));

        assert_eq!(publisher.publish(envelope()).await, PublishOutcome::Primary);

        primary.close();
        assert_eq!(publisher.publish(envelope()).await, PublishOutcome::Alternate);
        assert!(sub.try_recv().is_some());

        alternate.close();
        assert_eq!(publisher.publish(envelope()).await, PublishOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_without_alternate_skips() {
        let primary = InMemoryChannel::new("primary");
        primary.close();
        let publisher = FallbackPublisher::new(Arc::new(primary));
        assert!(!publisher.publish(envelope()).await.is_published());
    }
}
