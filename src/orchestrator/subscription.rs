use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::channel::{EventChannel, Subscription};
use crate::error::Result;
use crate::orchestrator::registry::Orchestrator;

/// Shortest period the watchdog runs at.
pub const MIN_WATCHDOG_INTERVAL: Duration = Duration::from_millis(10);

struct ActiveSubscription {
    id: Uuid,
    listener: JoinHandle<()>,
}

/// Keeps exactly one live subscription feeding the orchestrator and
/// re-establishes it after the channel drops it.
pub struct SubscriptionManager {
    channel: Arc<dyn EventChannel>,
    namespace: String,
    orchestrator: Orchestrator,
    active: Mutex<Option<ActiveSubscription>>,
    subscriptions_made: AtomicU64,
}

impl SubscriptionManager {
    pub fn new(channel: Arc<dyn EventChannel>, namespace: &str, orchestrator: Orchestrator) -> Self {
        Self {
            channel,
            namespace: namespace.to_string(),
            orchestrator,
            active: Mutex::new(None),
            subscriptions_made: AtomicU64::new(0),
        }
    }

    /// Subscribes unless a live subscription exists. Returns whether a new
    /// subscription was made.
    pub async fn ensure_subscribed(&self) -> Result<bool> {
        let mut active = self.active.lock().await;

        if let Some(current) = active.as_ref() {
            if !current.listener.is_finished() {
                return Ok(false);
            }
            tracing::warn!(
                "Subscription {} on {} was lost, resubscribing",
                current.id,
                self.channel.name()
            );
        }

        let subscription = self.channel.subscribe(&self.namespace).await?;
        let id = subscription.id;
        let listener = tokio::spawn(forward(subscription, self.orchestrator.clone()));

        *active = Some(ActiveSubscription { id, listener });
        self.subscriptions_made.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            "Subscribed to {} on {} ({})",
            self.namespace,
            self.channel.name(),
            id
        );

        Ok(true)
    }

    pub async fn is_subscribed(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|current| !current.listener.is_finished())
    }

    pub async fn subscription_id(&self) -> Option<Uuid> {
        self.active.lock().await.as_ref().map(|current| current.id)
    }

    /// Subscriptions made so far, the first one included.
    pub fn subscriptions_made(&self) -> u64 {
        self.subscriptions_made.load(Ordering::Relaxed)
    }

    /// Re-checks the subscription every `interval`, starting after `delay`.
    /// Intervals below `MIN_WATCHDOG_INTERVAL` are raised to it.
    pub fn spawn_watchdog(self: &Arc<Self>, delay: Duration, interval: Duration) -> JoinHandle<()> {
        let interval = interval.max(MIN_WATCHDOG_INTERVAL);
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + delay, interval);
            loop {
                ticker.tick().await;
                match manager.ensure_subscribed().await {
                    Ok(true) => tracing::info!("Watchdog restored subscription to {}", manager.namespace),
                    Ok(false) => {}
                    Err(e) => tracing::warn!("Resubscribe to {} failed: {}", manager.namespace, e),
                }
            }
        })
    }

    pub async fn shutdown(&self) {
        if let Some(current) = self.active.lock().await.take() {
            current.listener.abort();
        }
    }
}

async fn forward(subscription: Subscription, orchestrator: Orchestrator) {
    while let Some(envelope) = subscription.recv().await {
        let partition = envelope.partition_key.clone();
        if let Err(e) = orchestrator.route(envelope).await {
            tracing::warn!("Failed to handle event for {}: {}", partition, e);
        }
    }
    tracing::warn!(
        "Subscription {} on {} disconnected",
        subscription.id,
        subscription.namespace
    );
}
