use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::channel::{ChannelEvent, Envelope};
use crate::error::Result;
use crate::models::IssueRecord;
use crate::orchestrator::actor::{ActorContext, ActorHandle, RepositoryActor, SummaryTurn, TurnReport};
use crate::orchestrator::state::OrchestratorState;

/// Routes work to one actor per repository key, spawning actors on demand.
#[derive(Clone)]
pub struct Orchestrator {
    ctx: Arc<ActorContext>,
    actors: Arc<Mutex<HashMap<String, ActorHandle>>>,
}

impl Orchestrator {
    pub fn new(ctx: ActorContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            actors: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn actor_for(&self, repository: &str) -> ActorHandle {
        let mut actors = self.actors.lock().await;
        if let Some(handle) = actors.get(repository) {
            if handle.is_alive() {
                return handle.clone();
            }
            tracing::warn!("Actor for {} stopped, starting a new one", repository);
        }

        let handle = RepositoryActor::spawn(repository, self.ctx.clone());
        actors.insert(repository.to_string(), handle.clone());
        handle
    }

    pub async fn ingest(&self, issue: IssueRecord) -> Result<TurnReport> {
        let actor = self.actor_for(&issue.repository).await;
        actor.ingest(issue).await
    }

    /// Hands the issue to its repository's actor without waiting for the
    /// turn. Issues for one repository are still handled in queue order.
    pub async fn enqueue(&self, issue: IssueRecord) -> Result<()> {
        let actor = self.actor_for(&issue.repository).await;
        actor.tell(issue).await
    }

    /// Regenerates and publishes the summary now. `None` when the repository
    /// has no issues.
    pub async fn summarize(&self, repository: &str) -> Result<Option<SummaryTurn>> {
        self.actor_for(repository).await.summarize().await
    }

    pub async fn snapshot(&self, repository: &str) -> Result<OrchestratorState> {
        self.actor_for(repository).await.snapshot().await
    }

    /// Handles one envelope from the ingestion namespace. Derived events are
    /// ignored.
    pub async fn dispatch(&self, envelope: Envelope) -> Result<Option<TurnReport>> {
        match envelope.event {
            ChannelEvent::IssueIngested { issue } => self.ingest(issue).await.map(Some),
            other => {
                tracing::debug!("Ignoring {} event on {}", other.kind(), envelope.namespace);
                Ok(None)
            }
        }
    }

    /// Like `dispatch`, but only queues ingestion events. Returns whether the
    /// envelope was routed to an actor.
    pub async fn route(&self, envelope: Envelope) -> Result<bool> {
        match envelope.event {
            ChannelEvent::IssueIngested { issue } => self.enqueue(issue).await.map(|()| true),
            other => {
                tracing::debug!("Ignoring {} event on {}", other.kind(), envelope.namespace);
                Ok(false)
            }
        }
    }

    pub async fn repositories(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.actors.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}
