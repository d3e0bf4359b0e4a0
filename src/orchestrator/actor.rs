use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::analysis::{Recommender, SummaryGenerator, TagExtractor};
use crate::channel::{Envelope, FallbackPublisher, PublishOutcome};
use crate::config::{OrchestratorConfig, SummaryCadence};
use crate::error::{Error, Result};
use crate::llm::CompositeProvider;
use crate::models::{IssueRecord, RepositorySummary};
use crate::orchestrator::state::{ActorPhase, OrchestratorState};
use crate::storage::StateStore;

const MAILBOX_CAPACITY: usize = 64;

/// Collaborators shared by every repository actor.
pub struct ActorContext {
    pub tag_extractor: TagExtractor,
    pub summaries: SummaryGenerator,
    pub publisher: FallbackPublisher,
    pub store: Option<Arc<StateStore>>,
    pub cadence: SummaryCadence,
}

impl ActorContext {
    pub fn new(
        llm: Arc<CompositeProvider>,
        publisher: FallbackPublisher,
        store: Option<Arc<StateStore>>,
        config: &OrchestratorConfig,
    ) -> Self {
        let recommender = Recommender::new(llm.clone(), config.recommendation_timeout);
        Self {
            tag_extractor: TagExtractor::new(llm, config.tag_timeout),
            summaries: SummaryGenerator::new(Arc::new(recommender)),
            publisher,
            store,
            cadence: config.summary_cadence,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryTurn {
    pub summary: RepositorySummary,
    pub published: PublishOutcome,
}

/// What one ingestion turn did.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub repository: String,
    pub issue_id: String,
    pub new_issue: bool,
    pub tags: Vec<String>,
    pub tag_source: String,
    pub tags_published: PublishOutcome,
    pub summary: Option<SummaryTurn>,
    pub persisted: bool,
}

pub(crate) enum ActorMessage {
    /// `reply` is `None` for fire-and-forget ingestion.
    Ingest {
        issue: IssueRecord,
        reply: Option<oneshot::Sender<TurnReport>>,
    },
    Summarize {
        reply: oneshot::Sender<Option<SummaryTurn>>,
    },
    Snapshot {
        reply: oneshot::Sender<OrchestratorState>,
    },
}

/// Owns the state of one repository and handles its messages one at a time.
pub struct RepositoryActor {
    state: OrchestratorState,
    ctx: Arc<ActorContext>,
    mailbox: mpsc::Receiver<ActorMessage>,
}

impl RepositoryActor {
    /// Restores the stored snapshot, if any, and starts the message loop.
    pub fn spawn(repository: &str, ctx: Arc<ActorContext>) -> ActorHandle {
        let state = restore_state(repository, ctx.store.as_deref());
        let (sender, mailbox) = mpsc::channel(MAILBOX_CAPACITY);

        let actor = Self {
            state,
            ctx,
            mailbox,
        };
        tokio::spawn(actor.run());

        ActorHandle {
            repository: repository.to_string(),
            sender,
        }
    }

    async fn run(mut self) {
        tracing::debug!("Actor for {} started", self.state.repository);

        while let Some(message) = self.mailbox.recv().await {
            match message {
                ActorMessage::Ingest { issue, reply } => {
                    let report = self.handle_ingest(issue).await;
                    match reply {
                        Some(reply) => {
                            let _ = reply.send(report);
                        }
                        None => tracing::debug!(
                            "Turn for {}#{} done: tags from {}, tags {:?}, summary {}",
                            report.repository,
                            report.issue_id,
                            report.tag_source,
                            report.tags_published,
                            report.summary.is_some()
                        ),
                    }
                }
                ActorMessage::Summarize { reply } => {
                    let turn = self.summarize().await;
                    self.persist();
                    self.state.phase = ActorPhase::Idle;
                    let _ = reply.send(turn);
                }
                ActorMessage::Snapshot { reply } => {
                    let _ = reply.send(self.state.clone());
                }
            }
        }

        tracing::debug!("Actor for {} stopped", self.state.repository);
    }

    async fn handle_ingest(&mut self, issue: IssueRecord) -> TurnReport {
        let repository = self.state.repository.clone();
        let issue_id = issue.id.clone();

        self.state.phase = ActorPhase::Ingesting;
        let new_issue = self.state.upsert_issue(issue.clone());
        self.state.ingested_count += 1;

        self.state.phase = ActorPhase::Extracting;
        let extraction = self.ctx.tag_extractor.extract(&issue).await;
        let tags = extraction.tags.to_vec();
        if let Err(e) = self.state.record_tags(&issue_id, extraction.tags) {
            tracing::error!("Could not store tags for {}#{}: {}", repository, issue_id, e);
        }

        self.state.phase = ActorPhase::Publishing;
        let tags_published = self
            .ctx
            .publisher
            .publish(Envelope::tags_extracted(
                &repository,
                &issue_id,
                tags.clone(),
                &extraction.source,
            ))
            .await;

        let summary = if self.ctx.cadence.should_summarize(self.state.ingested_count) {
            self.summarize().await
        } else {
            None
        };

        let persisted = self.persist();
        self.state.phase = ActorPhase::Idle;

        TurnReport {
            repository,
            issue_id,
            new_issue,
            tags,
            tag_source: extraction.source,
            tags_published,
            summary,
            persisted,
        }
    }

    /// Regenerates the summary and publishes it. Kept in state when no
    /// channel takes it.
    async fn summarize(&mut self) -> Option<SummaryTurn> {
        self.state.phase = ActorPhase::Summarizing;
        let summary = self.ctx.summaries.generate(&self.state).await?;

        self.state.phase = ActorPhase::Publishing;
        let published = self
            .ctx
            .publisher
            .publish(Envelope::summary_report(summary.clone()))
            .await;

        if !published.is_published() {
            tracing::warn!(
                "Summary for {} could not be published, keeping it in state",
                self.state.repository
            );
            self.state.retain_summary(summary.clone());
        }

        if let Some(store) = &self.ctx.store {
            if let Err(e) = store.save_summary(&summary) {
                tracing::warn!("Failed to record summary for {}: {}", self.state.repository, e);
            }
        }

        Some(SummaryTurn { summary, published })
    }

    fn persist(&self) -> bool {
        let Some(store) = &self.ctx.store else {
            return false;
        };
        match store.save_state(&self.state) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to save state for {}: {}", self.state.repository, e);
                false
            }
        }
    }
}

fn restore_state(repository: &str, store: Option<&StateStore>) -> OrchestratorState {
    let Some(store) = store else {
        return OrchestratorState::new(repository);
    };

    match store.load_state(repository) {
        Ok(Some(mut state)) => {
            let dropped = state.repair();
            if dropped > 0 {
                tracing::warn!("Dropped {} orphaned tag sets for {}", dropped, repository);
            }
            tracing::info!(
                "Restored {} issues for {} from snapshot",
                state.issue_count(),
                repository
            );
            state
        }
        Ok(None) => OrchestratorState::new(repository),
        Err(e) => {
            tracing::warn!("Could not load snapshot for {}, starting empty: {}", repository, e);
            OrchestratorState::new(repository)
        }
    }
}

/// Address of a running actor.
#[derive(Clone)]
pub struct ActorHandle {
    repository: String,
    sender: mpsc::Sender<ActorMessage>,
}

impl ActorHandle {
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ActorMessage,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| Error::ActorStopped(self.repository.clone()))?;
        response
            .await
            .map_err(|_| Error::ActorStopped(self.repository.clone()))
    }

    pub async fn ingest(&self, issue: IssueRecord) -> Result<TurnReport> {
        self.request(|reply| ActorMessage::Ingest {
            issue,
            reply: Some(reply),
        })
        .await
    }

    /// Queues the issue and returns once it is in the mailbox, without
    /// waiting for the turn.
    pub async fn tell(&self, issue: IssueRecord) -> Result<()> {
        self.sender
            .send(ActorMessage::Ingest { issue, reply: None })
            .await
            .map_err(|_| Error::ActorStopped(self.repository.clone()))
    }

    pub async fn summarize(&self) -> Result<Option<SummaryTurn>> {
        self.request(|reply| ActorMessage::Summarize { reply }).await
    }

    pub async fn snapshot(&self) -> Result<OrchestratorState> {
        self.request(|reply| ActorMessage::Snapshot { reply }).await
    }
}
