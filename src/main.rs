use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use issuelens::channel::{
    ChannelEvent, Envelope, EventChannel, FallbackPublisher, InMemoryChannel, INSIGHTS_NAMESPACE,
    ISSUES_NAMESPACE,
};
use issuelens::models::{RepositorySummary, StateFilter};
use issuelens::{
    report, ActorContext, CompositeProvider, Config, GitHubClient, IssueRetriever, Orchestrator,
    OrchestratorConfig, StateStore, SubscriptionManager,
};

#[derive(Parser, Debug)]
#[command(name = "issuelens")]
#[command(version = "0.1.0")]
#[command(about = "Tag GitHub issues and summarize a repository's backlog")]
struct Args {
    /// Repository to analyze, as owner/name
    #[arg(short, long)]
    repo: String,

    /// Issue state to fetch (open, closed, all)
    #[arg(short, long, default_value = "all")]
    state: String,

    /// Maximum issues to fetch (defaults to MAX_ISSUES)
    #[arg(long)]
    max_issues: Option<u32>,

    /// Output format (json, text, markdown)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Database path for stored state (defaults to DATABASE_PATH)
    #[arg(long)]
    database: Option<String>,

    /// Use the last stored summary if available
    #[arg(long)]
    cached: bool,

    /// Skip remote language models and use rule-based tagging only
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("issuelens=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::from_env()?;

    let Some((owner, name)) = args.repo.split_once('/') else {
        anyhow::bail!("--repo must look like owner/name, got '{}'", args.repo);
    };
    let repository = args.repo.clone();
    let state: StateFilter = args.state.parse()?;
    let max_issues = args.max_issues.unwrap_or(config.max_issues);

    let database = args
        .database
        .clone()
        .unwrap_or_else(|| config.database_path.clone());
    let store = Arc::new(StateStore::new(&database)?);

    if args.cached {
        if let Some(summary) = store.latest_summary(&repository)? {
            tracing::info!("Using cached summary from {}", summary.generated_at);
            output_summary(&summary, &args)?;
            return Ok(());
        }
        tracing::info!("No cached summary found, performing fresh analysis");
    }

    let github = GitHubClient::new(config.github_token.as_deref())?
        .with_base_url(config.github_api_url.clone());
    let retriever = IssueRetriever::new(Arc::new(github));

    tracing::info!("Fetching up to {} {} issues from {}", max_issues, state, repository);
    let retrieval = retriever
        .fetch_with_report(owner, name, max_issues, state)
        .await;
    tracing::info!(
        "Retrieved {} issues ({} listed, {} searched, {} probed, {} failed calls)",
        retrieval.issues.len(),
        retrieval.from_listing,
        retrieval.from_search,
        retrieval.from_probing,
        retrieval.failures
    );

    if retrieval.issues.is_empty() {
        println!("No issues found for {}", repository);
        return Ok(());
    }

    let llm = if args.offline {
        CompositeProvider::offline_only()
    } else {
        CompositeProvider::from_config(&config)?
    };

    let orchestrator_config = OrchestratorConfig::from(&config);
    let primary = Arc::new(InMemoryChannel::new("primary"));
    let alternate = Arc::new(InMemoryChannel::new("alternate"));
    let publisher = FallbackPublisher::new(primary.clone()).with_alternate(alternate.clone());

    let ctx = ActorContext::new(
        Arc::new(llm),
        publisher,
        Some(store.clone()),
        &orchestrator_config,
    );
    let orchestrator = Orchestrator::new(ctx);

    let subscriptions = Arc::new(SubscriptionManager::new(
        primary.clone(),
        ISSUES_NAMESPACE,
        orchestrator.clone(),
    ));
    subscriptions.ensure_subscribed().await?;
    let watchdog = subscriptions.spawn_watchdog(
        orchestrator_config.resubscribe_delay,
        orchestrator_config.resubscribe_interval,
    );

    let insight_channels: Vec<Arc<dyn EventChannel>> = vec![primary.clone(), alternate.clone()];
    let mut processed = watch_tagged_issues(&insight_channels, &repository).await?;

    let total = retrieval.issues.len() as u64;
    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] processed {pos} of {len} issues",
            )?
            .progress_chars("#>-"),
    );

    for issue in retrieval.issues {
        if let Err(e) = primary.publish(Envelope::issue_ingested(issue.clone())).await {
            tracing::warn!("Ingestion publish failed ({}), handing {} over directly", e, issue.id);
            orchestrator.ingest(issue).await?;
        }
    }

    // Each issue costs at most one tag round plus one summary round.
    let wait = orchestrator_config.tag_timeout
        + orchestrator_config.recommendation_timeout
        + Duration::from_secs(5);
    let mut seen = HashSet::new();
    while (seen.len() as u64) < total {
        match tokio::time::timeout(wait, processed.recv()).await {
            Ok(Some(issue_id)) => {
                if seen.insert(issue_id) {
                    progress.inc(1);
                }
            }
            Ok(None) => break,
            Err(_) => {
                tracing::warn!("No progress for {:?}, continuing with {} of {}", wait, seen.len(), total);
                break;
            }
        }
    }
    progress.finish_and_clear();

    let summary = orchestrator.summarize(&repository).await?;
    watchdog.abort();
    subscriptions.shutdown().await;

    match summary {
        Some(turn) => output_summary(&turn.summary, &args)?,
        None => println!("No issues found for {}", repository),
    }

    Ok(())
}

/// Forwards the ids of issues whose tags were published for `repository`,
/// from every given channel.
async fn watch_tagged_issues(
    channels: &[Arc<dyn EventChannel>],
    repository: &str,
) -> anyhow::Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();

    for channel in channels {
        let subscription = channel.subscribe(INSIGHTS_NAMESPACE).await?;
        let tx = tx.clone();
        let repository = repository.to_string();
        tokio::spawn(async move {
            while let Some(envelope) = subscription.recv().await {
                if let ChannelEvent::TagsExtracted {
                    repository: repo,
                    issue_id,
                    ..
                } = envelope.event
                {
                    if repo == repository && tx.send(issue_id).is_err() {
                        break;
                    }
                }
            }
        });
    }

    Ok(rx)
}

fn output_summary(summary: &RepositorySummary, args: &Args) -> anyhow::Result<()> {
    let output = report::render(summary, &args.format)?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &output)?;
        tracing::info!("Output written to: {}", path);
    } else {
        println!("{}", output);
    }

    Ok(())
}
