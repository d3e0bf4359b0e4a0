use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{Error, ErrorKind};
use crate::github::heuristics::{
    closed_single_query, confirmation_query, general_search_query, interest_score,
    is_authored_by, is_genuine_issue,
};
use crate::github::paginator::MAX_PER_PAGE;
use crate::github::sampling::{clamp_highest_number, SamplingPlan};
use crate::github::tracker::IssueTracker;
use crate::models::{GitHubIssue, IssueRecord, StateFilter};

/// Listing never walks further than this many pages.
pub const MAX_LISTING_PAGES: u32 = 10;

const PROBE_BATCH: usize = 10;
const CONFIRMATION_PAGE: u32 = 10;

/// What one retrieval produced, and how.
#[derive(Debug, Clone, Default)]
pub struct RetrievalReport {
    pub issues: Vec<IssueRecord>,
    pub from_listing: usize,
    pub from_search: usize,
    pub from_probing: usize,
    /// Tracker calls that failed for reasons other than a missing issue.
    pub failures: usize,
}

/// Multi-tier, failure-tolerant issue retrieval.
///
/// Tiers run in order (paginated listing, full-text search, probe-by-number)
/// and feed one accumulator keyed by issue id. Tracker errors are logged and
/// only shrink the result; nothing is propagated to the caller.
pub struct IssueRetriever {
    tracker: Arc<dyn IssueTracker>,
}

impl IssueRetriever {
    pub fn new(tracker: Arc<dyn IssueTracker>) -> Self {
        Self { tracker }
    }

    pub async fn fetch_issues(
        &self,
        owner: &str,
        repo: &str,
        max_count: u32,
        state: StateFilter,
    ) -> Vec<IssueRecord> {
        self.fetch_with_report(owner, repo, max_count, state)
            .await
            .issues
    }

    pub async fn fetch_with_report(
        &self,
        owner: &str,
        repo: &str,
        max_count: u32,
        state: StateFilter,
    ) -> RetrievalReport {
        let mut report = RetrievalReport::default();
        if max_count == 0 {
            return report;
        }

        match self.tracker.get_repository(owner, repo).await {
            Ok(info) if !info.has_issues => {
                tracing::info!("{}/{} has issues disabled", owner, repo);
                return report;
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Repository {}/{} not found", owner, repo);
                return report;
            }
            Err(e) => {
                tracing::warn!("Repository check for {}/{} failed: {}", owner, repo, e);
                report.failures += 1;
            }
        }

        let max = max_count as usize;
        let mut acc = IssueAccumulator::new(format!("{}/{}", owner, repo));
        let mut ctx = TierContext {
            owner,
            repo,
            max,
            state,
            failures: 0,
        };

        if state == StateFilter::Closed && max == 1 {
            let before = acc.len();
            self.closed_single(&mut ctx, &mut acc).await;
            report.from_search += acc.len() - before;
        }

        if acc.len() < max {
            let before = acc.len();
            self.list_tier(&mut ctx, &mut acc).await;
            report.from_listing += acc.len() - before;
        }

        if acc.len() < max || (state == StateFilter::All && acc.is_empty()) {
            let before = acc.len();
            self.search_tier(&mut ctx, &mut acc).await;
            report.from_search += acc.len() - before;
        }

        if acc.len() * 2 < max {
            let before = acc.len();
            self.probe_tier(&mut ctx, &mut acc).await;
            report.from_probing += acc.len() - before;
        }

        let issues = self.post_process(&mut ctx, acc).await;
        report.failures += ctx.failures;
        tracing::info!(
            "Retrieved {} issue(s) from {}/{} (listing {}, search {}, probing {}, failures {})",
            issues.len(),
            owner,
            repo,
            report.from_listing,
            report.from_search,
            report.from_probing,
            report.failures
        );
        report.issues = issues;
        report
    }

    async fn list_tier(&self, ctx: &mut TierContext<'_>, acc: &mut IssueAccumulator) {
        let per_page = (ctx.max as u32).clamp(1, MAX_PER_PAGE);

        for page in 1..=MAX_LISTING_PAGES {
            let result = self
                .tracker
                .list_issues(ctx.owner, ctx.repo, ctx.state, page, per_page)
                .await;
            let page = match result {
                Ok(page) => page,
                Err(e) => {
                    ctx.absorb("listing", e);
                    break;
                }
            };

            // Whole pages are kept; overflow is trimmed by interest ranking.
            for raw in page.items {
                acc.offer(raw);
            }

            if !page.has_next || acc.len() >= ctx.max {
                break;
            }
        }
    }

    async fn search_tier(&self, ctx: &mut TierContext<'_>, acc: &mut IssueAccumulator) {
        let query = general_search_query(ctx.owner, ctx.repo, ctx.state);
        let per_page = (ctx.max as u32).clamp(1, MAX_PER_PAGE);

        match self.tracker.search_issues(&query, per_page).await {
            Ok(response) => {
                for raw in response.items {
                    if ctx.state.matches(raw.issue_state()) {
                        acc.offer(raw);
                    }
                }
            }
            Err(e) => ctx.absorb("search", e),
        }
    }

    /// Single closed issue: search with extra author/label heuristics, then
    /// double-check the candidate with a second search before accepting it.
    async fn closed_single(&self, ctx: &mut TierContext<'_>, acc: &mut IssueAccumulator) {
        let query = closed_single_query(ctx.owner, ctx.repo);
        let candidates = match self.tracker.search_issues(&query, CONFIRMATION_PAGE).await {
            Ok(response) => response.items,
            Err(e) => {
                ctx.absorb("closed-issue search", e);
                return;
            }
        };

        for candidate in candidates {
            if !is_genuine_issue(&candidate)
                || !StateFilter::Closed.matches(candidate.issue_state())
                || is_authored_by(&candidate, ctx.owner)
            {
                continue;
            }
            if self.confirm(ctx, &candidate).await {
                acc.offer(candidate);
                return;
            }
        }
    }

    async fn probe_tier(&self, ctx: &mut TierContext<'_>, acc: &mut IssueAccumulator) {
        let highest = match self.estimate_highest_number(ctx).await {
            Some(highest) => highest,
            None => {
                tracing::debug!("{}/{} has no issues to probe", ctx.owner, ctx.repo);
                return;
            }
        };

        let plan = SamplingPlan::build(highest, &mut StdRng::from_entropy());
        tracing::info!(
            "Probing up to {} issue numbers in {}/{} ({:?} repository, highest #{})",
            plan.numbers.len(),
            ctx.owner,
            ctx.repo,
            plan.scale,
            highest
        );

        for batch in plan.numbers.chunks(PROBE_BATCH) {
            if acc.len() >= ctx.max {
                break;
            }

            let (owner, repo) = (ctx.owner, ctx.repo);
            let fetches = batch
                .iter()
                .map(|number| self.tracker.get_issue(owner, repo, *number));
            let results = join_all(fetches).await;

            for (number, result) in batch.iter().zip(results) {
                if acc.len() >= ctx.max {
                    break;
                }
                match result {
                    Ok(raw) => {
                        if !is_genuine_issue(&raw) || !ctx.state.matches(raw.issue_state()) {
                            continue;
                        }
                        if ctx.max == 1 && !self.confirm(ctx, &raw).await {
                            continue;
                        }
                        acc.offer(raw);
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        tracing::debug!("Issue #{} not found", number);
                    }
                    Err(e) => ctx.absorb("probe", e),
                }
            }
        }
    }

    /// `None` when the tracker reports no issues or pull requests at all.
    async fn estimate_highest_number(&self, ctx: &mut TierContext<'_>) -> Option<u32> {
        let result = self
            .tracker
            .list_issues(ctx.owner, ctx.repo, StateFilter::All, 1, 1)
            .await;
        match result {
            Ok(page) => match page.items.first() {
                Some(latest) => Some(clamp_highest_number(Some(latest.number))),
                None => None,
            },
            Err(e) => {
                ctx.absorb("highest-number lookup", e);
                Some(clamp_highest_number(None))
            }
        }
    }

    async fn confirm(&self, ctx: &mut TierContext<'_>, candidate: &GitHubIssue) -> bool {
        let state = StateFilter::from(candidate.issue_state());
        let query = confirmation_query(ctx.owner, ctx.repo, state, &candidate.title);
        match self.tracker.search_issues(&query, CONFIRMATION_PAGE).await {
            Ok(response) => {
                let confirmed = response
                    .items
                    .iter()
                    .any(|item| item.number == candidate.number && !item.is_pull_request());
                if !confirmed {
                    tracing::debug!("Issue #{} failed search confirmation", candidate.number);
                }
                confirmed
            }
            Err(e) => {
                ctx.absorb("confirmation search", e);
                false
            }
        }
    }

    async fn post_process(
        &self,
        ctx: &mut TierContext<'_>,
        acc: IssueAccumulator,
    ) -> Vec<IssueRecord> {
        let repository = acc.repository.clone();
        let mut issues = acc.into_issues();

        if let Some(wanted) = ctx.state.state() {
            let before = issues.len();
            issues.retain(|issue| issue.state == wanted);

            if issues.is_empty() && before > 0 {
                tracing::warn!(
                    "State filter removed every result, retrying direct {} listing",
                    wanted
                );
                let per_page = (ctx.max as u32).clamp(1, MAX_PER_PAGE);
                match self
                    .tracker
                    .list_issues(ctx.owner, ctx.repo, ctx.state, 1, per_page)
                    .await
                {
                    Ok(page) => {
                        let mut retry = IssueAccumulator::new(repository);
                        for raw in page.items {
                            if raw.issue_state() == wanted {
                                retry.offer(raw);
                            }
                        }
                        issues = retry.into_issues();
                    }
                    Err(e) => ctx.absorb("direct state listing", e),
                }
            }
        }

        if issues.len() > ctx.max {
            issues.sort_by_key(|issue| std::cmp::Reverse(interest_score(issue)));
            issues.truncate(ctx.max);
        }

        sort_for_display(&mut issues);
        issues
    }
}

/// Open before closed, then newest first.
pub fn sort_for_display(issues: &mut [IssueRecord]) {
    issues.sort_by(|a, b| {
        b.is_open()
            .cmp(&a.is_open())
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

struct TierContext<'a> {
    owner: &'a str,
    repo: &'a str,
    max: usize,
    state: StateFilter,
    failures: usize,
}

impl TierContext<'_> {
    fn absorb(&mut self, stage: &str, error: Error) {
        self.failures += 1;
        tracing::warn!(
            "{} for {}/{} failed ({:?}): {}",
            stage,
            self.owner,
            self.repo,
            error.kind(),
            error
        );
    }
}

/// Deduplicating collector shared by all tiers. Pull requests never get in.
struct IssueAccumulator {
    repository: String,
    seen: HashSet<String>,
    issues: Vec<IssueRecord>,
}

impl IssueAccumulator {
    fn new(repository: String) -> Self {
        Self {
            repository,
            seen: HashSet::new(),
            issues: Vec::new(),
        }
    }

    fn offer(&mut self, raw: GitHubIssue) -> bool {
        if raw.is_pull_request() {
            return false;
        }
        let record = raw.into_record(&self.repository);
        if !self.seen.insert(record.id.clone()) {
            return false;
        }
        self.issues.push(record);
        true
    }

    fn len(&self) -> usize {
        self.issues.len()
    }

    fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    fn into_issues(self) -> Vec<IssueRecord> {
        self.issues
    }
}
