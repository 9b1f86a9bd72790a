// src/pipeline/monitor.rs

//! Cycle orchestrator.
//!
//! One cycle visits every enabled source in configuration order:
//!
//! 1. fetch each target through the [`FetchExecutor`] and parse payloads
//! 2. keyword match, then the optional relevance check
//! 3. dedup against the store; new items are saved once per source,
//!    stored-but-unnotified items are queued again
//! 4. after the last source, one dispatch for the whole batch, then
//!    `mark_notified` if any channel succeeded
//!
//! Source failures are recorded and never abort the cycle. Only store
//! failures are returned as errors.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::adapters::AdapterRegistry;
use crate::error::Result;
use crate::matcher::KeywordMatcher;
use crate::models::{BidItem, Config, ContentId, FailurePolicy, SourceDescriptor};
use crate::notify::NotificationDispatcher;
use crate::pipeline::relevance::{HttpRelevanceFilter, RelevanceFilter, keep_item};
use crate::pipeline::{
    CycleEvent, CycleObserver, CycleOutcome, CycleState, FailedSource, RelevanceDecision,
    RelevanceStats, SourceFailure,
};
use crate::services::{BlockDetector, FetchExecutor, FetchOutcome, HttpTransport, Pacer};
use crate::storage::BidStore;

/// Result of visiting one source.
enum SourceRun {
    /// Cancelled before the fetch started
    Skipped,
    Fetched {
        items: Vec<BidItem>,
        interrupted: bool,
    },
    Failed(SourceFailure),
}

pub struct Monitor {
    sources: Vec<SourceDescriptor>,
    adapters: AdapterRegistry,
    executor: FetchExecutor,
    matcher: KeywordMatcher,
    store: Arc<dyn BidStore>,
    dispatcher: NotificationDispatcher,
    relevance: Option<(Arc<dyn RelevanceFilter>, FailurePolicy)>,
    max_concurrent_sources: usize,
    state: CycleState,
}

impl Monitor {
    /// Monitor over `sources`. Disabled sources are dropped here.
    pub fn new(
        sources: Vec<SourceDescriptor>,
        adapters: AdapterRegistry,
        executor: FetchExecutor,
        matcher: KeywordMatcher,
        store: Arc<dyn BidStore>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            sources: sources.into_iter().filter(|s| s.enabled).collect(),
            adapters,
            executor,
            matcher,
            store,
            dispatcher,
            relevance: None,
            max_concurrent_sources: 1,
            state: CycleState::Idle,
        }
    }

    /// Build every collaborator from configuration, over the given store.
    pub fn from_config(config: &Config, store: Arc<dyn BidStore>) -> Result<Self> {
        config.validate()?;

        let sources: Vec<_> = config.enabled_sources().cloned().collect();
        let adapters = AdapterRegistry::from_sources(&sources);
        let transport = Arc::new(HttpTransport::new(&config.crawler.user_agent)?);
        let executor = FetchExecutor::new(transport, BlockDetector::from_config(&config.crawler));
        let dispatcher = NotificationDispatcher::from_config(&config.notify)?;

        let mut monitor = Self::new(
            sources,
            adapters,
            executor,
            KeywordMatcher::new(&config.keywords),
            store,
            dispatcher,
        )
        .with_concurrency(config.crawler.max_concurrent_sources);

        if let Some(filter) = HttpRelevanceFilter::from_config(&config.relevance)? {
            monitor = monitor.with_relevance(Arc::new(filter), config.relevance.on_failure);
        }
        Ok(monitor)
    }

    pub fn with_relevance(
        mut self,
        filter: Arc<dyn RelevanceFilter>,
        on_failure: FailurePolicy,
    ) -> Self {
        self.relevance = Some((filter, on_failure));
        self
    }

    /// Fetch up to `n` sources at once. Results are still handled in order.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.max_concurrent_sources = n.max(1);
        self
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn store(&self) -> &Arc<dyn BidStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Run one full cycle.
    ///
    /// Cancellation is checked before each source, between a source's
    /// targets and inside its item loop. Work already committed stands and
    /// the batch collected so far is still dispatched.
    pub async fn run_cycle(
        &mut self,
        cancel: &CancellationToken,
        observer: &dyn CycleObserver,
    ) -> Result<CycleOutcome> {
        self.state = CycleState::Running;
        let result = self.execute(cancel, observer).await;
        self.state = match &result {
            Ok(outcome) => outcome.state,
            Err(e) => {
                log::error!("Cycle aborted: {e}");
                CycleState::Idle
            }
        };
        result
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        observer: &dyn CycleObserver,
    ) -> Result<CycleOutcome> {
        let total = self.sources.len();
        let mut outcome = CycleOutcome::started(total);
        log::info!("Cycle started: {} source(s)", total);

        let mut batch: Vec<BidItem> = Vec::new();
        let mut batch_ids: Vec<ContentId> = Vec::new();
        let mut queued_ids: HashSet<ContentId> = HashSet::new();
        let mut interrupted = false;

        let mut runs = stream::iter(self.sources.iter().enumerate())
            .map(|(index, source)| async move {
                if cancel.is_cancelled() {
                    return (source, SourceRun::Skipped);
                }
                observer.on_progress(index + 1, total, &source.name);
                (source, self.fetch_source(source, cancel).await)
            })
            .buffered(self.max_concurrent_sources);

        while let Some((source, run)) = runs.next().await {
            let items = match run {
                SourceRun::Skipped => {
                    interrupted = true;
                    break;
                }
                SourceRun::Failed(error) => {
                    outcome.attempted_sources += 1;
                    observer.on_event(&CycleEvent::SourceFailed {
                        name: &source.name,
                        error: &error,
                    });
                    outcome.failed_sources.push(FailedSource {
                        name: source.name.clone(),
                        error,
                    });
                    continue;
                }
                SourceRun::Fetched {
                    items,
                    interrupted: cut_short,
                } => {
                    outcome.attempted_sources += 1;
                    interrupted |= cut_short;
                    items
                }
            };

            let candidates = items.len();
            let mut fresh = Vec::new();
            let mut matched = 0;
            let mut queued = 0;
            for item in items {
                if cancel.is_cancelled() {
                    interrupted = true;
                    break;
                }

                let result = self.matcher.matches(&item.title, &item.content);
                if !result.matched {
                    log::trace!("[{}] skip '{}': {:?}", source.name, item.title, result.rejection);
                    continue;
                }
                matched += 1;
                outcome.relevance.keyword_matched += 1;

                if !self
                    .passes_relevance(&item, observer, &mut outcome.relevance)
                    .await
                {
                    continue;
                }

                let id = item.identity();
                if !queued_ids.insert(id.clone()) {
                    continue;
                }
                match self.store.get(&id).await? {
                    None => {
                        fresh.push(item.clone());
                        log::info!("[{}] new: {}", source.name, item.title);
                    }
                    Some(record) if !record.notified => {
                        outcome.retried_count += 1;
                        log::info!("[{}] re-sending: {}", source.name, item.title);
                    }
                    Some(_) => continue,
                }
                batch_ids.push(id);
                batch.push(item);
                queued += 1;
            }

            if !fresh.is_empty() {
                self.store.save_many(&fresh).await?;
                outcome.new_count += fresh.len();
            }

            observer.on_event(&CycleEvent::SourceFinished {
                name: &source.name,
                candidates,
                matched,
                queued,
            });

            if interrupted {
                break;
            }
        }
        drop(runs);

        if !batch.is_empty() {
            let report = self.dispatcher.dispatch(&batch).await;
            if report.any_success() {
                outcome.notified_count = self.store.mark_notified(&batch_ids).await?;
            } else {
                log::warn!(
                    "No channel accepted the batch; {} item(s) stay pending",
                    batch.len()
                );
            }
            observer.on_event(&CycleEvent::DispatchFinished {
                items: batch.len(),
                succeeded: report.succeeded(),
                channels: report.results.len(),
            });
            outcome.dispatch = report;
        }

        outcome.state = if interrupted {
            CycleState::Cancelled
        } else {
            CycleState::Completed
        };
        outcome.finished_at = Utc::now();
        log::info!(
            "Cycle {}: {} new, {} re-sent, {} notified, {}/{} source(s) failed",
            outcome.state,
            outcome.new_count,
            outcome.retried_count,
            outcome.notified_count,
            outcome.failed_sources.len(),
            outcome.attempted_sources
        );
        Ok(outcome)
    }

    /// Fetch and parse every target of one source.
    ///
    /// The source fails only if no target produced a payload: `Blocked` when
    /// any target was blocked, otherwise the last error.
    async fn fetch_source(
        &self,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> SourceRun {
        let Some(adapter) = self.adapters.get(&source.name) else {
            return SourceRun::Failed(SourceFailure::NoAdapter);
        };

        let mut pacer = Pacer::for_source(source);
        let mut items = Vec::new();
        let mut fetched_any = false;
        let mut blocked = None;
        let mut last_error = None;
        let mut interrupted = false;

        let targets = adapter.list_targets(source);
        for (i, target) in targets.iter().enumerate() {
            if i > 0 && cancel.is_cancelled() {
                interrupted = true;
                break;
            }

            let report = tokio::select! {
                report = self.executor.fetch(source, adapter.as_ref(), target, &mut pacer) => report,
                _ = cancel.cancelled() => {
                    interrupted = true;
                    break;
                }
            };

            match report.outcome {
                FetchOutcome::Ok(payload) => {
                    fetched_any = true;
                    match adapter.parse(source, &payload) {
                        Ok(found) => {
                            log::debug!("[{}] {} item(s) from {}", source.name, found.len(), target.url);
                            items.extend(found);
                        }
                        Err(e) => log::warn!("[{}] parse failed for {}: {}", source.name, target.url, e),
                    }
                }
                FetchOutcome::Blocked(signal) => {
                    blocked.get_or_insert(signal);
                }
                FetchOutcome::Error(e) => {
                    log::warn!(
                        "[{}] {} failed after {} attempt(s): {}",
                        source.name,
                        target.url,
                        report.attempts,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        if fetched_any || interrupted || targets.is_empty() {
            return SourceRun::Fetched { items, interrupted };
        }
        match (blocked, last_error) {
            (Some(signal), _) => SourceRun::Failed(SourceFailure::Blocked(signal)),
            (None, Some(e)) => SourceRun::Failed(SourceFailure::Error(e)),
            (None, None) => SourceRun::Fetched { items, interrupted },
        }
    }

    async fn passes_relevance(
        &self,
        item: &BidItem,
        observer: &dyn CycleObserver,
        stats: &mut RelevanceStats,
    ) -> bool {
        let Some((filter, policy)) = &self.relevance else {
            return true;
        };

        let result = filter.check(item).await;
        let keep = keep_item(&result, *policy);
        let reason = match &result {
            Ok(verdict) => verdict.reason.clone(),
            Err(e) => {
                log::warn!("[{}] relevance check failed ({:?}): {}", item.source, policy, e);
                format!("check failed: {e}")
            }
        };

        if keep {
            observer.on_event(&CycleEvent::RelevanceApproved {
                source: &item.source,
                title: &item.title,
                reason: &reason,
            });
        } else {
            observer.on_event(&CycleEvent::RelevanceRejected {
                source: &item.source,
                title: &item.title,
                reason: &reason,
            });
        }

        let decision = RelevanceDecision {
            source: item.source.clone(),
            title: item.title.clone(),
            url: item.url.clone(),
            reason,
        };
        if keep {
            stats.approved.push(decision);
        } else {
            stats.rejected.push(decision);
        }
        keep
    }
}
