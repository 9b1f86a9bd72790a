// src/pipeline/events.rs

//! Progress reporting for a running cycle.
//!
//! Observers are advisory. They cannot influence the cycle.

use crate::pipeline::SourceFailure;

/// Something that happened while a cycle ran.
#[derive(Debug, Clone)]
pub enum CycleEvent<'a> {
    SourceFinished {
        name: &'a str,
        candidates: usize,
        matched: usize,
        queued: usize,
    },
    SourceFailed {
        name: &'a str,
        error: &'a SourceFailure,
    },
    RelevanceApproved {
        source: &'a str,
        title: &'a str,
        reason: &'a str,
    },
    RelevanceRejected {
        source: &'a str,
        title: &'a str,
        reason: &'a str,
    },
    DispatchFinished {
        items: usize,
        succeeded: usize,
        channels: usize,
    },
}

pub trait CycleObserver: Send + Sync {
    /// Called before a source's fetch starts. `index` counts from 1.
    fn on_progress(&self, _index: usize, _total: usize, _name: &str) {}

    fn on_event(&self, _event: &CycleEvent<'_>) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl CycleObserver for NoopObserver {}

/// Observer that writes progress and events to the log.
pub struct LogObserver;

impl CycleObserver for LogObserver {
    fn on_progress(&self, index: usize, total: usize, name: &str) {
        log::info!("[{index}/{total}] {name}");
    }

    fn on_event(&self, event: &CycleEvent<'_>) {
        match event {
            CycleEvent::SourceFinished {
                name,
                candidates,
                matched,
                queued,
            } => log::info!(
                "[{name}] {candidates} candidate(s), {matched} matched, {queued} queued"
            ),
            CycleEvent::SourceFailed { name, error } => log::warn!("[{name}] failed: {error}"),
            CycleEvent::RelevanceApproved {
                source,
                title,
                reason,
            } => log::debug!("[{source}] relevance ✓ '{title}' ({reason})"),
            CycleEvent::RelevanceRejected {
                source,
                title,
                reason,
            } => log::info!("[{source}] relevance ✗ '{title}' ({reason})"),
            CycleEvent::DispatchFinished {
                items,
                succeeded,
                channels,
            } => log::info!("Dispatched {items} item(s): {succeeded}/{channels} channel(s) ok"),
        }
    }
}
