// src/pipeline/outcome.rs

//! Cycle result types.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::notify::DispatchReport;
use crate::services::{BlockSignal, FetchError};

/// Orchestrator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Running,
    Cancelled,
    Completed,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleState::Idle => "idle",
            CycleState::Running => "running",
            CycleState::Cancelled => "cancelled",
            CycleState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Why a source produced nothing this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFailure {
    Blocked(BlockSignal),
    Error(FetchError),
    /// No adapter registered for the source
    NoAdapter,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFailure::Blocked(signal) => write!(f, "blocked ({signal})"),
            SourceFailure::Error(e) => write!(f, "{e}"),
            SourceFailure::NoAdapter => f.write_str("no adapter registered"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedSource {
    pub name: String,
    pub error: SourceFailure,
}

/// One relevance check result, kept for the cycle report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceDecision {
    pub source: String,
    pub title: String,
    pub url: String,
    pub reason: String,
}

/// Keyword matches and what the relevance check made of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelevanceStats {
    /// Items that passed the keyword policy, before the relevance check
    pub keyword_matched: usize,
    pub approved: Vec<RelevanceDecision>,
    pub rejected: Vec<RelevanceDecision>,
}

impl RelevanceStats {
    /// Whether a relevance check ran at all this cycle.
    pub fn checked(&self) -> bool {
        !self.approved.is_empty() || !self.rejected.is_empty()
    }
}

/// Summary of one monitoring cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// Items first stored during this cycle
    pub new_count: usize,
    /// Previously stored but never notified items sent again
    pub retried_count: usize,
    /// Items marked notified after the dispatch
    pub notified_count: usize,
    pub failed_sources: Vec<FailedSource>,
    /// Enabled sources in the configuration
    pub total_sources: usize,
    /// Sources whose fetch started before the cycle ended
    pub attempted_sources: usize,
    pub state: CycleState,
    pub dispatch: DispatchReport,
    pub relevance: RelevanceStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleOutcome {
    pub(crate) fn started(total_sources: usize) -> Self {
        let now = Utc::now();
        Self {
            new_count: 0,
            retried_count: 0,
            notified_count: 0,
            failed_sources: Vec::new(),
            total_sources,
            attempted_sources: 0,
            state: CycleState::Running,
            dispatch: DispatchReport::default(),
            relevance: RelevanceStats::default(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == CycleState::Cancelled
    }

    /// Items handed to the dispatcher.
    pub fn batch_size(&self) -> usize {
        self.new_count + self.retried_count
    }

    pub fn failed(&self, name: &str) -> Option<&SourceFailure> {
        self.failed_sources
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.error)
    }
}
