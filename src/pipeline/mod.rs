//! Monitoring cycle orchestration.
//!
//! - `monitor`: drives one cycle across all sources
//! - `events`: progress observer hooks
//! - `relevance`: optional secondary classifier
//! - `outcome`: what a cycle reports back

pub mod events;
pub mod monitor;
pub mod outcome;
pub mod relevance;

pub use events::{CycleEvent, CycleObserver, LogObserver, NoopObserver};
pub use monitor::Monitor;
pub use outcome::{
    CycleOutcome, CycleState, FailedSource, RelevanceDecision, RelevanceStats, SourceFailure,
};
pub use relevance::{HttpRelevanceFilter, RelevanceError, RelevanceFilter, Verdict, keep_item};
