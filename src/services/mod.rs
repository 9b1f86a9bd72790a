//! Fetch-side services.
//!
//! This module provides the transport, block detection and the retrying
//! fetch executor used by the cycle orchestrator.

pub mod block;
pub mod fetcher;
pub mod transport;

pub use block::{BlockDetector, BlockSignal};
pub use fetcher::{BackoffDelay, FetchExecutor, FetchOutcome, FetchReport, Pacer};
pub use transport::{FetchError, HttpTransport, RawPayload, Target, Transport};
