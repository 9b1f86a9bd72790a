// src/services/fetcher.rs

//! Fetch executor.
//!
//! Wraps one adapter fetch with bounded retry, exponential backoff with
//! jitter, per-source pacing and block detection. Every failure comes back
//! as a classified [`FetchOutcome`]; nothing is raised.
//!
//! ## Retry policy
//!
//! A request gets `max_retries` attempts (at least one). Transport errors,
//! non-success statuses and malformed payloads are retried. The delay before
//! retry `n` (counting from 1) is `backoff_base * 2^n + uniform(0, backoff_base)`.
//! A detected block ends the fetch immediately: retrying against an active
//! block only raises the chance of being flagged.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::adapters::SourceAdapter;
use crate::models::{DelayRange, SourceDescriptor};
use crate::services::{BlockDetector, BlockSignal, FetchError, RawPayload, Target, Transport};

/// Highest backoff exponent; keeps the shift from overflowing.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Classified result of fetching one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Ok(RawPayload),
    Blocked(BlockSignal),
    Error(FetchError),
}

impl FetchOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, FetchOutcome::Ok(_))
    }
}

/// One backoff wait, split into its deterministic and random parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffDelay {
    pub base: Duration,
    pub jitter: Duration,
}

impl BackoffDelay {
    pub fn total(&self) -> Duration {
        self.base.saturating_add(self.jitter)
    }
}

/// Outcome of a fetch plus what it took to get there.
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub outcome: FetchOutcome,
    pub attempts: u32,
    /// Backoff waits taken between attempts, in order
    pub backoff: Vec<BackoffDelay>,
}

/// Enforces a minimum gap between consecutive requests to one source.
///
/// The gap is drawn after each attempt as `base + uniform(0, jitter)` and
/// waited out before the next request, regardless of retry backoff.
#[derive(Debug)]
pub struct Pacer {
    delay: DelayRange,
    next_allowed: Option<Instant>,
}

impl Pacer {
    pub fn new(delay: DelayRange) -> Self {
        Self {
            delay,
            next_allowed: None,
        }
    }

    pub fn for_source(source: &SourceDescriptor) -> Self {
        Self::new(source.delay)
    }

    /// Wait until the next request to this source is allowed.
    pub async fn wait(&mut self) {
        if let Some(at) = self.next_allowed {
            tokio::time::sleep_until(at).await;
        }
    }

    /// Record that a request just finished.
    pub fn mark(&mut self) {
        let gap_ms = self
            .delay
            .base_ms
            .saturating_add(random_up_to(self.delay.jitter_ms))
            .min(DelayRange::MAX_MS);
        let now = Instant::now();
        self.next_allowed = now.checked_add(Duration::from_millis(gap_ms)).or(Some(now));
    }
}

/// Runs fetches for every source through one transport.
#[derive(Clone)]
pub struct FetchExecutor {
    transport: Arc<dyn Transport>,
    detector: BlockDetector,
}

impl FetchExecutor {
    pub fn new(transport: Arc<dyn Transport>, detector: BlockDetector) -> Self {
        Self {
            transport,
            detector,
        }
    }

    /// Fetch one target of `source`, retrying as its policy allows.
    pub async fn fetch(
        &self,
        source: &SourceDescriptor,
        adapter: &dyn SourceAdapter,
        target: &Target,
        pacer: &mut Pacer,
    ) -> FetchReport {
        let attempts = source.attempts();
        let mut backoff = Vec::new();
        let mut last_error = FetchError::Transport("no attempt made".into());

        for attempt in 1..=attempts {
            pacer.wait().await;
            let result = adapter.fetch(self.transport.as_ref(), source, target).await;
            pacer.mark();

            let error = match result.and_then(|payload| self.classify(source, adapter, payload)) {
                Ok(Classified::Payload(payload)) => {
                    return FetchReport {
                        outcome: FetchOutcome::Ok(payload),
                        attempts: attempt,
                        backoff,
                    };
                }
                Ok(Classified::Blocked(signal)) => {
                    log::warn!("[{}] blocked at {}: {}", source.name, target.url, signal);
                    return FetchReport {
                        outcome: FetchOutcome::Blocked(signal),
                        attempts: attempt,
                        backoff,
                    };
                }
                Err(error) => error,
            };

            log::warn!(
                "[{}] attempt {}/{} for {} failed: {}",
                source.name,
                attempt,
                attempts,
                target.url,
                error
            );
            last_error = error;

            if attempt < attempts {
                let delay = backoff_delay(source.backoff_base_ms, attempt);
                log::debug!(
                    "[{}] retrying in {:.1}s",
                    source.name,
                    delay.total().as_secs_f64()
                );
                tokio::time::sleep(delay.total()).await;
                backoff.push(delay);
            }
        }

        FetchReport {
            outcome: FetchOutcome::Error(last_error),
            attempts,
            backoff,
        }
    }

    fn classify(
        &self,
        source: &SourceDescriptor,
        adapter: &dyn SourceAdapter,
        payload: RawPayload,
    ) -> Result<Classified, FetchError> {
        if source.is_block_exempt() {
            log::debug!(
                "[{}] block detection skipped for {} access",
                source.name,
                source.mode().as_str()
            );
        } else if let Some(signal) = self.detector.inspect(&payload) {
            return Ok(Classified::Blocked(signal));
        }

        if !payload.is_success() {
            return Err(FetchError::Status(payload.status));
        }

        adapter.check_payload(&payload)?;
        Ok(Classified::Payload(payload))
    }
}

enum Classified {
    Payload(RawPayload),
    Blocked(BlockSignal),
}

/// Backoff before retry number `attempt` (counting from 1).
pub fn backoff_delay(base_ms: u64, attempt: u32) -> BackoffDelay {
    let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
    let base = base_ms.saturating_mul(1u64 << exponent);
    BackoffDelay {
        base: Duration::from_millis(base),
        jitter: Duration::from_millis(random_up_to(base_ms)),
    }
}

fn random_up_to(max_ms: u64) -> u64 {
    if max_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=max_ms)
    }
}
