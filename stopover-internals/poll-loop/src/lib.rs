//! Stopover Poll Loop
//! Copyright (c) 2026 Mamy Ratsimbazafy
//! Licensed and distributed under either of
//!   * MIT license (license terms at the root of the package or at http://opensource.org/licenses/MIT).
//!   * Apache v2 license (license terms at the root of the package or at http://www.apache.org/licenses/LICENSE-2.0).
//! at your option. This file may not be copied, modified, or distributed except according to those terms.

//! stopover-internals/poll-loop
//! Bounded polling with early exit and cancellation, and a token bucket for pacing external service calls

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// Why a poll loop stopped without a value
#[derive(Debug, Error)]
pub enum PollError<E> {
    #[error("polling cancelled")]
    Cancelled,
    #[error("attempt {attempt} failed: {source}")]
    Failed {
        attempt: u32,
        #[source]
        source: E,
    },
}

/// A value produced by [`PollSchedule::run`]
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    /// The readiness predicate accepted the value fetched on `attempt`.
    Ready { value: T, attempt: u32 },
    /// No scheduled attempt was ready. `value` comes from the extra fetch
    /// issued after the last scheduled attempt.
    Exhausted { value: T, fetches: u32 },
}

impl<T> PollOutcome<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Ready { value, .. } | Self::Exhausted { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Ready { value, .. } | Self::Exhausted { value, .. } => value,
        }
    }

    /// Total number of fetches issued, including the extra one on exhaustion
    pub fn fetches(&self) -> u32 {
        match self {
            Self::Ready { attempt, .. } => *attempt,
            Self::Exhausted { fetches, .. } => *fetches,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// A fixed attempt budget with linear spacing between attempts
///
/// Attempts are numbered from 1. A failed attempt is skipped unless it is the
/// last scheduled one. After the budget is spent without a ready value, one
/// more fetch is issued and its result returned as is.
///
/// # Examples
///
/// ```ignore
/// let schedule = PollSchedule::new(10, Duration::from_secs(2));
/// let outcome = schedule
///     .run(&cancel, |attempt| client.fetch(attempt), |page| !page.is_empty())
///     .await?;
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSchedule {
    max_attempts: u32,
    interval: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(2),
        }
    }
}

impl PollSchedule {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound on time spent sleeping between fetches
    pub fn max_wait(&self) -> Duration {
        self.interval
            .checked_mul(self.max_attempts)
            .unwrap_or(Duration::MAX)
    }

    /// Drive `fetch` until `is_ready` accepts a value, the budget runs out, or
    /// `cancel` fires.
    ///
    /// `fetch` receives the 1-based attempt number. It is not called once
    /// `cancel` has fired. Both the fetches and the waits between them are
    /// raced against `cancel`.
    pub async fn run<T, E, F, Fut, R>(
        &self,
        cancel: &CancellationToken,
        mut fetch: F,
        is_ready: R,
    ) -> Result<PollOutcome<T>, PollError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&T) -> bool,
    {
        for attempt in 1..=self.max_attempts {
            match until_cancelled(cancel, attempt, &mut fetch).await? {
                Ok(value) if is_ready(&value) => {
                    return Ok(PollOutcome::Ready { value, attempt });
                }
                Ok(_) => {}
                Err(source) if attempt == self.max_attempts => {
                    return Err(PollError::Failed { attempt, source });
                }
                Err(_) => {}
            }

            self.pause(cancel).await?;
        }

        let attempt = self.max_attempts.saturating_add(1);
        match until_cancelled(cancel, attempt, &mut fetch).await? {
            Ok(value) if is_ready(&value) => Ok(PollOutcome::Ready { value, attempt }),
            Ok(value) => Ok(PollOutcome::Exhausted {
                value,
                fetches: attempt,
            }),
            Err(source) => Err(PollError::Failed { attempt, source }),
        }
    }

    async fn pause<E>(&self, cancel: &CancellationToken) -> Result<(), PollError<E>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PollError::Cancelled),
            _ = time::sleep(self.interval) => Ok(()),
        }
    }
}

async fn until_cancelled<T, E, F, Fut>(
    cancel: &CancellationToken,
    attempt: u32,
    fetch: &mut F,
) -> Result<Result<T, E>, PollError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if cancel.is_cancelled() {
        return Err(PollError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PollError::Cancelled),
        res = fetch(attempt) => Ok(res),
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, limit: u32) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        let limit = f64::from(limit);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * limit).min(limit);
        self.last_refill = now;
    }
}

/// Token bucket limiting calls to an external service to a number per second
///
/// Clones share the same bucket.
#[derive(Clone, Debug)]
pub struct QpsLimiter {
    limit: u32,
    bucket: Arc<Mutex<Bucket>>,
}

impl QpsLimiter {
    pub fn new(queries_per_second: u32) -> Self {
        let limit = queries_per_second.max(1);
        Self {
            limit,
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: f64::from(limit),
                last_refill: Instant::now(),
            })),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Wait until a token is available and take it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                bucket.refill(self.limit);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / f64::from(self.limit))
            };
            time::sleep(wait).await;
        }
    }
}
