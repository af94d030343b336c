//!  Stopover Flight Search
//!
//!  Copyright (C) 2026  Mamy Ratsimbazafy
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Polling Orchestrator
//!
//! Repeats [`AviasalesClient::fetch_once`] until proposals show up, the
//! attempt budget runs out, or the caller cancels.

use std::time::{Duration, Instant};

use stopover_poll_loop::{PollOutcome, PollSchedule};
use tokio_util::sync::CancellationToken;

use crate::flights_error::FlightSearchError;
use crate::flights_models::{SearchRequest, SearchResult, SearchSession};
use crate::flights_search::AviasalesClient;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Proposals were found on `attempt` (1-based).
    Ready { attempt: u32 },
    /// Every scheduled attempt came back empty. The result is whatever the
    /// extra fetch after the last attempt returned.
    ExhaustedNoProposals,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    pub result: SearchResult,
    pub status: PollStatus,
    /// Fetches issued, including the extra one on exhaustion
    pub fetches: u32,
}

impl PollReport {
    pub fn is_exhausted(&self) -> bool {
        self.status == PollStatus::ExhaustedNoProposals
    }
}

impl AviasalesClient {
    /// Poll `session` until it has proposals.
    ///
    /// Fetch errors are logged and skipped, except on the last scheduled
    /// attempt where the error is returned. Once all `max_attempts` come back
    /// empty, one more fetch is made and its (possibly empty) result returned
    /// with [`PollStatus::ExhaustedNoProposals`]. Cancelling `cancel` stops
    /// both in-flight fetches and waits with [`FlightSearchError::Cancelled`].
    pub async fn poll_until_ready(
        &self,
        session: &SearchSession,
        max_attempts: u32,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<PollReport, FlightSearchError> {
        let schedule = PollSchedule::new(max_attempts, interval);
        let start = Instant::now();
        tracing::info!(
            "[poll_until_ready] Search ID: {}, up to {} attempts every {:?}",
            session,
            max_attempts,
            interval
        );

        let outcome = schedule
            .run(
                cancel,
                |attempt| async move {
                    if attempt > max_attempts {
                        tracing::debug!(
                            "[poll_until_ready] Search ID: {}, budget spent, final fetch",
                            session
                        );
                    }
                    let fetched = self.fetch_once(session).await;
                    match &fetched {
                        Err(e) => tracing::warn!(
                            attempt,
                            search_id = %session,
                            kind = e.kind(),
                            "[poll_until_ready] Fetch failed: {}",
                            e
                        ),
                        Ok(result) if result.is_empty() => tracing::debug!(
                            "[poll_until_ready] Search ID: {}, attempt {}: no proposals yet",
                            session,
                            attempt
                        ),
                        Ok(_) => {}
                    }
                    fetched
                },
                |result: &SearchResult| !result.is_empty(),
            )
            .await;

        let report = match outcome {
            Ok(PollOutcome::Ready { value, attempt }) => PollReport {
                result: value,
                status: PollStatus::Ready { attempt },
                fetches: attempt,
            },
            Ok(PollOutcome::Exhausted { value, fetches }) => PollReport {
                result: value,
                status: PollStatus::ExhaustedNoProposals,
                fetches,
            },
            Err(err) => {
                tracing::warn!(
                    "[poll_until_ready] Search ID: {}, stopped after {:?}: {}",
                    session,
                    start.elapsed(),
                    err
                );
                return Err(err.into());
            }
        };

        match report.status {
            PollStatus::Ready { attempt } => tracing::info!(
                "[poll_until_ready] Search ID: {}, {} proposals on attempt {} in {:?}",
                session,
                report.result.len(),
                attempt,
                start.elapsed()
            ),
            PollStatus::ExhaustedNoProposals => tracing::info!(
                "[poll_until_ready] Search ID: {}, no proposals after {} fetches in {:?}",
                session,
                report.fetches,
                start.elapsed()
            ),
        }
        Ok(report)
    }

    /// [`AviasalesClient::poll_until_ready`] with the default budget of
    /// 10 attempts, 2 seconds apart.
    pub async fn poll_with_defaults(
        &self,
        session: &SearchSession,
        cancel: &CancellationToken,
    ) -> Result<PollReport, FlightSearchError> {
        self.poll_until_ready(session, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, cancel)
            .await
    }

    /// Initiate a search, then poll it with the default budget.
    pub async fn search(
        &self,
        request: SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<(SearchSession, PollReport), FlightSearchError> {
        let session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FlightSearchError::Cancelled),
            session = self.initiate(request) => session?,
        };
        let report = self.poll_with_defaults(&session, cancel).await?;
        Ok((session, report))
    }
}
