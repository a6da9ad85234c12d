//! Bounded polling for the result of an input.
//!
//! The correlator never infers an outcome. It asks the observation source
//! for a match every poll interval until one appears or the deadline
//! passes; `None` means "no determination yet" and is left to the caller.

use std::time::Duration;

use tokio::time::Instant;

use croupier_types::{CapturedResult, CorrelationConfig, MatchFilter, SessionId, Watermark};

use crate::capability::ObservationSource;
use crate::error::EngineError;

/// Matches inputs to captured results on one observation source.
pub struct Correlator<'a> {
    source: &'a dyn ObservationSource,
    poll_interval: Duration,
    timeout: Duration,
    require_result_action: bool,
}

impl<'a> Correlator<'a> {
    pub fn new(
        source: &'a dyn ObservationSource,
        config: &CorrelationConfig,
        require_result_action: bool,
    ) -> Self {
        Self {
            source,
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
            require_result_action,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for the first result captured at or after `since`, optionally
    /// restricted to `session`, using the configured timeout.
    pub async fn wait_match(
        &self,
        since: Watermark,
        session: Option<&SessionId>,
    ) -> Result<Option<CapturedResult>, EngineError> {
        let filter = MatchFilter::since(since)
            .with_session(session.cloned())
            .with_result_action(self.require_result_action);
        self.wait_match_with(&filter, self.timeout).await
    }

    /// Poll for `filter` until it matches or `timeout` elapses.
    ///
    /// Returns no later than `timeout` plus one poll interval (plus the
    /// time of the final pop itself).
    pub async fn wait_match_with(
        &self,
        filter: &MatchFilter,
        timeout: Duration,
    ) -> Result<Option<CapturedResult>, EngineError> {
        let deadline = Instant::now() + timeout;
        let mut polls: u32 = 0;

        loop {
            polls += 1;
            if let Some(hit) = self.source.pop_match(filter).await? {
                tracing::debug!(
                    outcome = %hit.outcome,
                    session = ?hit.session_id,
                    polls,
                    "correlated result"
                );
                return Ok(Some(hit));
            }

            if Instant::now() >= deadline {
                tracing::debug!(since = %filter.since, polls, ?timeout, "no result before deadline");
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
