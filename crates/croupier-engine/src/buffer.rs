//! In-process observation buffer.
//!
//! `MemoryBuffer` mirrors the page-resident buffer for code that captures
//! results inside the process (and for tests). Its clock is a
//! `tokio::time::Instant` taken at construction, so capture stamps and
//! watermarks share one monotonic time base and follow paused test time.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use croupier_types::{CapturedResult, MatchFilter, Watermark};

use crate::capability::ObservationSource;
use crate::error::EngineError;

/// Ordered, append-only buffer of captured results.
pub struct MemoryBuffer {
    origin: Instant,
    entries: Mutex<Vec<CapturedResult>>,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Milliseconds elapsed on the buffer clock.
    pub fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    /// Decode a play payload and append it, stamped with the current time.
    pub fn record(&self, source_url: &str, payload: Value) -> CapturedResult {
        let entry = CapturedResult::from_payload(source_url, payload, self.now_ms());
        self.append(entry.clone());
        entry
    }

    /// Append an already-built entry.
    pub fn append(&self, entry: CapturedResult) {
        tracing::trace!(outcome = %entry.outcome, at = entry.captured_at_ms, "buffered result");
        self.lock().push(entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<CapturedResult> {
        self.lock().clone()
    }

    /// Synchronous form of [`ObservationSource::pop_match`].
    pub fn take_match(&self, filter: &MatchFilter) -> Option<CapturedResult> {
        let mut entries = self.lock();
        let idx = entries.iter().position(|e| e.matches(filter))?;
        Some(entries.remove(idx))
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CapturedResult>> {
        // Entries are never left half-written, so a poisoned lock is still usable.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObservationSource for MemoryBuffer {
    /// Entries arrive through [`record`](Self::record); nothing to hook.
    async fn install(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn now(&self) -> Result<Watermark, EngineError> {
        Ok(Watermark(self.now_ms()))
    }

    async fn flush(&self) -> Result<(), EngineError> {
        self.clear();
        Ok(())
    }

    async fn pop_match(&self, filter: &MatchFilter) -> Result<Option<CapturedResult>, EngineError> {
        Ok(self.take_match(filter))
    }
}
