//! Capabilities the engine consumes.
//!
//! The automaton and session driver never talk to a browser directly. They
//! see four narrow traits, implemented over DevTools by
//! [`CdpPage`](crate::page::CdpPage) and [`PageObserver`](crate::observer::PageObserver),
//! and by in-memory doubles in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use croupier_types::{CapturedResult, InputAction, MatchFilter, Watermark};

use crate::error::EngineError;

/// Evaluate scripts in the game frame.
#[async_trait]
pub trait PageExecution: Send + Sync {
    /// Evaluate `script` and return its value (promises are awaited).
    async fn evaluate(&self, script: &str) -> Result<Value, EngineError>;
}

/// Deliver logical inputs to the game.
///
/// Implementations own the concrete key for each action and any
/// human-like pacing around the press.
#[async_trait]
pub trait InputChannel: Send + Sync {
    async fn press(&self, action: InputAction) -> Result<(), EngineError>;
}

/// Locate and prepare the game surface.
#[async_trait]
pub trait Navigation: Send + Sync {
    /// Find the frame hosting the game canvas and make it the evaluation
    /// target. Fails if none appears within `timeout`.
    async fn enter_game_frame(&self, timeout: Duration) -> Result<(), EngineError>;

    /// Give the game surface keyboard focus without clicking it.
    async fn focus_surface(&self) -> Result<(), EngineError>;
}

/// A buffer of captured results and the clock its entries are stamped with.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Start capturing. Calling it again must be harmless.
    async fn install(&self) -> Result<(), EngineError>;

    /// Current time on the capture clock.
    async fn now(&self) -> Result<Watermark, EngineError>;

    /// Drop every buffered entry.
    async fn flush(&self) -> Result<(), EngineError>;

    /// Remove and return the first entry, in insertion order, that matches
    /// `filter`. Scan and removal happen as one indivisible step.
    async fn pop_match(&self, filter: &MatchFilter) -> Result<Option<CapturedResult>, EngineError>;
}
