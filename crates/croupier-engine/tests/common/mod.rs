//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use croupier_browser::BrowserError;
use croupier_engine::{EngineError, InputChannel, MemoryBuffer, Navigation, ObservationSource};
use croupier_types::{
    CapturedResult, CorrelationConfig, DelayRange, GameProfile, InputAction, MatchFilter,
    RoundTiming, StrategyKind, Watermark,
};

pub const PLAY_URL: &str = "https://api.casino.example/v1/play";

/// One network response the game emits after an input.
#[derive(Debug, Clone)]
pub struct Emission {
    pub after: Duration,
    pub payload: Value,
}

/// Responses to a single input, possibly none.
pub type Reaction = Vec<Emission>;

/// A fake game client: every bet or pick consumes the next scripted
/// reaction and appends its payloads to the buffer after their delays.
pub struct ScriptedGame {
    pub buffer: Arc<MemoryBuffer>,
    reactions: Mutex<VecDeque<Reaction>>,
    calls: Mutex<Vec<String>>,
    presses: Mutex<Vec<InputAction>>,
    frame_missing: bool,
}

impl ScriptedGame {
    pub fn new(reactions: Vec<Reaction>) -> Self {
        Self {
            buffer: Arc::new(MemoryBuffer::new()),
            reactions: Mutex::new(reactions.into()),
            calls: Mutex::new(Vec::new()),
            presses: Mutex::new(Vec::new()),
            frame_missing: false,
        }
    }

    /// A page whose game frame never appears.
    pub fn without_frame() -> Self {
        Self {
            frame_missing: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn presses(&self) -> Vec<InputAction> {
        self.presses.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn remaining_reactions(&self) -> usize {
        self.reactions.lock().unwrap().len()
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl InputChannel for ScriptedGame {
    async fn press(&self, action: InputAction) -> Result<(), EngineError> {
        self.log(format!("press:{action}"));
        self.presses.lock().unwrap().push(action);
        if action == InputAction::CashOut {
            return Ok(());
        }

        let reaction = self.reactions.lock().unwrap().pop_front().unwrap_or_default();
        for emission in reaction {
            let buffer = Arc::clone(&self.buffer);
            tokio::spawn(async move {
                if !emission.after.is_zero() {
                    tokio::time::sleep(emission.after).await;
                }
                buffer.record(PLAY_URL, emission.payload);
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Navigation for ScriptedGame {
    async fn enter_game_frame(&self, timeout: Duration) -> Result<(), EngineError> {
        self.log("enter_game_frame");
        if self.frame_missing {
            tokio::time::sleep(timeout).await;
            return Err(BrowserError::FrameNotFound {
                selector: "canvas".into(),
                duration: timeout,
            }
            .into());
        }
        Ok(())
    }

    async fn focus_surface(&self) -> Result<(), EngineError> {
        self.log("focus_surface");
        Ok(())
    }
}

#[async_trait]
impl ObservationSource for ScriptedGame {
    async fn install(&self) -> Result<(), EngineError> {
        self.log("install");
        Ok(())
    }

    async fn now(&self) -> Result<Watermark, EngineError> {
        self.buffer.now().await
    }

    async fn flush(&self) -> Result<(), EngineError> {
        self.log("flush");
        self.buffer.flush().await
    }

    async fn pop_match(&self, filter: &MatchFilter) -> Result<Option<CapturedResult>, EngineError> {
        self.buffer.pop_match(filter).await
    }
}

// ---------------------------------------------------------------------------
// Payload and reaction builders
// ---------------------------------------------------------------------------

/// `{"data": {"action": "result", "result": <result>}}`.
pub fn result_payload(result: &str) -> Value {
    json!({ "data": { "action": "result", "result": result } })
}

/// A pick response carrying a session id.
pub fn pick_payload(result: &str, session: &str) -> Value {
    json!({ "data": { "action": "pick", "result": result, "session_id": session } })
}

/// One payload arriving `ms` after the input.
pub fn after(ms: u64, payload: Value) -> Reaction {
    vec![Emission {
        after: Duration::from_millis(ms),
        payload,
    }]
}

/// The game answers nothing.
pub fn silence() -> Reaction {
    Vec::new()
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

pub fn correlation() -> CorrelationConfig {
    CorrelationConfig::default()
}

/// Single-shot profile with fixed timings.
pub fn single_shot(win_streak_target: Option<u32>, max_rounds: u32) -> GameProfile {
    GameProfile {
        name: "test-single".into(),
        strategy: StrategyKind::SingleShot { win_streak_target },
        max_rounds,
        require_result_action: false,
        opening: None,
        timing: RoundTiming::default(),
        keys: None,
    }
}

/// Multi-pick profile with fixed timings and ungated picks.
pub fn multi_pick(streak_target: u32, max_rounds: u32) -> GameProfile {
    GameProfile {
        name: "test-multi".into(),
        strategy: StrategyKind::MultiPick {
            streak_target,
            max_picks: 10,
            gate_picks_on_bet: false,
            pick_resolve: DelayRange::between(350, 600),
            between_picks: DelayRange::between(1000, 1400),
            before_cash_out: DelayRange::between(600, 1000),
        },
        max_rounds,
        require_result_action: false,
        opening: None,
        timing: RoundTiming {
            after_abort: DelayRange::between(800, 1200),
            ..RoundTiming::default()
        },
        keys: None,
    }
}
