//! Per-session summary.

use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::automaton::{StrategyState, Tally};

/// What a session did and how it ended.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// Timestamp-derived identifier, e.g. `20250301_142233`.
    pub run_id: String,
    pub game: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub terminal: StrategyState,
    pub rounds: u32,
    pub wins: u32,
    pub losses: u32,
    pub unknowns: u32,
    pub aborted_rounds: u32,
    pub picks: u32,
    pub best_streak: u32,
    pub cashed_out: bool,
}

impl SessionReport {
    pub fn new(
        game: &str,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        terminal: StrategyState,
        tally: &Tally,
    ) -> Self {
        Self {
            run_id: run_id(started_at),
            game: game.to_string(),
            started_at,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            terminal,
            rounds: tally.rounds,
            wins: tally.wins,
            losses: tally.losses,
            unknowns: tally.unknowns,
            aborted_rounds: tally.aborted_rounds,
            picks: tally.picks,
            best_streak: tally.best_streak,
            cashed_out: tally.cashed_out,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.terminal == StrategyState::TerminalSuccess
    }

    /// Multi-line human summary.
    pub fn to_text(&self) -> String {
        let mut out = format!(
            "run {} ({}): {}\n  rounds: {}  elapsed: {:.1}s\n",
            self.run_id,
            self.game,
            self.terminal,
            self.rounds,
            self.elapsed_ms as f64 / 1000.0
        );
        if self.picks > 0 || self.cashed_out {
            out.push_str(&format!(
                "  picks: {}  aborted rounds: {}  best streak: {}  cashed out: {}\n",
                self.picks,
                self.aborted_rounds,
                self.best_streak,
                if self.cashed_out { "yes" } else { "no" }
            ));
        } else {
            out.push_str(&format!(
                "  wins: {}  losses: {}  unknown: {}  best streak: {}\n",
                self.wins, self.losses, self.unknowns, self.best_streak
            ));
        }
        out
    }
}

/// Local-time run identifier.
pub fn run_id(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y%m%d_%H%M%S").to_string()
}
