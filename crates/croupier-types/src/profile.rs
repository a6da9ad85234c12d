//! Per-game profiles for the strategy automaton.
//!
//! Every supported game runs through the same automaton; what differs is
//! captured here as data: the strategy kind (single-shot or multi-pick),
//! thresholds, round budget, timings, and whether correlation requires the
//! `action == "result"` tag.

use serde::{Deserialize, Serialize};

use crate::config::{DelayRange, KeyBindings};
use crate::TypesError;

// ---------------------------------------------------------------------------
// Input actions
// ---------------------------------------------------------------------------

/// Logical input the automaton can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputAction {
    Bet,
    Pick,
    CashOut,
}

/// Input class: bet and pick drive play forward, cash-out collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputClass {
    Primary,
    Secondary,
}

impl InputAction {
    pub fn class(self) -> InputClass {
        match self {
            InputAction::Bet | InputAction::Pick => InputClass::Primary,
            InputAction::CashOut => InputClass::Secondary,
        }
    }
}

impl std::fmt::Display for InputAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputAction::Bet => write!(f, "bet"),
            InputAction::Pick => write!(f, "pick"),
            InputAction::CashOut => write!(f, "cash-out"),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy kinds
// ---------------------------------------------------------------------------

/// How a game's rounds are played and when the session is won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StrategyKind {
    /// One bet per round, resolved by a single result.
    ///
    /// With a `win_streak_target` the session succeeds after that many
    /// consecutive wins and stops when rounds run out. Without one, the
    /// session plays a fixed number of rounds and completing them is the
    /// objective.
    SingleShot {
        #[serde(default)]
        win_streak_target: Option<u32>,
    },
    /// A bet followed by a sequence of picks; cash out once enough
    /// consecutive picks come back in progress.
    MultiPick {
        streak_target: u32,
        /// Picks per round. A cap below `streak_target` ends every round
        /// without cashing out.
        #[serde(default = "default_max_picks")]
        max_picks: u32,
        /// Correlate the bet itself and only pick when it is in progress.
        #[serde(default)]
        gate_picks_on_bet: bool,
        #[serde(default = "default_pick_resolve")]
        pick_resolve: DelayRange,
        #[serde(default = "default_between_picks")]
        between_picks: DelayRange,
        #[serde(default = "default_before_cash_out")]
        before_cash_out: DelayRange,
    },
}

fn default_max_picks() -> u32 {
    10
}

fn default_pick_resolve() -> DelayRange {
    DelayRange::between(350, 600)
}

fn default_between_picks() -> DelayRange {
    DelayRange::between(1000, 1400)
}

fn default_before_cash_out() -> DelayRange {
    DelayRange::between(600, 1000)
}

// ---------------------------------------------------------------------------
// Timings and opening action
// ---------------------------------------------------------------------------

/// Fixed and randomized pauses around each round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundTiming {
    /// Settle time before the bet input of every round.
    pub pre_action: DelayRange,
    /// Animation/latency floor after the bet input before correlating.
    pub bet_resolve: DelayRange,
    /// Pause between the end of one round and the next.
    pub between_rounds: DelayRange,
    /// Extra pause after a round is aborted by a non-progress pick.
    pub after_abort: DelayRange,
    /// Pause after the objective is met, before the session ends.
    pub finish: DelayRange,
}

impl Default for RoundTiming {
    fn default() -> Self {
        Self {
            pre_action: DelayRange::fixed(1000),
            bet_resolve: DelayRange::between(800, 1000),
            between_rounds: DelayRange::fixed(1000),
            after_abort: DelayRange::fixed(0),
            finish: DelayRange::fixed(0),
        }
    }
}

/// An input performed once before the first round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningAction {
    pub action: InputAction,
    pub settle: DelayRange,
}

// ---------------------------------------------------------------------------
// GameProfile
// ---------------------------------------------------------------------------

/// Complete per-game configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameProfile {
    /// Profile name; filled from the `[games.<name>]` key when loaded.
    #[serde(default)]
    pub name: String,
    pub strategy: StrategyKind,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Only correlate entries tagged `action == "result"`.
    #[serde(default)]
    pub require_result_action: bool,
    #[serde(default)]
    pub opening: Option<OpeningAction>,
    #[serde(default)]
    pub timing: RoundTiming,
    /// Per-game key overrides; the global `[keys]` table applies otherwise.
    #[serde(default)]
    pub keys: Option<KeyBindings>,
}

fn default_max_rounds() -> u32 {
    50
}

impl GameProfile {
    /// Look up a built-in profile by name.
    pub fn builtin(name: &str) -> Option<Self> {
        builtin_profiles().into_iter().find(|p| p.name == name)
    }

    /// Check thresholds and delay ranges.
    pub fn validate(&self) -> Result<(), TypesError> {
        let err = |msg: String| Err(TypesError::ConfigError(format!("game '{}': {msg}", self.name)));

        if self.name.is_empty() {
            return Err(TypesError::ConfigError("game profile has no name".into()));
        }
        if self.max_rounds == 0 {
            return err("max_rounds must be at least 1".into());
        }

        match &self.strategy {
            StrategyKind::SingleShot { win_streak_target } => {
                if *win_streak_target == Some(0) {
                    return err("win_streak_target must be at least 1".into());
                }
            }
            StrategyKind::MultiPick {
                streak_target,
                max_picks,
                pick_resolve,
                between_picks,
                before_cash_out,
                ..
            } => {
                if *streak_target == 0 {
                    return err("streak_target must be at least 1".into());
                }
                if *max_picks == 0 {
                    return err("max_picks must be at least 1".into());
                }
                for (label, range) in [
                    ("pick_resolve", pick_resolve),
                    ("between_picks", between_picks),
                    ("before_cash_out", before_cash_out),
                ] {
                    range.validate(label)?;
                }
            }
        }

        let t = &self.timing;
        for (label, range) in [
            ("timing.pre_action", &t.pre_action),
            ("timing.bet_resolve", &t.bet_resolve),
            ("timing.between_rounds", &t.between_rounds),
            ("timing.after_abort", &t.after_abort),
            ("timing.finish", &t.finish),
        ] {
            range.validate(label)?;
        }
        if let Some(opening) = &self.opening {
            opening.settle.validate("opening.settle")?;
        }
        if let Some(keys) = &self.keys {
            keys.validate()?;
        }
        Ok(())
    }

    pub fn is_multi_pick(&self) -> bool {
        matches!(self.strategy, StrategyKind::MultiPick { .. })
    }
}

/// The built-in game profiles.
pub fn builtin_profiles() -> Vec<GameProfile> {
    vec![
        GameProfile {
            name: "keno".into(),
            strategy: StrategyKind::SingleShot {
                win_streak_target: Some(2),
            },
            max_rounds: 80,
            require_result_action: true,
            opening: Some(OpeningAction {
                action: InputAction::Pick,
                settle: DelayRange::fixed(2000),
            }),
            timing: RoundTiming {
                finish: DelayRange::fixed(3000),
                ..RoundTiming::default()
            },
            keys: None,
        },
        GameProfile {
            name: "diamonds".into(),
            strategy: StrategyKind::SingleShot {
                win_streak_target: None,
            },
            max_rounds: 10,
            require_result_action: true,
            opening: None,
            timing: RoundTiming::default(),
            keys: None,
        },
        GameProfile {
            name: "dragon-tower".into(),
            strategy: StrategyKind::MultiPick {
                streak_target: 4,
                max_picks: 10,
                gate_picks_on_bet: false,
                pick_resolve: DelayRange::between(350, 600),
                between_picks: DelayRange::between(1000, 1400),
                before_cash_out: DelayRange::between(600, 1000),
            },
            max_rounds: 50,
            require_result_action: false,
            opening: None,
            timing: RoundTiming {
                after_abort: DelayRange::between(800, 1200),
                finish: DelayRange::between(2000, 3000),
                ..RoundTiming::default()
            },
            keys: None,
        },
        GameProfile {
            name: "warp-war".into(),
            strategy: StrategyKind::MultiPick {
                streak_target: 2,
                max_picks: 2,
                gate_picks_on_bet: false,
                pick_resolve: DelayRange::between(350, 600),
                between_picks: DelayRange::between(1100, 1500),
                before_cash_out: DelayRange::between(500, 900),
            },
            max_rounds: 20,
            require_result_action: false,
            opening: None,
            timing: RoundTiming {
                finish: DelayRange::between(2000, 3000),
                ..RoundTiming::default()
            },
            keys: None,
        },
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
