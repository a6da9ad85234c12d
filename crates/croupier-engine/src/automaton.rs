//! The round state machine shared by every game.
//!
//! Each round follows one skeleton: flush the buffer, pause, take a
//! watermark, bet, wait out the resolve window, then branch on the
//! profile's strategy. Single-shot games read the bet's result directly.
//! Multi-pick games run a pick sub-loop that correlates every pick by the
//! round's session id and cashes out once enough picks in a row come back
//! in progress.
//!
//! Every state does one bounded piece of work in [`Automaton::step`] and
//! names its successor, so the whole session is a sequence of explicit
//! transitions that always ends in `TerminalSuccess` or `TerminalStopped`.

use std::fmt;

use serde::Serialize;

use croupier_types::{
    CapturedResult, CorrelationConfig, GameProfile, InputAction, Outcome, SessionId, StrategyKind,
    Watermark,
};

use crate::capability::{InputChannel, ObservationSource};
use crate::correlator::Correlator;
use crate::error::EngineError;
use crate::pacing::pause;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Where the automaton is in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyState {
    Idle,
    Betting,
    AwaitingBetResult,
    Picking,
    AwaitingPickResult,
    CashingOut,
    RoundComplete,
    TerminalSuccess,
    TerminalStopped,
}

impl StrategyState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StrategyState::TerminalSuccess | StrategyState::TerminalStopped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyState::Idle => "idle",
            StrategyState::Betting => "betting",
            StrategyState::AwaitingBetResult => "awaiting-bet-result",
            StrategyState::Picking => "picking",
            StrategyState::AwaitingPickResult => "awaiting-pick-result",
            StrategyState::CashingOut => "cashing-out",
            StrategyState::RoundComplete => "round-complete",
            StrategyState::TerminalSuccess => "terminal-success",
            StrategyState::TerminalStopped => "terminal-stopped",
        }
    }
}

impl fmt::Display for StrategyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters accumulated over a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    /// Rounds started (bets placed).
    pub rounds: u32,
    pub wins: u32,
    pub losses: u32,
    /// Single-shot rounds with no determination (timeout or unrecognized).
    pub unknowns: u32,
    /// Multi-pick rounds ended by a non-progress pick.
    pub aborted_rounds: u32,
    pub picks: u32,
    /// Current run: consecutive wins (single-shot) or consecutive
    /// in-progress picks this round (multi-pick).
    pub streak: u32,
    pub best_streak: u32,
    pub cashed_out: bool,
}

impl Tally {
    fn extend_streak(&mut self) {
        self.streak += 1;
        self.best_streak = self.best_streak.max(self.streak);
    }
}

// ---------------------------------------------------------------------------
// Automaton
// ---------------------------------------------------------------------------

/// Drives one game session through its rounds.
pub struct Automaton<'a> {
    profile: GameProfile,
    input: &'a dyn InputChannel,
    source: &'a dyn ObservationSource,
    correlator: Correlator<'a>,
    state: StrategyState,
    tally: Tally,
    /// Watermark of the most recent input.
    mark: Option<Watermark>,
    /// Session id carried through the current multi-pick round.
    session: Option<SessionId>,
    picks_this_round: u32,
    round_aborted: bool,
}

impl<'a> Automaton<'a> {
    pub fn new(
        profile: GameProfile,
        input: &'a dyn InputChannel,
        source: &'a dyn ObservationSource,
        correlation: &CorrelationConfig,
    ) -> Self {
        let correlator = Correlator::new(source, correlation, profile.require_result_action);
        Self {
            profile,
            input,
            source,
            correlator,
            state: StrategyState::Idle,
            tally: Tally::default(),
            mark: None,
            session: None,
            picks_this_round: 0,
            round_aborted: false,
        }
    }

    pub fn state(&self) -> StrategyState {
        self.state
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn profile(&self) -> &GameProfile {
        &self.profile
    }

    /// The session id the current round is correlated by, if established.
    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// Step until a terminal state is reached.
    pub async fn run(&mut self) -> Result<StrategyState, EngineError> {
        tracing::info!(
            game = %self.profile.name,
            max_rounds = self.profile.max_rounds,
            "starting strategy"
        );
        while !self.state.is_terminal() {
            self.step().await?;
        }
        tracing::info!(
            game = %self.profile.name,
            outcome = %self.state,
            rounds = self.tally.rounds,
            "strategy finished"
        );
        Ok(self.state)
    }

    /// Perform the current state's work and move to its successor.
    pub async fn step(&mut self) -> Result<StrategyState, EngineError> {
        let next = match self.state {
            StrategyState::Idle => self.on_idle().await?,
            StrategyState::Betting => self.on_betting().await?,
            StrategyState::AwaitingBetResult => self.on_bet_result().await?,
            StrategyState::Picking => self.on_picking().await?,
            StrategyState::AwaitingPickResult => self.on_pick_result().await?,
            StrategyState::CashingOut => self.on_cashing_out().await?,
            StrategyState::RoundComplete => self.on_round_complete().await,
            terminal => terminal,
        };
        tracing::trace!(from = %self.state, to = %next, "transition");
        self.state = next;
        Ok(next)
    }

    async fn on_idle(&mut self) -> Result<StrategyState, EngineError> {
        if let Some(opening) = self.profile.opening.clone() {
            tracing::info!(action = %opening.action, "opening action");
            self.input.press(opening.action).await?;
            pause(&opening.settle).await;
        }
        Ok(StrategyState::Betting)
    }

    async fn on_betting(&mut self) -> Result<StrategyState, EngineError> {
        self.tally.rounds += 1;
        self.session = None;
        self.picks_this_round = 0;
        self.round_aborted = false;
        if self.profile.is_multi_pick() {
            self.tally.streak = 0;
        }
        tracing::info!(round = self.tally.rounds, "===== round {} =====", self.tally.rounds);

        self.source.flush().await?;
        pause(&self.profile.timing.pre_action).await;

        self.mark = Some(self.source.now().await?);
        self.input.press(InputAction::Bet).await?;
        pause(&self.profile.timing.bet_resolve).await;
        Ok(StrategyState::AwaitingBetResult)
    }

    async fn on_bet_result(&mut self) -> Result<StrategyState, EngineError> {
        match self.profile.strategy.clone() {
            StrategyKind::SingleShot { win_streak_target } => {
                let hit = self.correlate(None).await?;
                let outcome = outcome_of(&hit);
                match outcome {
                    Outcome::Win => {
                        self.tally.wins += 1;
                        self.tally.extend_streak();
                    }
                    Outcome::Lose => {
                        self.tally.losses += 1;
                        self.tally.streak = 0;
                    }
                    Outcome::InProgress | Outcome::Unknown => {
                        self.tally.unknowns += 1;
                        self.tally.streak = 0;
                    }
                }
                tracing::info!(
                    round = self.tally.rounds,
                    outcome = %outcome,
                    timed_out = hit.is_none(),
                    streak = self.tally.streak,
                    wins = self.tally.wins,
                    losses = self.tally.losses,
                    "bet resolved"
                );

                if let Some(target) = win_streak_target {
                    if self.tally.streak >= target {
                        tracing::info!(streak = self.tally.streak, "win streak reached");
                        pause(&self.profile.timing.finish).await;
                        return Ok(StrategyState::TerminalSuccess);
                    }
                }
                Ok(StrategyState::RoundComplete)
            }
            StrategyKind::MultiPick {
                gate_picks_on_bet, ..
            } => {
                if !gate_picks_on_bet {
                    return Ok(StrategyState::Picking);
                }
                let hit = self.correlate(None).await?;
                match hit {
                    Some(r) if r.outcome == Outcome::InProgress => {
                        self.session = r.session_id;
                        tracing::info!(session = ?self.session, "bet in progress");
                        Ok(StrategyState::Picking)
                    }
                    other => {
                        tracing::info!(
                            outcome = %outcome_of(&other),
                            timed_out = other.is_none(),
                            "bet did not open a round"
                        );
                        self.tally.aborted_rounds += 1;
                        self.round_aborted = true;
                        Ok(StrategyState::RoundComplete)
                    }
                }
            }
        }
    }

    async fn on_picking(&mut self) -> Result<StrategyState, EngineError> {
        let StrategyKind::MultiPick {
            max_picks,
            pick_resolve,
            ..
        } = self.profile.strategy.clone()
        else {
            return Ok(StrategyState::RoundComplete);
        };

        if self.picks_this_round >= max_picks {
            tracing::info!(picks = self.picks_this_round, "pick cap reached, ending round");
            return Ok(StrategyState::RoundComplete);
        }

        self.picks_this_round += 1;
        self.tally.picks += 1;
        tracing::info!(pick = self.picks_this_round, "pick");

        self.mark = Some(self.source.now().await?);
        self.input.press(InputAction::Pick).await?;
        pause(&pick_resolve).await;
        Ok(StrategyState::AwaitingPickResult)
    }

    async fn on_pick_result(&mut self) -> Result<StrategyState, EngineError> {
        let StrategyKind::MultiPick {
            streak_target,
            between_picks,
            ..
        } = self.profile.strategy.clone()
        else {
            return Ok(StrategyState::RoundComplete);
        };

        let session = self.session.clone();
        let hit = self.correlate(session.as_ref()).await?;
        let outcome = outcome_of(&hit);

        if let Some(r) = &hit {
            if self.session.is_none() {
                self.session = r.session_id.clone();
            }
        }
        tracing::info!(
            pick = self.picks_this_round,
            outcome = %outcome,
            timed_out = hit.is_none(),
            streak = self.tally.streak,
            session = ?self.session,
            "pick resolved"
        );

        if outcome != Outcome::InProgress {
            tracing::info!("round lost, starting over");
            self.tally.streak = 0;
            self.tally.aborted_rounds += 1;
            self.round_aborted = true;
            return Ok(StrategyState::RoundComplete);
        }

        self.tally.extend_streak();
        if self.tally.streak >= streak_target {
            tracing::info!(streak = self.tally.streak, "progress streak reached, cashing out");
            return Ok(StrategyState::CashingOut);
        }

        pause(&between_picks).await;
        Ok(StrategyState::Picking)
    }

    async fn on_cashing_out(&mut self) -> Result<StrategyState, EngineError> {
        if let StrategyKind::MultiPick {
            before_cash_out, ..
        } = &self.profile.strategy
        {
            pause(before_cash_out).await;
        }
        self.input.press(InputAction::CashOut).await?;
        self.tally.cashed_out = true;
        pause(&self.profile.timing.finish).await;
        Ok(StrategyState::TerminalSuccess)
    }

    async fn on_round_complete(&mut self) -> StrategyState {
        if self.tally.rounds >= self.profile.max_rounds {
            return self.rounds_exhausted().await;
        }
        if self.round_aborted {
            pause(&self.profile.timing.after_abort).await;
        }
        pause(&self.profile.timing.between_rounds).await;
        StrategyState::Betting
    }

    /// Terminal state once `max_rounds` have been played.
    ///
    /// A single-shot profile without a win-streak target plays a fixed
    /// number of rounds, so finishing them is success. Every other profile
    /// has an objective it failed to reach.
    async fn rounds_exhausted(&mut self) -> StrategyState {
        match self.profile.strategy {
            StrategyKind::SingleShot {
                win_streak_target: None,
            } => {
                tracing::info!(rounds = self.tally.rounds, "all rounds played");
                pause(&self.profile.timing.finish).await;
                StrategyState::TerminalSuccess
            }
            _ => {
                tracing::info!(rounds = self.tally.rounds, "round budget exhausted");
                StrategyState::TerminalStopped
            }
        }
    }

    async fn correlate(
        &self,
        session: Option<&SessionId>,
    ) -> Result<Option<CapturedResult>, EngineError> {
        let since = self.mark.unwrap_or(Watermark(0.0));
        self.correlator.wait_match(since, session).await
    }
}

/// Outcome of a correlation, with a timeout counting as `Unknown`.
fn outcome_of(hit: &Option<CapturedResult>) -> Outcome {
    hit.as_ref().map_or(Outcome::Unknown, |r| r.outcome)
}
