//! Session driver: from an attached page to a terminal state.

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use croupier_types::{CorrelationConfig, GameProfile};

use crate::automaton::Automaton;
use crate::capability::{InputChannel, Navigation, ObservationSource};
use crate::error::EngineError;
use crate::report::SessionReport;

/// Runs one game session over a set of capabilities.
///
/// Enters the game frame, focuses the canvas without clicking, installs
/// the observer, and runs the automaton until it terminates. Any
/// capability failure aborts the session and is returned as-is.
pub struct SessionDriver<'a> {
    navigation: &'a dyn Navigation,
    input: &'a dyn InputChannel,
    source: &'a dyn ObservationSource,
    profile: GameProfile,
    correlation: CorrelationConfig,
    frame_load_timeout: Duration,
}

impl<'a> SessionDriver<'a> {
    pub fn new(
        navigation: &'a dyn Navigation,
        input: &'a dyn InputChannel,
        source: &'a dyn ObservationSource,
        profile: GameProfile,
        correlation: CorrelationConfig,
        frame_load_timeout: Duration,
    ) -> Self {
        Self {
            navigation,
            input,
            source,
            profile,
            correlation,
            frame_load_timeout,
        }
    }

    pub async fn run(self) -> Result<SessionReport, EngineError> {
        self.profile.validate()?;

        let started_at = Utc::now();
        let clock = Instant::now();
        tracing::info!(game = %self.profile.name, "session starting");

        self.navigation
            .enter_game_frame(self.frame_load_timeout)
            .await?;
        self.navigation.focus_surface().await?;
        self.source.install().await?;

        let game = self.profile.name.clone();
        let mut automaton =
            Automaton::new(self.profile, self.input, self.source, &self.correlation);
        let terminal = automaton.run().await?;

        let report = SessionReport::new(&game, started_at, clock.elapsed(), terminal, automaton.tally());
        tracing::info!(
            run_id = %report.run_id,
            game = %report.game,
            outcome = %report.terminal,
            rounds = report.rounds,
            "session finished"
        );
        Ok(report)
    }
}
