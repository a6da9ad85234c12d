//! `croupier profiles`: list the games that can be played.

use std::path::Path;

use croupier_types::{CroupierConfig, GameProfile, StrategyKind};

pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path, Vec::new())?.config;
    for line in profile_lines(&config)? {
        println!("{line}");
    }
    Ok(())
}

/// One summary line per profile, sorted by name.
pub fn profile_lines(config: &CroupierConfig) -> anyhow::Result<Vec<String>> {
    config
        .profile_names()
        .iter()
        .map(|name| -> anyhow::Result<String> {
            let profile = config.profile(name)?;
            let origin = if config.games.contains_key(name) {
                "config"
            } else {
                "built-in"
            };
            Ok(format!("{:<14} {:<9} {}", name, origin, describe(&profile)))
        })
        .collect()
}

fn describe(profile: &GameProfile) -> String {
    let objective = match &profile.strategy {
        StrategyKind::SingleShot {
            win_streak_target: Some(n),
        } => format!("single-shot, {n} wins in a row"),
        StrategyKind::SingleShot {
            win_streak_target: None,
        } => "single-shot, fixed rounds".to_string(),
        StrategyKind::MultiPick {
            streak_target,
            max_picks,
            gate_picks_on_bet,
            ..
        } => {
            let gate = if *gate_picks_on_bet { ", gated" } else { "" };
            format!("multi-pick, cash out after {streak_target} (max {max_picks} picks{gate})")
        }
    };
    format!("{objective}; max {} rounds", profile.max_rounds)
}
