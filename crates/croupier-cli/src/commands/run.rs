//! `croupier run`: attach to the browser and play one session.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;

use croupier_engine::{CdpPage, PageObserver, SessionDriver, SessionReport, StrategyState};
use croupier_types::{CroupierConfig, GameProfile};

use crate::OutputFormat;

/// Exit status for a session that ended without reaching its objective.
pub const EXIT_STOPPED: u8 = 2;

#[derive(Debug)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub game: String,
    pub ws_url: Option<String>,
    pub port: Option<u16>,
    pub host: Option<String>,
    pub max_rounds: Option<u32>,
    pub format: OutputFormat,
}

pub fn run(opts: RunOptions) -> anyhow::Result<ExitCode> {
    let effective = crate::commands::load_config(opts.config_path.as_deref(), overrides(&opts))?;
    let config = effective.config;
    let profile = resolve_profile(&config, &opts.game, opts.max_rounds)?;

    tracing::info!(
        game = %profile.name,
        max_rounds = profile.max_rounds,
        multi_pick = profile.is_multi_pick(),
        "=== START ==="
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;
    let report = rt.block_on(play(&config, profile))?;

    print_report(&report, opts.format)?;
    Ok(exit_code(report.terminal))
}

async fn play(config: &CroupierConfig, profile: GameProfile) -> anyhow::Result<SessionReport> {
    let keys = config.keys_for(&profile).clone();
    let page = CdpPage::connect(&config.browser, &keys, config.input.clone())
        .await
        .context("failed to attach to the browser page")?;
    let observer = PageObserver::new(&page, config.observer.path_marker.clone());

    let driver = SessionDriver::new(
        &page,
        &page,
        &observer,
        profile,
        config.correlation.clone(),
        config.browser.frame_load_timeout(),
    );
    Ok(driver.run().await?)
}

/// CLI flags expressed as config overrides.
fn overrides(opts: &RunOptions) -> Vec<(&'static str, &'static str, toml::Value)> {
    let mut out = Vec::new();
    if let Some(url) = &opts.ws_url {
        out.push(("--ws-url", "browser.ws_url", toml::Value::String(url.clone())));
    }
    if let Some(port) = opts.port {
        out.push(("--port", "browser.port", toml::Value::Integer(i64::from(port))));
    }
    if let Some(host) = &opts.host {
        out.push(("--host", "browser.host", toml::Value::String(host.clone())));
    }
    out
}

/// Look up the profile and apply `--max-rounds`.
pub fn resolve_profile(
    config: &CroupierConfig,
    game: &str,
    max_rounds: Option<u32>,
) -> anyhow::Result<GameProfile> {
    let mut profile = config.profile(game).with_context(|| {
        format!(
            "unknown game '{game}' (available: {})",
            config.profile_names().join(", ")
        )
    })?;
    if let Some(n) = max_rounds {
        profile.max_rounds = n;
    }
    profile.validate()?;
    Ok(profile)
}

/// Process status for a terminal state: 0 on success, 2 when stopped.
pub fn exit_status(terminal: StrategyState) -> u8 {
    match terminal {
        StrategyState::TerminalSuccess => 0,
        _ => EXIT_STOPPED,
    }
}

fn exit_code(terminal: StrategyState) -> ExitCode {
    ExitCode::from(exit_status(terminal))
}

fn print_report(report: &SessionReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => print!("{}", report.to_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}
