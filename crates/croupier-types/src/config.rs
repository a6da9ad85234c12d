//! Configuration types for croupier sessions.
//!
//! [`CroupierConfig`] is the top-level configuration loaded from
//! `croupier.toml`, controlling how the DevTools target is reached, which
//! network path the observer watches, how correlation polls, how inputs are
//! paced, and which game profiles are available.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::profile::{builtin_profiles, GameProfile, InputAction};
use crate::TypesError;

/// Default workspace-level configuration file name.
pub const CONFIG_FILENAME: &str = "croupier.toml";

// ---------------------------------------------------------------------------
// DelayRange
// ---------------------------------------------------------------------------

/// An inclusive range of milliseconds; a delay is drawn uniformly from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    /// A range that always yields `ms`.
    pub const fn fixed(ms: u64) -> Self {
        Self {
            min_ms: ms,
            max_ms: ms,
        }
    }

    pub const fn between(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    pub fn validate(&self, name: &str) -> Result<(), TypesError> {
        if self.min_ms > self.max_ms {
            return Err(TypesError::ConfigError(format!(
                "{name}: min_ms ({}) exceeds max_ms ({})",
                self.min_ms, self.max_ms
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// How to reach the browser page hosting the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Explicit DevTools page WebSocket URL. Skips target discovery.
    pub ws_url: Option<String>,
    /// DevTools HTTP host used for target discovery.
    pub host: String,
    /// DevTools HTTP port (`--remote-debugging-port`).
    pub port: u16,
    /// Only pick page targets whose URL contains this substring.
    pub target_url_filter: Option<String>,
    /// Per-command CDP response timeout.
    pub command_timeout_ms: u64,
    /// Budget for locating the frame that hosts the game canvas.
    pub frame_load_timeout_ms: u64,
    /// Pause between frame probes while the game is loading.
    pub frame_probe_interval_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            ws_url: None,
            host: "127.0.0.1".into(),
            port: 9222,
            target_url_filter: None,
            command_timeout_ms: 30_000,
            frame_load_timeout_ms: 90_000,
            frame_probe_interval_ms: 1_000,
        }
    }
}

impl BrowserConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn frame_load_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_load_timeout_ms)
    }

    pub fn frame_probe_interval(&self) -> Duration {
        Duration::from_millis(self.frame_probe_interval_ms)
    }
}

/// Network observer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Only responses whose URL contains this substring are captured.
    pub path_marker: String,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            path_marker: "/v1/play".into(),
        }
    }
}

/// Correlator polling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 90,
            timeout_ms: 12_000,
        }
    }
}

impl CorrelationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Human-like pacing around each key press.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Random pause before the key is dispatched.
    pub pre_delay: DelayRange,
    /// Random pause after the key is released.
    pub settle: DelayRange,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            pre_delay: DelayRange::between(60, 140),
            settle: DelayRange::between(180, 350),
        }
    }
}

/// Concrete keys bound to each logical input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub bet: String,
    pub pick: String,
    pub cash_out: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            bet: "Space".into(),
            pick: "q".into(),
            cash_out: "w".into(),
        }
    }
}

impl KeyBindings {
    pub fn key_for(&self, action: InputAction) -> &str {
        match action {
            InputAction::Bet => &self.bet,
            InputAction::Pick => &self.pick,
            InputAction::CashOut => &self.cash_out,
        }
    }

    pub fn validate(&self) -> Result<(), TypesError> {
        for action in [InputAction::Bet, InputAction::Pick, InputAction::CashOut] {
            if self.key_for(action).trim().is_empty() {
                return Err(TypesError::InvalidKey(format!("no key bound to {action}")));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CroupierConfig
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CroupierConfig {
    pub browser: BrowserConfig,
    pub observer: ObserverConfig,
    pub correlation: CorrelationConfig,
    pub input: InputConfig,
    pub keys: KeyBindings,
    /// User-defined or overriding game profiles, keyed by name.
    pub games: BTreeMap<String, GameProfile>,
}

impl CroupierConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, TypesError> {
        toml::from_str(content).map_err(|e| TypesError::ConfigError(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, TypesError> {
        toml::to_string_pretty(self).map_err(|e| TypesError::ConfigError(e.to_string()))
    }

    /// Resolve a game profile by name: configured entries win over built-ins.
    pub fn profile(&self, name: &str) -> Result<GameProfile, TypesError> {
        if let Some(profile) = self.games.get(name) {
            let mut profile = profile.clone();
            profile.name = name.to_string();
            return Ok(profile);
        }
        GameProfile::builtin(name).ok_or_else(|| TypesError::UnknownProfile(name.to_string()))
    }

    /// All profile names, built-in and configured, sorted and deduplicated.
    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = builtin_profiles().into_iter().map(|p| p.name).collect();
        names.extend(self.games.keys().cloned());
        names.sort();
        names.dedup();
        names
    }

    /// Key bindings in effect for `profile`.
    pub fn keys_for<'a>(&'a self, profile: &'a GameProfile) -> &'a KeyBindings {
        profile.keys.as_ref().unwrap_or(&self.keys)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.observer.path_marker.trim().is_empty() {
            return Err(TypesError::ConfigError(
                "observer.path_marker must not be empty".into(),
            ));
        }
        if self.correlation.poll_interval_ms == 0 {
            return Err(TypesError::ConfigError(
                "correlation.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.correlation.timeout_ms < self.correlation.poll_interval_ms {
            return Err(TypesError::ConfigError(format!(
                "correlation.timeout_ms ({}) is shorter than poll_interval_ms ({})",
                self.correlation.timeout_ms, self.correlation.poll_interval_ms
            )));
        }
        if self.browser.command_timeout_ms == 0 {
            return Err(TypesError::ConfigError(
                "browser.command_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.browser.frame_probe_interval_ms == 0 {
            return Err(TypesError::ConfigError(
                "browser.frame_probe_interval_ms must be greater than zero".into(),
            ));
        }
        self.input.pre_delay.validate("input.pre_delay")?;
        self.input.settle.validate("input.settle")?;
        self.keys.validate()?;

        for name in self.games.keys() {
            self.profile(name)?.validate()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::StrategyKind;

    #[test]
    fn default_config_is_valid() {
        CroupierConfig::default().validate().unwrap();
    }

    #[test]
    fn toml_roundtrip_preserves_overrides() {
        let src = r#"
            [observer]
            path_marker = "/v2/spin"

            [correlation]
            poll_interval_ms = 50
            timeout_ms = 5000

            [games.mines]
            max_rounds = 12

            [games.mines.strategy]
            kind = "multi-pick"
            streak_target = 3
        "#;
        let config = CroupierConfig::from_toml(src).unwrap();
        assert_eq!(config.observer.path_marker, "/v2/spin");
        assert_eq!(config.correlation.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.browser.port, 9222);

        let text = config.to_toml().unwrap();
        let back = CroupierConfig::from_toml(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn configured_profile_overrides_builtin() {
        let src = r#"
            [games.keno]
            max_rounds = 3
            [games.keno.strategy]
            kind = "single-shot"
            win_streak_target = 1
        "#;
        let config = CroupierConfig::from_toml(src).unwrap();
        let keno = config.profile("keno").unwrap();
        assert_eq!(keno.name, "keno");
        assert_eq!(keno.max_rounds, 3);
        assert_eq!(
            keno.strategy,
            StrategyKind::SingleShot {
                win_streak_target: Some(1)
            }
        );
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let err = CroupierConfig::default().profile("baccarat").unwrap_err();
        assert!(matches!(err, TypesError::UnknownProfile(name) if name == "baccarat"));
    }

    #[test]
    fn profile_names_are_merged() {
        let mut config = CroupierConfig::default();
        let mut custom = GameProfile::builtin("keno").unwrap();
        custom.name = String::new();
        config.games.insert("limbo".into(), custom.clone());
        config.games.insert("keno".into(), custom);
        assert_eq!(
            config.profile_names(),
            vec!["diamonds", "dragon-tower", "keno", "limbo", "warp-war"]
        );
    }

    #[test]
    fn validate_rejects_timeout_below_poll() {
        let mut config = CroupierConfig::default();
        config.correlation.timeout_ms = 10;
        config.correlation.poll_interval_ms = 90;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_marker() {
        let mut config = CroupierConfig::default();
        config.observer.path_marker = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let mut config = CroupierConfig::default();
        config.input.settle = DelayRange::between(500, 100);
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("input.settle"), "got: {err}");
    }

    #[test]
    fn profile_keys_fall_back_to_global() {
        let config = CroupierConfig::default();
        let mut profile = GameProfile::builtin("dragon-tower").unwrap();
        assert_eq!(config.keys_for(&profile).key_for(InputAction::Bet), "Space");

        profile.keys = Some(KeyBindings {
            pick: "e".into(),
            ..KeyBindings::default()
        });
        assert_eq!(config.keys_for(&profile).key_for(InputAction::Pick), "e");
    }
}
