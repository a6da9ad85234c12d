//! Core types shared across all croupier crates.
//!
//! Defines normalized game outcomes, captured network results, per-game
//! profiles, and the layered configuration consumed by the browser adapter,
//! the correlation engine, and the CLI.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod outcome;
pub mod profile;

pub use config::{
    BrowserConfig, CorrelationConfig, CroupierConfig, DelayRange, InputConfig, KeyBindings,
    ObserverConfig, CONFIG_FILENAME,
};
pub use config_loader::{ConfigLoader, ConfigSource, EffectiveConfig};
pub use error::TypesError;
pub use outcome::{
    CapturedResult, MatchFilter, Outcome, SessionId, Watermark, EXTRA_FIELDS, IN_PROGRESS_WORDS,
    LOSE_WORDS, RESULT_ACTION, WIN_WORDS,
};
pub use profile::{
    builtin_profiles, GameProfile, InputAction, InputClass, OpeningAction, RoundTiming,
    StrategyKind,
};
