//! Error types shared across croupier crates.

/// Errors raised while building or validating shared types.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("unknown game profile: {0}")]
    UnknownProfile(String),

    #[error("invalid key binding: {0}")]
    InvalidKey(String),
}
