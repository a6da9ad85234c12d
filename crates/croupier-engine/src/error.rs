//! Error types for the croupier-engine crate.

use thiserror::Error;

use croupier_browser::BrowserError;
use croupier_types::TypesError;

/// Errors that abort a session.
///
/// Round-local conditions (a correlation timeout, an unrecognized result)
/// are not errors; the automaton branches on them.
#[derive(Debug, Error)]
pub enum EngineError {
    /// DevTools transport, evaluation, or frame lookup failed.
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// Configuration or profile was invalid.
    #[error(transparent)]
    Config(#[from] TypesError),

    /// A value returned from the page did not have the expected shape.
    #[error("unexpected page response for {operation}: {detail}")]
    Decode { operation: String, detail: String },

    /// A capability implementation failed for a reason of its own.
    #[error("{capability} failed: {detail}")]
    Capability { capability: String, detail: String },
}

impl EngineError {
    pub(crate) fn decode(operation: &str, detail: impl ToString) -> Self {
        EngineError::Decode {
            operation: operation.to_string(),
            detail: detail.to_string(),
        }
    }
}
