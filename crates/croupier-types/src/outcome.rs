//! Normalized game outcomes and captured network results.
//!
//! A [`CapturedResult`] is one decoded response from the game's play
//! endpoint. Its raw `result` string is reduced to an [`Outcome`] by
//! [`Outcome::normalize`], a total, case-insensitive mapping that never
//! guesses: anything outside the known vocabulary is [`Outcome::Unknown`].
//!
//! The vocabulary tables are public so the in-page observer script can be
//! generated from the same source of truth.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Raw result strings that normalize to [`Outcome::Win`].
pub const WIN_WORDS: &[&str] = &["win", "won", "success"];

/// Raw result strings that normalize to [`Outcome::Lose`].
pub const LOSE_WORDS: &[&str] = &["loss", "lose", "lost", "fail"];

/// Raw result strings that normalize to [`Outcome::InProgress`].
pub const IN_PROGRESS_WORDS: &[&str] = &["in_progress", "inprogress"];

/// Integer payload fields carried opaquely on every captured result.
pub const EXTRA_FIELDS: &[&str] = &["level", "tile_index", "index"];

/// Largest integer a page script can represent exactly (`Number.MAX_SAFE_INTEGER`).
const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// The `action` tag marking a terminal result event.
pub const RESULT_ACTION: &str = "result";

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Normalized outcome of a single play request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
    InProgress,
    Unknown,
}

impl Outcome {
    /// Map a raw `result` string onto the outcome vocabulary.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// `None`, empty strings, and unrecognized values yield `Unknown`.
    pub fn normalize(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Outcome::Unknown;
        };
        let lowered = raw.trim().to_ascii_lowercase();
        let word = lowered.as_str();
        if WIN_WORDS.contains(&word) {
            Outcome::Win
        } else if LOSE_WORDS.contains(&word) {
            Outcome::Lose
        } else if IN_PROGRESS_WORDS.contains(&word) {
            Outcome::InProgress
        } else {
            Outcome::Unknown
        }
    }

    /// Stable lowercase label, identical to the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Lose => "lose",
            Outcome::InProgress => "inprogress",
            Outcome::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SessionId / Watermark
// ---------------------------------------------------------------------------

/// Correlation token linking the steps of one multi-step round.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Timestamp (milliseconds on the buffer's monotonic clock) captured just
/// before an input action. Results captured earlier are never attributed to
/// that action.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(pub f64);

impl Watermark {
    pub fn as_millis(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}ms", self.0)
    }
}

// ---------------------------------------------------------------------------
// MatchFilter
// ---------------------------------------------------------------------------

/// Selection criteria for an atomic pop from an observation buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchFilter {
    /// Earliest acceptable capture time (inclusive).
    pub since: Watermark,
    /// When set, only entries carrying this exact session id match.
    pub session_id: Option<SessionId>,
    /// When set, only entries tagged `action == "result"` match.
    pub require_result_action: bool,
}

impl MatchFilter {
    /// Filter on the watermark alone.
    pub fn since(since: Watermark) -> Self {
        Self {
            since,
            session_id: None,
            require_result_action: false,
        }
    }

    #[must_use]
    pub fn with_session(mut self, session_id: Option<SessionId>) -> Self {
        self.session_id = session_id;
        self
    }

    #[must_use]
    pub fn with_result_action(mut self, required: bool) -> Self {
        self.require_result_action = required;
        self
    }
}

// ---------------------------------------------------------------------------
// CapturedResult
// ---------------------------------------------------------------------------

/// One intercepted network response of interest.
///
/// Entries are immutable once appended to a buffer. The serialized field
/// names are shared with the in-page observer, which pushes objects of this
/// exact shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedResult {
    /// Capture time on the buffer's monotonic clock.
    pub captured_at_ms: f64,
    /// URL of the response.
    pub source_url: String,
    /// Decoded JSON body.
    pub raw_payload: Value,
    /// Opaque `data.action` tag, if present.
    #[serde(default)]
    pub action: Option<String>,
    /// Normalized `data.result`.
    pub outcome: Outcome,
    /// `data.session_id`, if present.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Integer extras such as `level`, `tile_index`, `index`.
    #[serde(default, deserialize_with = "integer_extras")]
    pub extras: BTreeMap<String, i64>,
}

impl CapturedResult {
    /// Decode a play payload of the form `{"data": {...}}`.
    ///
    /// Missing or non-object `data` is tolerated: the result is then
    /// `Unknown` with no session and no extras.
    pub fn from_payload(source_url: impl Into<String>, payload: Value, captured_at_ms: f64) -> Self {
        let data = payload.get("data").filter(|d| d.is_object());

        let action = data
            .and_then(|d| d.get("action"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let outcome = Outcome::normalize(data.and_then(|d| d.get("result")).and_then(Value::as_str));

        let session_id = data.and_then(|d| d.get("session_id")).and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(SessionId(s.clone())),
            Value::Number(n) => Some(SessionId(n.to_string())),
            _ => None,
        });

        let extras = data
            .map(|d| {
                EXTRA_FIELDS
                    .iter()
                    .filter_map(|field| {
                        d.get(*field)
                            .and_then(safe_integer)
                            .map(|v| ((*field).to_string(), v))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            captured_at_ms,
            source_url: source_url.into(),
            raw_payload: payload,
            action,
            outcome,
            session_id,
            extras,
        }
    }

    /// Whether this entry is a terminal `result` event.
    pub fn is_result_action(&self) -> bool {
        self.action.as_deref() == Some(RESULT_ACTION)
    }

    /// Whether this entry satisfies `filter`.
    pub fn matches(&self, filter: &MatchFilter) -> bool {
        if self.captured_at_ms < filter.since.0 {
            return false;
        }
        if filter.require_result_action && !self.is_result_action() {
            return false;
        }
        match &filter.session_id {
            Some(wanted) => self.session_id.as_ref() == Some(wanted),
            None => true,
        }
    }

    /// Look up an integer extra by name.
    pub fn extra(&self, name: &str) -> Option<i64> {
        self.extras.get(name).copied()
    }
}

/// An integer both the page and the process read the same way.
fn safe_integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .filter(|n| (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(n))
}

/// Extras whose value is not a safe integer are dropped, not rejected.
fn integer_extras<'de, D>(deserializer: D) -> Result<BTreeMap<String, i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| safe_integer(&value).map(|n| (name, n)))
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
