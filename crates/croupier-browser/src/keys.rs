//! Key-name to DevTools key event mapping.
//!
//! Key bindings in configuration are short names (`Space`, `q`, `Enter`,
//! `ArrowUp`). `Input.dispatchKeyEvent` needs the DOM `key`, `code`, the
//! legacy virtual key code and, for printable keys, the `text` to insert.

use serde_json::Value;

use crate::error::BrowserError;

/// Everything `Input.dispatchKeyEvent` needs to synthesize one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub key: String,
    pub code: String,
    pub key_code: u32,
    pub text: Option<String>,
}

impl KeyDescriptor {
    /// Parse a configured key name.
    ///
    /// Named keys are matched case-insensitively. Single ASCII letters and
    /// digits map to their `KeyX` / `DigitN` codes, keeping the case given.
    pub fn parse(name: &str) -> Result<Self, BrowserError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(BrowserError::InvalidKey(name.to_string()));
        }

        let named = match trimmed.to_ascii_lowercase().as_str() {
            "space" | " " => Some((" ", "Space", 32, Some(" "))),
            "enter" | "return" => Some(("Enter", "Enter", 13, Some("\r"))),
            "escape" | "esc" => Some(("Escape", "Escape", 27, None)),
            "tab" => Some(("Tab", "Tab", 9, None)),
            "backspace" => Some(("Backspace", "Backspace", 8, None)),
            "arrowup" | "up" => Some(("ArrowUp", "ArrowUp", 38, None)),
            "arrowdown" | "down" => Some(("ArrowDown", "ArrowDown", 40, None)),
            "arrowleft" | "left" => Some(("ArrowLeft", "ArrowLeft", 37, None)),
            "arrowright" | "right" => Some(("ArrowRight", "ArrowRight", 39, None)),
            _ => None,
        };
        if let Some((key, code, key_code, text)) = named {
            return Ok(Self {
                key: key.to_string(),
                code: code.to_string(),
                key_code,
                text: text.map(str::to_string),
            });
        }

        let mut chars = trimmed.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return Err(BrowserError::InvalidKey(name.to_string()));
        };

        if c.is_ascii_alphabetic() {
            let upper = c.to_ascii_uppercase();
            return Ok(Self {
                key: c.to_string(),
                code: format!("Key{upper}"),
                key_code: upper as u32,
                text: Some(c.to_string()),
            });
        }
        if c.is_ascii_digit() {
            return Ok(Self {
                key: c.to_string(),
                code: format!("Digit{c}"),
                key_code: c as u32,
                text: Some(c.to_string()),
            });
        }

        Err(BrowserError::InvalidKey(name.to_string()))
    }
}

/// Build `Input.dispatchKeyEvent` params for one phase of a key press.
///
/// `key_down` produces a `keyDown` carrying the text (so printable keys
/// generate a `keypress`), otherwise a `keyUp`.
pub fn build_key_event_params(key: &KeyDescriptor, key_down: bool) -> Value {
    let mut params = serde_json::json!({
        "type": if key_down { "keyDown" } else { "keyUp" },
        "key": key.key,
        "code": key.code,
        "windowsVirtualKeyCode": key.key_code,
        "nativeVirtualKeyCode": key.key_code,
    });
    if key_down {
        if let Some(text) = &key.text {
            params["text"] = Value::String(text.clone());
            params["unmodifiedText"] = Value::String(text.clone());
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_space_is_case_insensitive() {
        let a = KeyDescriptor::parse("Space").unwrap();
        let b = KeyDescriptor::parse("SPACE").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.key, " ");
        assert_eq!(a.code, "Space");
        assert_eq!(a.key_code, 32);
        assert_eq!(a.text.as_deref(), Some(" "));
    }

    #[test]
    fn parse_letter_keeps_case_in_key() {
        let q = KeyDescriptor::parse("q").unwrap();
        assert_eq!(q.key, "q");
        assert_eq!(q.code, "KeyQ");
        assert_eq!(q.key_code, 81);

        let w = KeyDescriptor::parse("W").unwrap();
        assert_eq!(w.key, "W");
        assert_eq!(w.code, "KeyW");
    }

    #[test]
    fn parse_digit_and_arrows() {
        let five = KeyDescriptor::parse("5").unwrap();
        assert_eq!(five.code, "Digit5");
        assert_eq!(five.key_code, 53);

        let up = KeyDescriptor::parse("up").unwrap();
        assert_eq!(up.key, "ArrowUp");
        assert!(up.text.is_none());
    }

    #[test]
    fn parse_rejects_unknown_names() {
        assert!(matches!(
            KeyDescriptor::parse("F13"),
            Err(BrowserError::InvalidKey(_))
        ));
        assert!(KeyDescriptor::parse("").is_err());
        assert!(KeyDescriptor::parse("  ").is_err());
        assert!(KeyDescriptor::parse("é").is_err());
    }

    #[test]
    fn key_down_carries_text_key_up_does_not() {
        let q = KeyDescriptor::parse("q").unwrap();
        let down = build_key_event_params(&q, true);
        assert_eq!(down["type"], "keyDown");
        assert_eq!(down["text"], "q");
        assert_eq!(down["windowsVirtualKeyCode"], 81);

        let up = build_key_event_params(&q, false);
        assert_eq!(up["type"], "keyUp");
        assert!(up.get("text").is_none());
    }

    #[test]
    fn escape_has_no_text() {
        let esc = KeyDescriptor::parse("Esc").unwrap();
        let down = build_key_event_params(&esc, true);
        assert!(down.get("text").is_none());
        assert_eq!(down["code"], "Escape");
    }
}
