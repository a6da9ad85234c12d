//! DevTools HTTP endpoint target listing.
//!
//! Chrome started with `--remote-debugging-port` serves
//! `http://<host>:<port>/json/list`, one entry per target. When the operator
//! only knows the port we pick the first `page` target from that list,
//! optionally narrowed by a URL substring.

use serde::Deserialize;

use crate::error::BrowserError;

/// One entry from `/json/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct DevToolsTarget {
    pub id: String,
    #[serde(rename = "type")]
    pub target_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub web_socket_debugger_url: Option<String>,
}

/// Choose the first attachable page target.
///
/// A target qualifies when it is of type `page`, exposes a WebSocket URL
/// (targets already attached to another client don't), and, if a filter is
/// given, its URL contains the filter.
pub fn select_page_target<'a>(
    targets: &'a [DevToolsTarget],
    url_filter: Option<&str>,
) -> Option<&'a DevToolsTarget> {
    targets.iter().find(|t| {
        t.target_type == "page"
            && t.web_socket_debugger_url.is_some()
            && url_filter.map_or(true, |f| t.url.contains(f))
    })
}

/// Query `/json/list` and return the WebSocket URL of the chosen page.
pub async fn discover_page_ws_url(
    host: &str,
    port: u16,
    url_filter: Option<&str>,
) -> Result<String, BrowserError> {
    let url = format!("http://{host}:{port}/json/list");
    tracing::debug!(url = %url, "listing DevTools targets");

    let discovery_err = |reason: String| BrowserError::Discovery {
        url: url.clone(),
        reason,
    };

    let response = reqwest::get(&url)
        .await
        .map_err(|e| discovery_err(e.to_string()))?;
    let response = response
        .error_for_status()
        .map_err(|e| discovery_err(e.to_string()))?;
    let targets: Vec<DevToolsTarget> = response
        .json()
        .await
        .map_err(|e| discovery_err(format!("invalid target list: {e}")))?;

    let target = select_page_target(&targets, url_filter).ok_or_else(|| {
        BrowserError::NoPageTarget {
            filter: url_filter.map(str::to_string),
        }
    })?;

    tracing::info!(id = %target.id, title = %target.title, url = %target.url, "selected page target");

    target
        .web_socket_debugger_url
        .clone()
        .ok_or_else(|| BrowserError::NoPageTarget {
            filter: url_filter.map(str::to_string),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<DevToolsTarget> {
        serde_json::from_str(
            r#"[
              {"id":"SW","type":"service_worker","url":"https://casino.example/sw.js",
               "webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/page/SW"},
              {"id":"A","type":"page","title":"Lobby","url":"https://casino.example/lobby"},
              {"id":"B","type":"page","title":"Keno","url":"https://casino.example/casino/keno",
               "webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/page/B"},
              {"id":"C","type":"page","title":"Blank","url":"about:blank",
               "webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/page/C"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn first_attachable_page_wins() {
        let targets = sample();
        let chosen = select_page_target(&targets, None).unwrap();
        assert_eq!(chosen.id, "B");
    }

    #[test]
    fn filter_narrows_by_url() {
        let targets = sample();
        let chosen = select_page_target(&targets, Some("about:")).unwrap();
        assert_eq!(chosen.id, "C");
        assert!(select_page_target(&targets, Some("dragon")).is_none());
    }

    #[test]
    fn non_page_targets_are_ignored() {
        let targets = sample();
        assert!(select_page_target(&targets, Some("sw.js")).is_none());
    }

    #[test]
    fn missing_optional_fields_deserialize() {
        let t: DevToolsTarget = serde_json::from_str(r#"{"id":"X","type":"page"}"#).unwrap();
        assert!(t.url.is_empty());
        assert!(t.web_socket_debugger_url.is_none());
    }
}
