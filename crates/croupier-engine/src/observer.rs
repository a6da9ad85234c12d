//! In-page network observer.
//!
//! The game client reports every play over HTTP. `PageObserver` patches
//! `fetch` and `XMLHttpRequest` inside the game frame so each response whose
//! URL contains the path marker is parsed, normalized, and appended to a
//! page-global buffer. Flush, pop, and the clock are single script
//! evaluations; the page's event loop runs one at a time, so a pop scans
//! and removes without interleaving with the hooks.
//!
//! Entries are pushed in the serialized shape of [`CapturedResult`] and the
//! outcome vocabulary is generated from the same tables
//! [`Outcome::normalize`](croupier_types::Outcome::normalize) uses.

use async_trait::async_trait;
use serde_json::{json, Value};

use croupier_types::{
    CapturedResult, MatchFilter, Outcome, Watermark, EXTRA_FIELDS, IN_PROGRESS_WORDS, LOSE_WORDS,
    RESULT_ACTION, WIN_WORDS,
};

use crate::capability::{ObservationSource, PageExecution};
use crate::error::EngineError;

/// Page-global holding the observer state.
pub const STATE_GLOBAL: &str = "__croupierObserver";

/// Observation buffer living in the game frame.
pub struct PageObserver<'a> {
    page: &'a dyn PageExecution,
    path_marker: String,
}

impl<'a> PageObserver<'a> {
    pub fn new(page: &'a dyn PageExecution, path_marker: impl Into<String>) -> Self {
        Self {
            page,
            path_marker: path_marker.into(),
        }
    }

    /// Install the hooks. Returns `false` if the frame was already
    /// instrumented.
    pub async fn install_hooks(&self) -> Result<bool, EngineError> {
        let value = self
            .page
            .evaluate(&install_script(&self.path_marker))
            .await?;
        match value {
            Value::Bool(fresh) => Ok(fresh),
            other => Err(EngineError::decode("observer install", format!("expected bool, got {other}"))),
        }
    }
}

#[async_trait]
impl ObservationSource for PageObserver<'_> {
    async fn install(&self) -> Result<(), EngineError> {
        if self.install_hooks().await? {
            tracing::info!(marker = %self.path_marker, "network observer installed");
        } else {
            tracing::info!("network observer already present, leaving it in place");
        }
        Ok(())
    }

    async fn now(&self) -> Result<Watermark, EngineError> {
        let value = self.page.evaluate("performance.now()").await?;
        value
            .as_f64()
            .map(Watermark)
            .ok_or_else(|| EngineError::decode("page clock", value))
    }

    async fn flush(&self) -> Result<(), EngineError> {
        self.page.evaluate(&flush_script()).await?;
        Ok(())
    }

    async fn pop_match(&self, filter: &MatchFilter) -> Result<Option<CapturedResult>, EngineError> {
        let value = self.page.evaluate(&pop_script(filter)).await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| EngineError::decode("observer pop", e))
    }
}

// ---------------------------------------------------------------------------
// Script builders
// ---------------------------------------------------------------------------

/// Build the idempotent hook installer.
///
/// Evaluates to `true` when hooks were installed, `false` when the sentinel
/// was already present.
pub fn install_script(path_marker: &str) -> String {
    let vocab = json!({
        "marker": path_marker,
        "win": WIN_WORDS,
        "lose": LOSE_WORDS,
        "progress": IN_PROGRESS_WORDS,
        "extras": EXTRA_FIELDS,
        "labels": {
            "win": Outcome::Win.as_str(),
            "lose": Outcome::Lose.as_str(),
            "progress": Outcome::InProgress.as_str(),
            "unknown": Outcome::Unknown.as_str(),
        },
    });

    format!(
        r#"(() => {{
  const root = window;
  if (root.{STATE_GLOBAL} && root.{STATE_GLOBAL}.installed) return false;
  const V = {vocab};
  const state = {{ installed: true, buffer: [] }};
  root.{STATE_GLOBAL} = state;

  const normalize = (raw) => {{
    if (typeof raw !== 'string') return V.labels.unknown;
    const w = raw.trim().toLowerCase();
    if (V.win.includes(w)) return V.labels.win;
    if (V.lose.includes(w)) return V.labels.lose;
    if (V.progress.includes(w)) return V.labels.progress;
    return V.labels.unknown;
  }};
  const wanted = (url) => typeof url === 'string' && url.indexOf(V.marker) !== -1;

  const capture = (url, payload) => {{
    try {{
      if (payload === null || typeof payload !== 'object') return;
      const d = typeof payload.data === 'object' && payload.data !== null
        && !Array.isArray(payload.data) ? payload.data : null;
      const extras = {{}};
      let sid = null;
      if (d) {{
        for (const k of V.extras) {{ if (Number.isSafeInteger(d[k])) extras[k] = d[k]; }}
        if (typeof d.session_id === 'string' && d.session_id !== '') sid = d.session_id;
        else if (typeof d.session_id === 'number') sid = String(d.session_id);
      }}
      state.buffer.push({{
        captured_at_ms: performance.now(),
        source_url: url,
        raw_payload: payload,
        action: d && typeof d.action === 'string' && d.action !== '' ? d.action : null,
        outcome: normalize(d ? d.result : null),
        session_id: sid,
        extras: extras,
      }});
    }} catch (e) {{
      console.warn('[croupier] capture failed', e);
    }}
  }};
  const captureText = (url, text) => {{
    let payload;
    try {{ payload = JSON.parse(text); }} catch (_) {{ return; }}
    capture(url, payload);
  }};

  const origFetch = root.fetch;
  if (typeof origFetch === 'function') {{
    root.fetch = function (...args) {{
      return origFetch.apply(this, args).then((resp) => {{
        try {{
          const url = String(resp.url || (args[0] && args[0].url) || args[0]);
          if (wanted(url)) {{
            resp.clone().text().then((t) => captureText(url, t)).catch(() => {{}});
          }}
        }} catch (e) {{
          console.warn('[croupier] fetch hook failed', e);
        }}
        return resp;
      }});
    }};
  }}

  const XHR = root.XMLHttpRequest;
  if (XHR && XHR.prototype) {{
    const origOpen = XHR.prototype.open;
    const origSend = XHR.prototype.send;
    XHR.prototype.open = function (method, url, ...rest) {{
      this.__croupierUrl = String(url);
      return origOpen.call(this, method, url, ...rest);
    }};
    XHR.prototype.send = function (...args) {{
      this.addEventListener('load', () => {{
        try {{
          const url = String(this.responseURL || this.__croupierUrl || '');
          if (!wanted(url)) return;
          if (this.responseType === '' || this.responseType === 'text') captureText(url, this.responseText);
          else if (this.responseType === 'json') capture(url, this.response);
        }} catch (e) {{
          console.warn('[croupier] xhr hook failed', e);
        }}
      }});
      return origSend.apply(this, args);
    }};
  }}
  return true;
}})()"#
    )
}

/// Build the buffer reset. Safe to run before install.
pub fn flush_script() -> String {
    format!(
        "(() => {{ const s = window.{STATE_GLOBAL}; if (s) s.buffer.length = 0; return true; }})()"
    )
}

/// Build the scan-and-remove for `filter`.
///
/// Evaluates to the removed entry or `null`.
pub fn pop_script(filter: &MatchFilter) -> String {
    let session = filter.session_id.as_ref().map(|s| s.as_str());
    let require_action = filter.require_result_action.then_some(RESULT_ACTION);
    let f = json!({
        "since": filter.since.as_millis(),
        "session": session,
        "requireAction": require_action,
    });
    format!(
        r#"(() => {{
  const s = window.{STATE_GLOBAL};
  if (!s) return null;
  const F = {f};
  for (let i = 0; i < s.buffer.length; i++) {{
    const e = s.buffer[i];
    if (e.captured_at_ms < F.since) continue;
    if (F.requireAction !== null && e.action !== F.requireAction) continue;
    if (F.session !== null && e.session_id !== F.session) continue;
    return s.buffer.splice(i, 1)[0];
  }}
  return null;
}})()"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use croupier_types::SessionId;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records every script and answers from a queue.
    struct FakePage {
        scripts: Mutex<Vec<String>>,
        replies: Mutex<VecDeque<Value>>,
    }

    impl FakePage {
        fn new(replies: Vec<Value>) -> Self {
            Self {
                scripts: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.into()),
            }
        }

        fn scripts(&self) -> Vec<String> {
            self.scripts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageExecution for FakePage {
        async fn evaluate(&self, script: &str) -> Result<Value, EngineError> {
            self.scripts.lock().unwrap().push(script.to_string());
            Ok(self.replies.lock().unwrap().pop_front().unwrap_or(Value::Null))
        }
    }

    #[test]
    fn install_script_embeds_marker_and_vocabulary() {
        let script = install_script("/v1/play");
        assert!(script.contains(r#""marker":"/v1/play""#));
        for word in WIN_WORDS.iter().chain(LOSE_WORDS).chain(IN_PROGRESS_WORDS) {
            assert!(script.contains(&format!("\"{word}\"")), "missing {word}");
        }
        for field in EXTRA_FIELDS {
            assert!(script.contains(&format!("\"{field}\"")));
        }
        assert!(script.contains(&format!("\"progress\":\"{}\"", Outcome::InProgress.as_str())));
    }

    #[test]
    fn install_script_is_guarded_and_non_invasive() {
        let script = install_script("/v1/play");
        assert!(script.contains(&format!("root.{STATE_GLOBAL}.installed) return false")));
        assert!(script.contains("resp.clone().text()"));
        assert!(script.contains("return resp;"));
        assert!(script.contains("addEventListener('load'"));
        assert!(script.contains("console.warn"));
    }

    #[test]
    fn install_script_only_keeps_object_bodies() {
        let script = install_script("/v1/play");
        assert!(script.contains("if (payload === null || typeof payload !== 'object') return;"));
        // JSON-typed XHR bodies are passed through as parsed, never re-stringified.
        assert!(script.contains("capture(url, this.response);"));
        assert!(!script.contains("JSON.stringify"));
        assert!(script.contains("Number.isSafeInteger(d[k])"));
    }

    #[test]
    fn marker_is_escaped() {
        let script = install_script("/v1/\"play\"");
        assert!(script.contains(r#""marker":"/v1/\"play\"""#));
    }

    #[test]
    fn pop_script_carries_filter() {
        let filter = MatchFilter::since(Watermark(1234.5))
            .with_session(Some(SessionId::new("S-9")))
            .with_result_action(true);
        let script = pop_script(&filter);
        assert!(script.contains(r#""since":1234.5"#));
        assert!(script.contains(r#""session":"S-9""#));
        assert!(script.contains(r#""requireAction":"result""#));
        assert!(script.contains("s.buffer.splice(i, 1)[0]"));

        let script = pop_script(&MatchFilter::since(Watermark(0.0)));
        assert!(script.contains(r#""session":null"#));
        assert!(script.contains(r#""requireAction":null"#));
    }

    #[tokio::test]
    async fn install_reports_fresh_and_repeat() {
        let page = FakePage::new(vec![Value::Bool(true), Value::Bool(false)]);
        let obs = PageObserver::new(&page, "/v1/play");
        assert!(obs.install_hooks().await.unwrap());
        assert!(!obs.install_hooks().await.unwrap());
        assert_eq!(page.scripts().len(), 2);
    }

    #[tokio::test]
    async fn install_rejects_non_bool() {
        let page = FakePage::new(vec![json!("nope")]);
        let obs = PageObserver::new(&page, "/v1/play");
        assert!(matches!(
            obs.install_hooks().await,
            Err(EngineError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn now_reads_page_clock() {
        let page = FakePage::new(vec![json!(812.25)]);
        let obs = PageObserver::new(&page, "/v1/play");
        assert_eq!(obs.now().await.unwrap(), Watermark(812.25));
        assert_eq!(page.scripts()[0], "performance.now()");
    }

    #[tokio::test]
    async fn pop_decodes_page_entry() {
        let entry = json!({
            "captured_at_ms": 100.0,
            "source_url": "https://api.example/v1/play",
            "raw_payload": { "data": { "action": "pick", "result": "inprogress", "session_id": "S1", "level": 2 } },
            "action": "pick",
            "outcome": "inprogress",
            "session_id": "S1",
            "extras": { "level": 2 }
        });
        let page = FakePage::new(vec![entry, Value::Null]);
        let obs = PageObserver::new(&page, "/v1/play");

        let filter = MatchFilter::since(Watermark(50.0));
        let hit = obs.pop_match(&filter).await.unwrap().unwrap();
        assert_eq!(hit.outcome, Outcome::InProgress);
        assert_eq!(hit.session_id, Some(SessionId::new("S1")));
        assert_eq!(hit.extra("level"), Some(2));

        assert!(obs.pop_match(&filter).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pop_skips_extras_outside_i64() {
        let entry = json!({
            "captured_at_ms": 100.0,
            "source_url": "https://api.example/v1/play",
            "raw_payload": { "data": { "result": "win", "level": 1e20, "index": 3 } },
            "action": null,
            "outcome": "win",
            "session_id": null,
            "extras": { "level": 1e20, "index": 3 }
        });
        let page = FakePage::new(vec![entry]);
        let obs = PageObserver::new(&page, "/v1/play");

        let hit = obs
            .pop_match(&MatchFilter::since(Watermark(0.0)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.outcome, Outcome::Win);
        assert_eq!(hit.extra("level"), None);
        assert_eq!(hit.extra("index"), Some(3));
    }

    #[tokio::test]
    async fn pop_rejects_malformed_entry() {
        let page = FakePage::new(vec![json!({ "outcome": "win" })]);
        let obs = PageObserver::new(&page, "/v1/play");
        let err = obs
            .pop_match(&MatchFilter::since(Watermark(0.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Decode { .. }));
    }

    #[tokio::test]
    async fn flush_clears_page_buffer() {
        let page = FakePage::new(vec![Value::Bool(true)]);
        let obs = PageObserver::new(&page, "/v1/play");
        obs.flush().await.unwrap();
        assert!(page.scripts()[0].contains("s.buffer.length = 0"));
    }
}
