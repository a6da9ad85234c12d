//! High-level browser driver wrapping the CDP client.
//!
//! The game client renders into a `<canvas>` inside an iframe that may live
//! in the page's renderer process or, for cross-site embeds, in its own
//! process. The driver keeps a registry of every frame's default execution
//! context so it can probe them all, select the one hosting the game, and
//! evaluate scripts there. Keyboard input is dispatched to the top-level
//! page; Chrome routes it to whichever frame holds focus.

use std::time::Duration;

use serde_json::Value;

use crate::cdp::{CdpClient, CdpEvent};
use crate::error::BrowserError;
use crate::keys::{build_key_event_params, KeyDescriptor};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A frame that scripts can be evaluated in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTarget {
    /// CDP frame id.
    pub frame_id: String,
    /// Flat session id for out-of-process iframes; `None` for frames owned
    /// by the page's own renderer.
    pub session_id: Option<String>,
    /// Default (main world) execution context of the frame.
    pub context_id: i64,
}

/// A child target that was just attached and still needs its domains enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedTarget {
    pub session_id: String,
    pub target_type: String,
    pub waiting_for_debugger: bool,
}

/// Default execution contexts of every known frame, in creation order.
#[derive(Debug, Default)]
pub struct FrameRegistry {
    frames: Vec<FrameTarget>,
    main_frame_id: Option<String>,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_main_frame(&mut self, frame_id: impl Into<String>) {
        self.main_frame_id = Some(frame_id.into());
    }

    /// Fold one CDP event into the registry.
    ///
    /// Returns the child target when the event announces a newly attached
    /// session, so the caller can enable `Runtime` on it.
    pub fn apply(&mut self, event: &CdpEvent) -> Option<AttachedTarget> {
        let session = event.session_id.clone();
        match event.method.as_str() {
            "Runtime.executionContextCreated" => {
                let ctx = event.params.get("context")?;
                let aux = ctx.get("auxData")?;
                if !aux.get("isDefault").and_then(Value::as_bool).unwrap_or(false) {
                    return None;
                }
                let frame_id = aux.get("frameId")?.as_str()?.to_string();
                let context_id = ctx.get("id")?.as_i64()?;
                // A navigated frame gets a fresh context; keep only the latest.
                self.frames
                    .retain(|f| !(f.frame_id == frame_id && f.session_id == session));
                tracing::debug!(frame_id = %frame_id, context_id, session = ?session, "frame context created");
                self.frames.push(FrameTarget {
                    frame_id,
                    session_id: session,
                    context_id,
                });
                None
            }
            "Runtime.executionContextDestroyed" => {
                let id = event.params.get("executionContextId")?.as_i64()?;
                self.frames
                    .retain(|f| !(f.context_id == id && f.session_id == session));
                None
            }
            "Runtime.executionContextsCleared" => {
                self.frames.retain(|f| f.session_id != session);
                None
            }
            "Target.attachedToTarget" => {
                let session_id = event.params.get("sessionId")?.as_str()?.to_string();
                let target_type = event
                    .params
                    .get("targetInfo")
                    .and_then(|t| t.get("type"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let waiting_for_debugger = event
                    .params
                    .get("waitingForDebugger")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                Some(AttachedTarget {
                    session_id,
                    target_type,
                    waiting_for_debugger,
                })
            }
            "Target.detachedFromTarget" => {
                let detached = event.params.get("sessionId")?.as_str()?;
                self.frames
                    .retain(|f| f.session_id.as_deref() != Some(detached));
                None
            }
            _ => None,
        }
    }

    /// Frames to probe for the game surface: child frames first, in the
    /// order they appeared, then the main frame.
    pub fn candidates(&self) -> Vec<FrameTarget> {
        let is_main = |f: &FrameTarget| {
            f.session_id.is_none() && self.main_frame_id.as_deref() == Some(f.frame_id.as_str())
        };
        let mut out: Vec<FrameTarget> = self.frames.iter().filter(|f| !is_main(f)).cloned().collect();
        out.extend(self.frames.iter().filter(|f| is_main(f)).cloned());
        out
    }

    pub fn contains(&self, frame: &FrameTarget) -> bool {
        self.frames.contains(frame)
    }

    /// The live context of a frame, if it has one.
    pub fn current(&self, frame_id: &str, session_id: Option<&str>) -> Option<FrameTarget> {
        self.frames
            .iter()
            .find(|f| f.frame_id == frame_id && f.session_id.as_deref() == session_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

// ---------------------------------------------------------------------------
// BrowserDriver
// ---------------------------------------------------------------------------

/// Browser driver scoped to one page target and the frames inside it.
///
/// # Example (conceptual)
///
/// ```ignore
/// let mut driver = BrowserDriver::connect(ws_url, Duration::from_secs(30)).await?;
/// driver
///     .find_frame_with("canvas", Duration::from_secs(90), Duration::from_secs(1))
///     .await?;
/// driver.focus_element_without_click("canvas").await?;
/// driver.press_key(&KeyDescriptor::parse("Space")?).await?;
/// ```
pub struct BrowserDriver {
    client: CdpClient,
    registry: FrameRegistry,
    selected: Option<FrameTarget>,
}

impl BrowserDriver {
    /// Connect to a Chrome DevTools page target.
    ///
    /// Enables the Page and Runtime domains and turns on flat auto-attach so
    /// out-of-process iframes show up as child sessions.
    pub async fn connect(ws_url: &str, command_timeout: Duration) -> Result<Self, BrowserError> {
        let client = CdpClient::connect(ws_url)
            .await?
            .with_command_timeout(command_timeout);
        let mut driver = Self::from_client(client);

        driver.client.enable_domain("Page").await?;
        driver.client.enable_domain("Runtime").await?;
        driver
            .client
            .send_command("Target.setAutoAttach", build_auto_attach_params())
            .await?;

        let tree = driver
            .client
            .send_command("Page.getFrameTree", serde_json::json!({}))
            .await?;
        if let Some(main) = main_frame_id(&tree) {
            driver.registry.set_main_frame(main);
        }

        driver.pump_events().await?;
        Ok(driver)
    }

    /// Create a driver from an existing CDP client (for testing or advanced use).
    pub fn from_client(client: CdpClient) -> Self {
        Self {
            client,
            registry: FrameRegistry::new(),
            selected: None,
        }
    }

    /// Return a reference to the underlying CDP client for direct command access.
    pub fn client(&self) -> &CdpClient {
        &self.client
    }

    /// The frame scripts currently evaluate in, if one has been selected.
    pub fn selected_frame(&self) -> Option<&FrameTarget> {
        self.selected.as_ref()
    }

    /// Drain buffered events into the frame registry.
    ///
    /// Newly attached child sessions get `Runtime` enabled and auto-attach
    /// propagated so nested iframes are tracked too.
    pub async fn pump_events(&mut self) -> Result<(), BrowserError> {
        let mut attached = Vec::new();
        while let Some(event) = self.client.try_recv_event() {
            if let Some(target) = self.registry.apply(&event) {
                attached.push(target);
            }
        }

        for target in attached {
            tracing::debug!(session = %target.session_id, kind = %target.target_type, "child target attached");
            if target.target_type == "iframe" {
                self.client
                    .send_session_command(&target.session_id, "Runtime.enable", serde_json::json!({}))
                    .await?;
                self.client
                    .send_session_command(
                        &target.session_id,
                        "Target.setAutoAttach",
                        build_auto_attach_params(),
                    )
                    .await?;
            }
            if target.waiting_for_debugger {
                self.client
                    .send_session_command(
                        &target.session_id,
                        "Runtime.runIfWaitingForDebugger",
                        serde_json::json!({}),
                    )
                    .await?;
            }
        }

        self.follow_selected_frame();
        Ok(())
    }

    /// Re-point the selection at the frame's current context after the
    /// frame was reloaded.
    fn follow_selected_frame(&mut self) {
        let Some(selected) = &self.selected else {
            return;
        };
        if self.registry.contains(selected) {
            return;
        }
        match self
            .registry
            .current(&selected.frame_id, selected.session_id.as_deref())
        {
            Some(fresh) => {
                tracing::info!(
                    frame_id = %fresh.frame_id,
                    context_id = fresh.context_id,
                    "selected frame has a new context"
                );
                self.selected = Some(fresh);
            }
            None => {
                tracing::warn!(frame_id = %selected.frame_id, "selected frame context went away");
            }
        }
    }

    /// Probe every known frame for `selector` until one matches.
    ///
    /// The matching frame becomes the selected frame. Frames whose context
    /// disappears mid-probe are skipped. Fails with
    /// [`BrowserError::FrameNotFound`] once `timeout` has elapsed.
    pub async fn find_frame_with(
        &mut self,
        selector: &str,
        timeout: Duration,
        probe_interval: Duration,
    ) -> Result<FrameTarget, BrowserError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let probe = build_selector_probe_expression(selector);

        loop {
            self.pump_events().await?;

            for frame in self.registry.candidates() {
                match self.evaluate_in(Some(&frame), &probe).await {
                    Ok(Value::Bool(true)) => {
                        tracing::info!(
                            frame_id = %frame.frame_id,
                            out_of_process = frame.session_id.is_some(),
                            "found frame containing '{selector}'"
                        );
                        self.selected = Some(frame.clone());
                        return Ok(frame);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(frame_id = %frame.frame_id, error = %e, "frame probe failed");
                    }
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                tracing::warn!(frames = self.registry.len(), selector, "no frame matched");
                return Err(BrowserError::FrameNotFound {
                    selector: selector.to_string(),
                    duration: timeout,
                });
            }
            let remaining = deadline.saturating_duration_since(now);
            tokio::time::sleep(probe_interval.min(remaining)).await;
        }
    }

    /// Focus an element in the selected frame without clicking it.
    ///
    /// Elements such as `<canvas>` are not focusable until they carry a
    /// `tabindex`, so one is set first.
    pub async fn focus_element_without_click(&mut self, selector: &str) -> Result<(), BrowserError> {
        let focused = self
            .evaluate(&build_focus_expression(selector))
            .await?;
        if focused != Value::Bool(true) {
            return Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
            });
        }
        tracing::debug!(selector, "focused element without click");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // JavaScript evaluation
    // -----------------------------------------------------------------------

    /// Evaluate a JavaScript expression in the selected frame, or in the
    /// page's main world when no frame has been selected.
    ///
    /// Events that arrived meanwhile are folded into the frame registry.
    pub async fn evaluate(&mut self, expression: &str) -> Result<Value, BrowserError> {
        let value = self.evaluate_in(self.selected.as_ref(), expression).await;
        self.pump_events().await?;
        value
    }

    /// Evaluate a JavaScript expression in a specific frame.
    ///
    /// Returns the evaluated result by value. If the expression throws, the
    /// exception is returned as [`BrowserError::JsException`].
    pub async fn evaluate_in(
        &self,
        frame: Option<&FrameTarget>,
        expression: &str,
    ) -> Result<Value, BrowserError> {
        let params = build_evaluate_params(expression, frame.map(|f| f.context_id));
        let result = match frame.and_then(|f| f.session_id.as_deref()) {
            Some(session) => {
                self.client
                    .send_session_command(session, "Runtime.evaluate", params)
                    .await?
            }
            None => self.client.send_command("Runtime.evaluate", params).await?,
        };

        if let Some(message) = exception_message(&result) {
            return Err(BrowserError::JsException { message });
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    // -----------------------------------------------------------------------
    // Keyboard
    // -----------------------------------------------------------------------

    /// Press and release one key.
    pub async fn press_key(&mut self, key: &KeyDescriptor) -> Result<(), BrowserError> {
        self.client
            .send_command("Input.dispatchKeyEvent", build_key_event_params(key, true))
            .await?;
        self.client
            .send_command("Input.dispatchKeyEvent", build_key_event_params(key, false))
            .await?;
        tracing::trace!(key = %key.code, "key pressed");
        self.pump_events().await
    }
}

// ---------------------------------------------------------------------------
// Param builders (pure functions, testable without Chrome)
// ---------------------------------------------------------------------------

/// Build `Runtime.evaluate` params, optionally pinned to a context.
pub fn build_evaluate_params(expression: &str, context_id: Option<i64>) -> Value {
    let mut params = serde_json::json!({
        "expression": expression,
        "returnByValue": true,
        "awaitPromise": true,
    });
    if let Some(id) = context_id {
        params["contextId"] = Value::from(id);
    }
    params
}

/// Build `Target.setAutoAttach` params for flat child sessions.
pub fn build_auto_attach_params() -> Value {
    serde_json::json!({
        "autoAttach": true,
        "waitForDebuggerOnStart": false,
        "flatten": true,
    })
}

/// Expression that is `true` when the frame's document has `selector`.
pub fn build_selector_probe_expression(selector: &str) -> String {
    format!("!!document.querySelector({})", js_string(selector))
}

/// Expression that makes `selector` focusable and focuses it.
pub fn build_focus_expression(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); \
         if (!el) return false; \
         el.setAttribute('tabindex', '0'); el.focus(); return true; }})()",
        js_string(selector)
    )
}

/// Extract the main frame id from a `Page.getFrameTree` result.
pub fn main_frame_id(tree: &Value) -> Option<String> {
    tree.get("frameTree")?
        .get("frame")?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

/// Pull a readable message out of `exceptionDetails`, if present.
pub fn exception_message(result: &Value) -> Option<String> {
    let exception = result.get("exceptionDetails")?;
    let message = exception
        .get("exception")
        .and_then(|e| e.get("description"))
        .and_then(Value::as_str)
        .or_else(|| exception.get("text").and_then(Value::as_str))
        .unwrap_or("unknown exception");
    Some(message.to_string())
}

fn js_string(s: &str) -> String {
    // serde_json string encoding is a valid JS string literal.
    Value::String(s.to_string()).to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::tungstenite::Message;

    fn event(method: &str, params: Value, session: Option<&str>) -> CdpEvent {
        CdpEvent {
            method: method.to_string(),
            params,
            session_id: session.map(str::to_string),
        }
    }

    fn context_created(id: i64, frame: &str, default: bool, session: Option<&str>) -> CdpEvent {
        event(
            "Runtime.executionContextCreated",
            serde_json::json!({
                "context": {
                    "id": id,
                    "origin": "https://casino.example",
                    "auxData": { "frameId": frame, "isDefault": default }
                }
            }),
            session,
        )
    }

    #[test]
    fn registry_tracks_default_contexts_only() {
        let mut reg = FrameRegistry::new();
        reg.apply(&context_created(1, "MAIN", true, None));
        reg.apply(&context_created(2, "MAIN", false, None));
        reg.apply(&context_created(3, "GAME", true, None));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn registry_orders_child_frames_before_main() {
        let mut reg = FrameRegistry::new();
        reg.set_main_frame("MAIN");
        reg.apply(&context_created(1, "MAIN", true, None));
        reg.apply(&context_created(2, "ADS", true, None));
        reg.apply(&context_created(7, "GAME", true, Some("S1")));

        let ids: Vec<_> = reg.candidates().into_iter().map(|f| f.frame_id).collect();
        assert_eq!(ids, vec!["ADS", "GAME", "MAIN"]);
    }

    #[test]
    fn registry_replaces_context_after_navigation() {
        let mut reg = FrameRegistry::new();
        reg.apply(&context_created(3, "GAME", true, None));
        reg.apply(&context_created(9, "GAME", true, None));
        let frames = reg.candidates();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].context_id, 9);
    }

    #[test]
    fn registry_forgets_destroyed_and_cleared_contexts() {
        let mut reg = FrameRegistry::new();
        reg.apply(&context_created(1, "MAIN", true, None));
        reg.apply(&context_created(4, "GAME", true, Some("S1")));
        // Same numeric id in a different session must not be touched.
        reg.apply(&context_created(1, "INNER", true, Some("S1")));

        reg.apply(&event(
            "Runtime.executionContextDestroyed",
            serde_json::json!({ "executionContextId": 1 }),
            None,
        ));
        assert_eq!(reg.len(), 2);

        reg.apply(&event(
            "Runtime.executionContextsCleared",
            serde_json::json!({}),
            Some("S1"),
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn registry_reports_attached_targets_and_drops_detached() {
        let mut reg = FrameRegistry::new();
        let attached = reg
            .apply(&event(
                "Target.attachedToTarget",
                serde_json::json!({
                    "sessionId": "S1",
                    "targetInfo": { "targetId": "T1", "type": "iframe", "url": "https://games.example/" },
                    "waitingForDebugger": false
                }),
                None,
            ))
            .unwrap();
        assert_eq!(attached.session_id, "S1");
        assert_eq!(attached.target_type, "iframe");
        assert!(!attached.waiting_for_debugger);

        reg.apply(&context_created(5, "T1", true, Some("S1")));
        assert_eq!(reg.len(), 1);
        reg.apply(&event(
            "Target.detachedFromTarget",
            serde_json::json!({ "sessionId": "S1" }),
            None,
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn registry_ignores_malformed_events() {
        let mut reg = FrameRegistry::new();
        assert!(reg
            .apply(&event("Runtime.executionContextCreated", serde_json::json!({}), None))
            .is_none());
        assert!(reg
            .apply(&event("Page.loadEventFired", serde_json::json!({}), None))
            .is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn evaluate_params_pin_context() {
        let p = build_evaluate_params("1 + 1", Some(12));
        assert_eq!(p["expression"], "1 + 1");
        assert_eq!(p["returnByValue"], true);
        assert_eq!(p["awaitPromise"], true);
        assert_eq!(p["contextId"], 12);

        let p = build_evaluate_params("1", None);
        assert!(p.get("contextId").is_none());
    }

    #[test]
    fn auto_attach_is_flat() {
        let p = build_auto_attach_params();
        assert_eq!(p["autoAttach"], true);
        assert_eq!(p["flatten"], true);
        assert_eq!(p["waitForDebuggerOnStart"], false);
    }

    #[test]
    fn selector_is_escaped_in_scripts() {
        let probe = build_selector_probe_expression("div[data-x=\"a\"]");
        assert_eq!(probe, r#"!!document.querySelector("div[data-x=\"a\"]")"#);

        let focus = build_focus_expression("canvas");
        assert!(focus.contains(r#"document.querySelector("canvas")"#));
        assert!(focus.contains("setAttribute('tabindex', '0')"));
        assert!(focus.contains("el.focus()"));
        assert!(!focus.contains("click"));
    }

    #[test]
    fn main_frame_id_from_tree() {
        let tree = serde_json::json!({
            "frameTree": { "frame": { "id": "F0", "url": "https://casino.example/" }, "childFrames": [] }
        });
        assert_eq!(main_frame_id(&tree).as_deref(), Some("F0"));
        assert!(main_frame_id(&serde_json::json!({})).is_none());
    }

    #[test]
    fn exception_message_prefers_description() {
        let r = serde_json::json!({
            "result": { "type": "object" },
            "exceptionDetails": {
                "text": "Uncaught",
                "exception": { "description": "ReferenceError: foo is not defined" }
            }
        });
        assert_eq!(
            exception_message(&r).as_deref(),
            Some("ReferenceError: foo is not defined")
        );

        let r = serde_json::json!({ "exceptionDetails": { "text": "Uncaught" } });
        assert_eq!(exception_message(&r).as_deref(), Some("Uncaught"));

        let r = serde_json::json!({ "result": { "value": 2 } });
        assert!(exception_message(&r).is_none());
    }

    // -----------------------------------------------------------------------
    // Event draining against a local DevTools endpoint
    // -----------------------------------------------------------------------

    /// Answer every command; before each `Runtime.evaluate` reply, emit the
    /// next batch of events.
    async fn serve_devtools(batches: Vec<Vec<Value>>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut batches: VecDeque<Vec<Value>> = batches.into();
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let cmd: Value = serde_json::from_str(text.as_str()).unwrap();
                let result = match cmd["method"].as_str().unwrap_or_default() {
                    "Page.getFrameTree" => json!({ "frameTree": { "frame": { "id": "MAIN" } } }),
                    "Runtime.evaluate" => {
                        for event in batches.pop_front().unwrap_or_default() {
                            ws.send(Message::Text(event.to_string().into())).await.unwrap();
                        }
                        json!({ "result": { "type": "number", "value": 2 } })
                    }
                    _ => json!({}),
                };
                let reply = json!({ "id": cmd["id"], "result": result });
                ws.send(Message::Text(reply.to_string().into())).await.unwrap();
            }
        });
        format!("ws://{addr}")
    }

    fn raw_context_created(id: i64, frame: &str) -> Value {
        json!({
            "method": "Runtime.executionContextCreated",
            "params": { "context": { "id": id, "auxData": { "frameId": frame, "isDefault": true } } }
        })
    }

    #[tokio::test]
    async fn evaluate_drains_events_received_with_it() {
        let mut batch: Vec<Value> = (0..200)
            .map(|i| {
                json!({
                    "method": "Runtime.consoleAPICalled",
                    "params": { "type": "log", "args": [{ "type": "number", "value": i }] }
                })
            })
            .collect();
        batch.push(raw_context_created(1, "MAIN"));
        let url = serve_devtools(vec![batch]).await;

        let mut driver = BrowserDriver::connect(&url, Duration::from_secs(5)).await.unwrap();
        assert!(driver.registry.is_empty());

        assert_eq!(driver.evaluate("1 + 1").await.unwrap(), json!(2));
        assert_eq!(driver.registry.len(), 1);
        assert!(driver.client.try_recv_event().is_none());
    }

    #[tokio::test]
    async fn selection_follows_a_reloaded_frame() {
        let url = serve_devtools(vec![
            vec![raw_context_created(3, "GAME")],
            vec![
                json!({
                    "method": "Runtime.executionContextDestroyed",
                    "params": { "executionContextId": 3 }
                }),
                raw_context_created(9, "GAME"),
            ],
        ])
        .await;

        let mut driver = BrowserDriver::connect(&url, Duration::from_secs(5)).await.unwrap();
        driver.evaluate("1 + 1").await.unwrap();
        driver.selected = driver.registry.current("GAME", None);
        assert_eq!(driver.selected_frame().map(|f| f.context_id), Some(3));

        driver.evaluate("1 + 1").await.unwrap();
        assert_eq!(driver.selected_frame().map(|f| f.context_id), Some(9));
    }
}
