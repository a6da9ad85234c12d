//! Capabilities implemented over Chrome DevTools.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use croupier_browser::{discover_page_ws_url, BrowserDriver, KeyDescriptor};
use croupier_types::{BrowserConfig, InputAction, InputConfig, KeyBindings};

use crate::capability::{InputChannel, Navigation, PageExecution};
use crate::error::EngineError;
use crate::pacing::pause;

/// Selector of the element the game renders into.
pub const GAME_SURFACE: &str = "canvas";

/// A DevTools page acting as the engine's browser.
pub struct CdpPage {
    driver: Mutex<BrowserDriver>,
    keys: HashMap<InputAction, KeyDescriptor>,
    input: InputConfig,
    probe_interval: Duration,
}

impl CdpPage {
    /// Connect to the configured page.
    ///
    /// Uses `browser.ws_url` when set, otherwise lists targets on
    /// `browser.host:browser.port`.
    pub async fn connect(
        browser: &BrowserConfig,
        keys: &KeyBindings,
        input: InputConfig,
    ) -> Result<Self, EngineError> {
        // Resolve keys before touching the network so a bad binding fails fast.
        let keys = resolve_keys(keys)?;

        let ws_url = match &browser.ws_url {
            Some(url) => url.clone(),
            None => {
                discover_page_ws_url(
                    &browser.host,
                    browser.port,
                    browser.target_url_filter.as_deref(),
                )
                .await?
            }
        };

        let driver = BrowserDriver::connect(&ws_url, browser.command_timeout()).await?;
        Ok(Self {
            driver: Mutex::new(driver),
            keys,
            input,
            probe_interval: browser.frame_probe_interval(),
        })
    }
}

#[async_trait]
impl PageExecution for CdpPage {
    async fn evaluate(&self, script: &str) -> Result<Value, EngineError> {
        let mut driver = self.driver.lock().await;
        Ok(driver.evaluate(script).await?)
    }
}

#[async_trait]
impl InputChannel for CdpPage {
    async fn press(&self, action: InputAction) -> Result<(), EngineError> {
        let key = self.keys.get(&action).ok_or_else(|| EngineError::Capability {
            capability: "input".into(),
            detail: format!("no key bound to {action}"),
        })?;

        pause(&self.input.pre_delay).await;
        {
            let mut driver = self.driver.lock().await;
            driver.press_key(key).await?;
        }
        tracing::debug!(%action, class = ?action.class(), key = %key.code, "input sent");
        pause(&self.input.settle).await;
        Ok(())
    }
}

#[async_trait]
impl Navigation for CdpPage {
    async fn enter_game_frame(&self, timeout: Duration) -> Result<(), EngineError> {
        tracing::info!(?timeout, "searching for game frame (with a <canvas>)");
        let mut driver = self.driver.lock().await;
        let frame = driver
            .find_frame_with(GAME_SURFACE, timeout, self.probe_interval)
            .await?;
        tracing::info!(frame_id = %frame.frame_id, "switched into game frame");
        Ok(())
    }

    async fn focus_surface(&self) -> Result<(), EngineError> {
        let mut driver = self.driver.lock().await;
        driver.focus_element_without_click(GAME_SURFACE).await?;
        Ok(())
    }
}

/// Map each logical input to its concrete key.
pub fn resolve_keys(bindings: &KeyBindings) -> Result<HashMap<InputAction, KeyDescriptor>, EngineError> {
    [InputAction::Bet, InputAction::Pick, InputAction::CashOut]
        .into_iter()
        .map(|action| -> Result<_, EngineError> {
            let key = KeyDescriptor::parse(bindings.key_for(action))?;
            Ok((action, key))
        })
        .collect()
}
