//! Chrome DevTools Protocol adapter for croupier.
//!
//! This crate connects to a running Chrome/Chromium page over its DevTools
//! WebSocket and provides what the session driver needs from a browser:
//!
//! - Find the page target (`/json/list`) when only a debugging port is known
//! - Track same-process frames (`Runtime.executionContextCreated`) and
//!   out-of-process iframes (`Target.setAutoAttach` with flat sessions)
//! - Locate the frame hosting the game canvas and focus it without a click
//! - Evaluate JavaScript in that frame (`Runtime.evaluate`)
//! - Dispatch key presses (`Input.dispatchKeyEvent`)
//!
//! # Architecture
//!
//! - **`cdp`**: Low-level WebSocket client with JSON-RPC command/response
//!   correlation, flat-session routing, and event dispatching.
//! - **`driver`**: High-level `BrowserDriver` wrapping the CDP client with
//!   frame discovery, evaluation, focus, and keyboard input.
//! - **`keys`**: Key-name to DevTools key event mapping.
//! - **`discovery`**: DevTools HTTP endpoint target listing.
//!
//! # Chrome Setup
//!
//! Chrome must be running with the `--remote-debugging-port` flag:
//!
//! ```sh
//! google-chrome --remote-debugging-port=9222
//! ```

pub mod cdp;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod keys;

pub use cdp::{CdpClient, CdpEvent};
pub use discovery::{discover_page_ws_url, DevToolsTarget};
pub use driver::{BrowserDriver, FrameTarget};
pub use error::BrowserError;
pub use keys::KeyDescriptor;
