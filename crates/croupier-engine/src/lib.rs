//! Result correlation and strategy automaton for croupier.
//!
//! The engine turns key presses into decisions. Every input is preceded by
//! a watermark on the page clock; the network observer running inside the
//! game frame appends each play response to a buffer; the correlator pops
//! the first buffered result captured at or after the watermark. The
//! automaton branches on that result according to the game's profile.
//!
//! # Architecture
//!
//! - **`capability`**: Traits for what the engine needs from the outside
//!   world (script evaluation, key input, frame navigation, observations).
//! - **`observer`**: `PageObserver`, the in-page fetch/XHR hook and its
//!   page-resident buffer.
//! - **`buffer`**: `MemoryBuffer`, the in-process buffer with the same
//!   atomic pop semantics.
//! - **`correlator`**: Bounded polling for a matching result.
//! - **`automaton`**: The per-round state machine shared by every game.
//! - **`session`**: Frame entry, focus, observer install, automaton run.
//! - **`page`**: `CdpPage`, the capabilities implemented over DevTools.

pub mod automaton;
pub mod buffer;
pub mod capability;
pub mod correlator;
pub mod error;
pub mod observer;
pub mod pacing;
pub mod page;
pub mod report;
pub mod session;

pub use automaton::{Automaton, StrategyState, Tally};
pub use buffer::MemoryBuffer;
pub use capability::{InputChannel, Navigation, ObservationSource, PageExecution};
pub use correlator::Correlator;
pub use error::EngineError;
pub use observer::PageObserver;
pub use page::CdpPage;
pub use report::SessionReport;
pub use session::SessionDriver;
