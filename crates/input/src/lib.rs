//! Input: raw window events, the per-frame event queue, and their mapping to actions.
//!
//! # Invariants
//! - Host callbacks only enqueue; nothing here mutates camera state directly.
//! - The first cursor sample after activation seeds the reference point and
//!   never produces a look delta.

pub mod action;
pub mod bindings;
pub mod event;
pub mod mapper;
pub mod queue;

pub use action::{Action, Direction, KeyPhase};
pub use bindings::{KeyBindings, ParseKeyError};
pub use event::{InputEvent, Key, KeyAction};
pub use mapper::{CursorTracker, InputMapper};
pub use queue::InputQueue;

pub fn crate_info() -> &'static str {
    "freelook-input v0.1.0"
}
