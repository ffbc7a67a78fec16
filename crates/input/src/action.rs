use serde::{Deserialize, Serialize};

/// Camera movement direction relative to the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    StrafeLeft,
    StrafeRight,
}

/// Which edge of a key event produced a movement action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    Press,
    Repeat,
    Release,
}

/// A high-level action produced from one raw input event.
///
/// The render loop consumes actions, never raw events. How a `Move` turns into
/// camera displacement depends on the loop's motion mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// A bound movement key changed state or repeated.
    Move { direction: Direction, phase: KeyPhase },
    /// Orientation deltas in degrees, already scaled by sensitivity.
    Look { pitch_delta: f32, yaw_delta: f32 },
    /// Framebuffer resize, unvalidated.
    Resize { width: i64, height: i64 },
    /// Stop the loop.
    Close,
    /// Nothing to do (unbound key, seeding cursor sample).
    Noop,
}

impl Action {
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }
}
