use crate::action::{Action, KeyPhase};
use crate::bindings::KeyBindings;
use crate::event::{InputEvent, Key, KeyAction};

/// Degrees of rotation per pixel of cursor travel.
pub const DEFAULT_SENSITIVITY: f32 = 0.1;

/// Turns absolute cursor positions into deltas.
///
/// The first sample after activation (or after `reset`) only records the
/// reference point, so a cursor that starts far from the origin does not
/// produce a jump.
#[derive(Debug, Default, Clone, Copy)]
pub struct CursorTracker {
    last: Option<(f64, f64)>,
}

impl CursorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample and return `(dx, dy)` with `dy` positive upward.
    pub fn sample(&mut self, x: f64, y: f64) -> Option<(f64, f64)> {
        let delta = self.last.map(|(px, py)| (x - px, py - y));
        self.last = Some((x, y));
        delta
    }

    /// Forget the reference point; the next sample seeds again.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn is_seeded(&self) -> bool {
        self.last.is_some()
    }
}

/// Maps raw events to actions using key bindings and a look sensitivity.
#[derive(Debug, Clone)]
pub struct InputMapper {
    bindings: KeyBindings,
    cursor: CursorTracker,
    sensitivity: f32,
}

impl InputMapper {
    pub fn new(bindings: KeyBindings, sensitivity: f32) -> Self {
        Self {
            bindings,
            cursor: CursorTracker::new(),
            sensitivity,
        }
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    /// Re-arm first-sample seeding, e.g. after the cursor is re-captured.
    pub fn reset_cursor(&mut self) {
        self.cursor.reset();
    }

    pub fn map(&mut self, event: InputEvent) -> Action {
        match event {
            InputEvent::Key {
                key: Key::Escape,
                action: KeyAction::Press,
            } => Action::Close,
            InputEvent::Key { key, action } => match self.bindings.direction(key) {
                Some(direction) => Action::Move {
                    direction,
                    phase: match action {
                        KeyAction::Press => KeyPhase::Press,
                        KeyAction::Repeat => KeyPhase::Repeat,
                        KeyAction::Release => KeyPhase::Release,
                    },
                },
                None => Action::Noop,
            },
            InputEvent::CursorMoved { x, y } => match self.cursor.sample(x, y) {
                Some((dx, dy)) => Action::Look {
                    pitch_delta: dy as f32 * self.sensitivity,
                    yaw_delta: dx as f32 * self.sensitivity,
                },
                None => {
                    tracing::debug!(x, y, "cursor reference seeded");
                    Action::Noop
                }
            },
            InputEvent::FramebufferResized { width, height } => Action::Resize { width, height },
            InputEvent::CloseRequested => Action::Close,
            InputEvent::CursorReset => {
                self.cursor.reset();
                Action::Noop
            }
        }
    }
}

impl Default for InputMapper {
    fn default() -> Self {
        Self::new(KeyBindings::default(), DEFAULT_SENSITIVITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Direction;

    #[test]
    fn first_cursor_sample_only_seeds() {
        let mut m = InputMapper::default();
        assert_eq!(m.map(InputEvent::CursorMoved { x: 500.0, y: 300.0 }), Action::Noop);

        let a = m.map(InputEvent::CursorMoved { x: 510.0, y: 290.0 });
        match a {
            Action::Look {
                pitch_delta,
                yaw_delta,
            } => {
                assert!((yaw_delta - 1.0).abs() < 1e-6);
                // Cursor moved up the screen, camera pitches up.
                assert!((pitch_delta - 1.0).abs() < 1e-6);
            }
            other => panic!("expected look, got {other:?}"),
        }
    }

    #[test]
    fn reset_cursor_reseeds() {
        let mut m = InputMapper::default();
        m.map(InputEvent::CursorMoved { x: 0.0, y: 0.0 });
        m.reset_cursor();
        assert_eq!(m.map(InputEvent::CursorMoved { x: 900.0, y: 900.0 }), Action::Noop);
    }

    #[test]
    fn cursor_reset_event_reseeds_in_order() {
        let mut m = InputMapper::default();
        m.map(InputEvent::CursorMoved { x: 0.0, y: 0.0 });
        assert!(matches!(m.map(InputEvent::CursorMoved { x: 5.0, y: 0.0 }), Action::Look { .. }));
        assert_eq!(m.map(InputEvent::CursorReset), Action::Noop);
        assert_eq!(m.map(InputEvent::CursorMoved { x: 900.0, y: 900.0 }), Action::Noop);
        assert!(matches!(m.map(InputEvent::CursorMoved { x: 901.0, y: 900.0 }), Action::Look { .. }));
    }

    #[test]
    fn bound_keys_map_to_moves() {
        let mut m = InputMapper::default();
        assert_eq!(
            m.map(InputEvent::press(Key::Up)),
            Action::Move {
                direction: Direction::Forward,
                phase: KeyPhase::Press
            }
        );
        assert_eq!(
            m.map(InputEvent::Key {
                key: Key::A,
                action: KeyAction::Repeat
            }),
            Action::Move {
                direction: Direction::StrafeLeft,
                phase: KeyPhase::Repeat
            }
        );
        assert_eq!(
            m.map(InputEvent::release(Key::Down)),
            Action::Move {
                direction: Direction::Backward,
                phase: KeyPhase::Release
            }
        );
    }

    #[test]
    fn unbound_key_is_noop() {
        let mut m = InputMapper::default();
        assert_eq!(m.map(InputEvent::press(Key::Other(42))), Action::Noop);
    }

    #[test]
    fn escape_press_and_close_request_close() {
        let mut m = InputMapper::default();
        assert_eq!(m.map(InputEvent::press(Key::Escape)), Action::Close);
        assert_eq!(m.map(InputEvent::release(Key::Escape)), Action::Noop);
        assert_eq!(m.map(InputEvent::CloseRequested), Action::Close);
    }

    #[test]
    fn resize_passes_through() {
        let mut m = InputMapper::default();
        assert_eq!(
            m.map(InputEvent::FramebufferResized {
                width: 0,
                height: 600
            }),
            Action::Resize {
                width: 0,
                height: 600
            }
        );
    }
}
