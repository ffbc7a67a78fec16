use serde::{Deserialize, Serialize};

/// Keys the core knows by name. Everything else arrives as `Other` with the
/// host's key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    W,
    A,
    S,
    D,
    Escape,
    Other(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press,
    Repeat,
    Release,
}

/// Raw event forwarded by the windowing host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Key { key: Key, action: KeyAction },
    /// Cursor position in window-local coordinates.
    CursorMoved { x: f64, y: f64 },
    /// Framebuffer size as reported by the host. May be zero while minimized.
    FramebufferResized { width: i64, height: i64 },
    CloseRequested,
    /// The host re-captured the pointer; the next cursor sample seeds again.
    CursorReset,
}

impl InputEvent {
    pub fn press(key: Key) -> Self {
        Self::Key {
            key,
            action: KeyAction::Press,
        }
    }

    pub fn release(key: Key) -> Self {
        Self::Key {
            key,
            action: KeyAction::Release,
        }
    }
}
