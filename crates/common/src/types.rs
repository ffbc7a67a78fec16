use serde::{Deserialize, Serialize};

/// Framebuffer dimensions in pixels. Both sides are always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    width: u32,
    height: u32,
}

impl Viewport {
    /// Build a viewport, or `None` if either dimension is not positive.
    pub fn new(width: i64, height: i64) -> Option<Self> {
        if width <= 0 || height <= 0 {
            return None;
        }
        Some(Self {
            width: u32::try_from(width).ok()?,
            height: u32::try_from(height).ok()?,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Apply a framebuffer resize. Non-positive dimensions are dropped and the
    /// last valid size is kept. Returns whether the viewport changed.
    pub fn resize(&mut self, width: i64, height: i64) -> bool {
        match Self::new(width, height) {
            Some(next) if next != *self => {
                *self = next;
                true
            }
            _ => false,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920 / 2,
            height: 1080 / 2,
        }
    }
}

/// Linear RGBA color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba(pub [f32; 4]);

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self([r, g, b, a])
    }

    pub fn r(&self) -> f32 {
        self.0[0]
    }

    pub fn g(&self) -> f32 {
        self.0[1]
    }

    pub fn b(&self) -> f32 {
        self.0[2]
    }

    pub fn a(&self) -> f32 {
        self.0[3]
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::new(0.2, 0.1, 0.5, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_rejects_non_positive() {
        assert!(Viewport::new(0, 600).is_none());
        assert!(Viewport::new(800, -1).is_none());
        assert!(Viewport::new(800, 600).is_some());
    }

    #[test]
    fn resize_keeps_last_valid_size() {
        let mut vp = Viewport::new(640, 480).unwrap();
        assert!(!vp.resize(0, 600));
        assert_eq!((vp.width(), vp.height()), (640, 480));

        assert!(vp.resize(800, 600));
        assert_eq!((vp.width(), vp.height()), (800, 600));

        // Same size again is not a change.
        assert!(!vp.resize(800, 600));
    }

    #[test]
    fn aspect_ratio() {
        let vp = Viewport::new(800, 400).unwrap();
        assert_eq!(vp.aspect(), 2.0);
    }

    #[test]
    fn default_clear_color() {
        let c = Rgba::default();
        assert_eq!(c.0, [0.2, 0.1, 0.5, 0.0]);
        assert_eq!(c.g(), 0.1);
    }
}
