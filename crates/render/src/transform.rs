use crate::camera::Camera;
use freelook_common::Viewport;
use glam::{Mat4, Vec3};

pub const FIELD_OF_VIEW_DEGREES: f32 = 45.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;

/// Phase advance per frame at the reference frame rate.
pub const PHASE_STEP: f32 = 0.05;

/// Frame rate at which timed motion matches per-event motion.
pub const REFERENCE_FRAME_RATE: f32 = 60.0;

pub fn projection(viewport: Viewport) -> Mat4 {
    Mat4::perspective_rh(
        FIELD_OF_VIEW_DEGREES.to_radians(),
        viewport.aspect(),
        NEAR_PLANE,
        FAR_PLANE,
    )
}

/// Matrices and color pushed to the program for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub color: Vec3,
}

impl FrameTransforms {
    pub fn compute(animation: &Animation, camera: &Camera, viewport: Viewport) -> Self {
        Self {
            model: animation.model(),
            view: camera.view_matrix(),
            projection: projection(viewport),
            color: animation.color(),
        }
    }
}

impl Default for FrameTransforms {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            color: Vec3::ZERO,
        }
    }
}

/// Monotonic phase driving the model spin and the color cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Animation {
    phase: f32,
}

impl Animation {
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Advance by `scale` reference frames.
    pub fn advance(&mut self, scale: f32) {
        self.phase += PHASE_STEP * scale;
    }

    /// Rotation about +Z by the phase, at unit scale.
    pub fn model(&self) -> Mat4 {
        Mat4::from_rotation_z(self.phase) * Mat4::from_scale(Vec3::ONE)
    }

    pub fn color(&self) -> Vec3 {
        Vec3::new(0.5, self.phase.sin().abs(), self.phase.cos().abs())
    }
}
