use crate::camera::{Camera, DEFAULT_SPEED};
use crate::error::ConfigError;
use crate::render_loop::MotionMode;
use crate::scene::ScenePreset;
use freelook_common::Rgba;
use freelook_input::mapper::DEFAULT_SENSITIVITY;
use freelook_input::{InputMapper, KeyBindings};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Initial camera placement and control tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    /// Degrees.
    pub yaw: f32,
    /// Degrees, clamped to [-89, 89] on use.
    pub pitch: f32,
    /// World units per movement step.
    pub speed: f32,
    /// Degrees per pixel of cursor travel.
    pub sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            yaw: -90.0,
            pitch: 0.0,
            speed: DEFAULT_SPEED,
            sensitivity: DEFAULT_SENSITIVITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1920 / 2,
            height: 1080 / 2,
            title: "freelook".into(),
        }
    }
}

/// Everything needed to start a render session. Every field has a default,
/// so an empty YAML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub scene: ScenePreset,
    pub motion: MotionMode,
    pub clear_color: Rgba,
    pub camera: CameraConfig,
    pub window: WindowConfig,
    /// Extra bindings layered over the arrow-key and WASD defaults.
    pub bindings: KeyBindings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scene: ScenePreset::default(),
            motion: MotionMode::default(),
            clear_color: Rgba::default(),
            camera: CameraConfig::default(),
            window: WindowConfig::default(),
            bindings: KeyBindings::empty(),
        }
    }
}

impl SessionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml(&text)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded session config");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let cam = &self.camera;
        if !(cam.speed.is_finite() && cam.speed > 0.0) {
            return Err(ConfigError::Invalid(format!("camera.speed must be positive, got {}", cam.speed)));
        }
        if !(cam.sensitivity.is_finite() && cam.sensitivity > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "camera.sensitivity must be positive, got {}",
                cam.sensitivity
            )));
        }
        if !(cam.position.is_finite() && cam.yaw.is_finite() && cam.pitch.is_finite()) {
            return Err(ConfigError::Invalid("camera placement must be finite".into()));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        if self.clear_color.0.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::Invalid("clear_color must be finite".into()));
        }
        Ok(())
    }

    pub fn build_camera(&self) -> Camera {
        Camera::new(self.camera.position, self.camera.yaw, self.camera.pitch).with_speed(self.camera.speed)
    }

    pub fn build_mapper(&self) -> InputMapper {
        let mut bindings = KeyBindings::default();
        bindings.merge(&self.bindings);
        InputMapper::new(bindings, self.camera.sensitivity)
    }
}
