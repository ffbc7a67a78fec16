use freelook_input::Direction;
use glam::{Mat4, Vec3};

/// Pitch is kept strictly inside this many degrees of the poles.
pub const PITCH_LIMIT: f32 = 89.0;

/// Default step per movement event.
pub const DEFAULT_SPEED: f32 = 0.7;

/// Free-look camera with position, yaw and pitch in degrees.
///
/// `front` is never stored independently: it is always the normalized
/// spherical-to-Cartesian image of `(yaw, pitch)`, and `up` is fixed world +Y.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    front: Vec3,
    up: Vec3,
    yaw: f32,
    pitch: f32,
    speed: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 3.0), -90.0, 0.0)
    }
}

impl Camera {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        let pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        Self {
            position,
            front: front_from_angles(yaw, pitch),
            up: Vec3::Y,
            yaw,
            pitch,
            speed: DEFAULT_SPEED,
        }
    }

    /// Build a camera looking along `front`. The direction is converted to
    /// yaw/pitch (pitch clamped), so a front along the up axis is tilted off it.
    pub fn looking_along(position: Vec3, front: Vec3) -> Self {
        let dir = front.try_normalize().unwrap_or(Vec3::NEG_Z);
        let pitch = dir.y.clamp(-1.0, 1.0).asin().to_degrees();
        let yaw = dir.z.atan2(dir.x).to_degrees();
        Self::new(position, yaw, pitch)
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Apply look deltas in degrees and re-derive `front`. Yaw is wrapped
    /// into `[0, 360)`.
    pub fn update_orientation(&mut self, pitch_delta: f32, yaw_delta: f32) {
        if !pitch_delta.is_finite() || !yaw_delta.is_finite() {
            tracing::debug!(pitch_delta, yaw_delta, "ignoring non-finite look delta");
            return;
        }
        self.yaw = (self.yaw + yaw_delta).rem_euclid(360.0);
        self.pitch = (self.pitch + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.front = front_from_angles(self.yaw, self.pitch);
    }

    /// Strafe axis, `None` if `front` and `up` are parallel.
    pub fn right(&self) -> Option<Vec3> {
        self.front.cross(self.up).try_normalize()
    }

    /// Move by `step` world units in `direction`.
    pub fn move_in(&mut self, direction: Direction, step: f32) {
        match direction {
            Direction::Forward => self.position += self.front * step,
            Direction::Backward => self.position -= self.front * step,
            Direction::StrafeLeft | Direction::StrafeRight => {
                let Some(right) = self.right() else {
                    tracing::warn!(front = ?self.front, "strafe skipped: front is parallel to up");
                    return;
                };
                if direction == Direction::StrafeRight {
                    self.position += right * step;
                } else {
                    self.position -= right * step;
                }
            }
        }
    }

    /// Move one fixed `speed` step in `direction`.
    pub fn step(&mut self, direction: Direction) {
        self.move_in(direction, self.speed);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }
}

fn front_from_angles(yaw: f32, pitch: f32) -> Vec3 {
    let (yaw, pitch) = (yaw.to_radians(), pitch.to_radians());
    Vec3::new(
        yaw.cos() * pitch.cos(),
        pitch.sin(),
        yaw.sin() * pitch.cos(),
    )
    .normalize()
}
