use glam::Vec3;

/// Default camera speed in world units per impulse.
pub const DEFAULT_SPEED: f32 = 0.1;

const INITIAL_POSITION: Vec3 = Vec3::new(0.0, 0.0, 3.0);
const INITIAL_FORWARD: Vec3 = Vec3::new(0.0, 0.0, -1.0);

/// Discrete movement requests produced by key presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraImpulse {
    Forward,
    Backward,
    StrafeLeft,
    StrafeRight,
    Up,
    Down,
    Reset,
}

impl CameraImpulse {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "forward" => Self::Forward,
            "backward" | "back" => Self::Backward,
            "left" | "strafe-left" => Self::StrafeLeft,
            "right" | "strafe-right" => Self::StrafeRight,
            "up" => Self::Up,
            "down" => Self::Down,
            "reset" => Self::Reset,
            _ => return None,
        })
    }
}

/// Free-fly camera moved by constant-size impulses.
///
/// Movement is not scaled by frame time: every impulse moves the camera by
/// exactly `speed` units.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    forward: Vec3,
    up: Vec3,
    speed: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED)
    }
}

impl Camera {
    pub fn new(speed: f32) -> Self {
        Self {
            position: INITIAL_POSITION,
            forward: INITIAL_FORWARD,
            up: Vec3::Y,
            speed,
        }
    }

    /// Builds a camera with an arbitrary orientation. `forward` is normalized;
    /// a zero vector falls back to the initial forward direction.
    pub fn with_orientation(position: Vec3, forward: Vec3, speed: f32) -> Self {
        Self {
            position,
            forward: forward.try_normalize().unwrap_or(INITIAL_FORWARD),
            up: Vec3::Y,
            speed,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Applies a single impulse.
    pub fn apply(&mut self, impulse: CameraImpulse) {
        let step = self.speed;
        match impulse {
            CameraImpulse::Forward => self.position += step * self.forward,
            CameraImpulse::Backward => self.position -= step * self.forward,
            CameraImpulse::StrafeLeft => {
                if let Some(right) = self.right() {
                    self.position -= step * right;
                }
            }
            CameraImpulse::StrafeRight => {
                if let Some(right) = self.right() {
                    self.position += step * right;
                }
            }
            CameraImpulse::Up => self.position += step * self.up,
            CameraImpulse::Down => self.position -= step * self.up,
            CameraImpulse::Reset => {
                self.position = INITIAL_POSITION;
                self.forward = INITIAL_FORWARD;
            }
        }
    }

    /// Strafe axis, or `None` when forward is parallel to up.
    fn right(&self) -> Option<Vec3> {
        self.forward.cross(self.up).try_normalize()
    }
}
