//! Velocity vectors, the mapper's mutable state, and the published command.

use serde::{Deserialize, Serialize};

/// Three-component vector in the robot's body frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    /// Forward / backward component.
    pub x: f64,
    /// Left / right component.
    pub y: f64,
    /// Up / down component (yaw when used as an angular vector).
    pub z: f64,
}

impl Vector3 {
    /// The zero vector.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Construct a vector from its components.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Velocity command published on the messaging channel.
///
/// Serialises to `{"linear":{"x","y","z"},"angular":{"x","y","z"}}`, the
/// field shape of a `geometry_msgs/Twist`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityCommand {
    /// Linear velocity.
    pub linear: Vector3,
    /// Angular velocity.
    pub angular: Vector3,
}

impl VelocityCommand {
    /// Whether this command asks the robot to stand still.
    #[must_use]
    pub fn is_stop(&self) -> bool {
        self.linear == Vector3::ZERO && self.angular == Vector3::ZERO
    }
}

/// Mutable teleoperation state: the held command plus the two gains.
///
/// Gains drift multiplicatively with every speed key and are never
/// published.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VelocityState {
    /// Currently held linear velocity.
    pub linear: Vector3,
    /// Currently held angular velocity.
    pub angular: Vector3,
    /// Linear gain applied to movement bindings.
    pub speed: f64,
    /// Angular gain applied to movement bindings.
    pub turn: f64,
}

impl VelocityState {
    /// Create a stopped state with the given gains.
    #[must_use]
    pub const fn new(speed: f64, turn: f64) -> Self {
        Self {
            linear: Vector3::ZERO,
            angular: Vector3::ZERO,
            speed,
            turn,
        }
    }

    /// Zero both vectors, leaving the gains untouched.
    pub fn stop(&mut self) {
        self.linear = Vector3::ZERO;
        self.angular = Vector3::ZERO;
    }

    /// The publishable part of the state.
    #[must_use]
    pub const fn command(&self) -> VelocityCommand {
        VelocityCommand {
            linear: self.linear,
            angular: self.angular,
        }
    }
}

impl Default for VelocityState {
    fn default() -> Self {
        Self::new(0.5, 1.0)
    }
}
