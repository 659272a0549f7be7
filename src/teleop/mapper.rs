//! Keyboard → velocity state machine.
//!
//! The most recent key wins: a movement key overwrites the held command, a
//! speed key rescales only future commands, and any other key stops motion.

use tracing::trace;

use crate::models::velocity::{Vector3, VelocityState};
use crate::teleop::bindings::{MoveBindings, SpeedBindings};

/// What a key did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEffect {
    /// The held command was replaced by a movement binding.
    Move,
    /// Gains were rescaled; the held command is unchanged.
    Gain,
    /// The key is unbound and motion was stopped.
    Stop,
}

/// Translates key identifiers into an updated [`VelocityState`].
///
/// Performs no I/O; the owner publishes [`VelocityState::command`] after
/// each call.
#[derive(Debug, Clone)]
pub struct InputMapper {
    moves: MoveBindings,
    speeds: SpeedBindings,
    state: VelocityState,
}

impl InputMapper {
    /// Create a mapper over the given tables with initial gains.
    #[must_use]
    pub fn new(moves: MoveBindings, speeds: SpeedBindings, speed: f64, turn: f64) -> Self {
        Self {
            moves,
            speeds,
            state: VelocityState::new(speed, turn),
        }
    }

    /// Apply one key and return the resulting state.
    pub fn map_key(&mut self, key: &str) -> &VelocityState {
        let effect = self.apply(key);
        trace!(key, ?effect, state = ?self.state, "key mapped");
        &self.state
    }

    /// Apply one key and report which branch it took.
    pub fn apply(&mut self, key: &str) -> KeyEffect {
        if let Some([x, y, z, th]) = self.moves.get(key) {
            let speed = self.state.speed;
            self.state.linear = Vector3::new(x * speed, y * speed, z * speed);
            self.state.angular = Vector3::new(0.0, 0.0, th * self.state.turn);
            KeyEffect::Move
        } else if let Some([speed_mul, turn_mul]) = self.speeds.get(key) {
            self.state.speed *= speed_mul;
            self.state.turn *= turn_mul;
            KeyEffect::Gain
        } else {
            self.state.stop();
            KeyEffect::Stop
        }
    }

    /// Current state without applying a key.
    #[must_use]
    pub fn state(&self) -> &VelocityState {
        &self.state
    }

    /// Zero the held command, keeping the gains.
    pub fn stop(&mut self) {
        self.state.stop();
    }
}

impl Default for InputMapper {
    fn default() -> Self {
        let initial = VelocityState::default();
        Self::new(
            MoveBindings::default(),
            SpeedBindings::default(),
            initial.speed,
            initial.turn,
        )
    }
}
