//! Connection status and the read-only session projection.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::scene::SceneModel;
use crate::models::velocity::VelocityCommand;

/// Externally visible state of one channel.
///
/// There is no in-between value. The scene channel reports `Connected` as
/// soon as its session starts, before the socket is up. The messaging channel
/// reports `Disconnected` until its handshake is acknowledged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// A live handle exists and its connection is usable.
    Connected,
    /// No usable connection.
    #[default]
    Disconnected,
}

impl ConnectionStatus {
    /// Status string shown to the operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl Display for ConnectionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-facing notification raised by a channel failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// When the notice was raised.
    pub at: DateTime<Utc>,
    /// Human-readable message.
    pub message: String,
}

impl Notice {
    /// Create a notice stamped with the current time.
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            message: message.into(),
        }
    }
}

/// Read-only projection of a session for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Scene channel status.
    pub scene_status: ConnectionStatus,
    /// Messaging channel status.
    pub messaging_status: ConnectionStatus,
    /// Whether the camera is following a model.
    pub following: bool,
    /// Model currently followed, if any.
    pub follow_target: Option<String>,
    /// Most recently selected model, if any.
    pub selected: Option<String>,
    /// Models last reported by the scene channel.
    pub models: Vec<SceneModel>,
    /// Currently held velocity command.
    pub velocity: VelocityCommand,
    /// Linear gain.
    pub speed: f64,
    /// Angular gain.
    pub turn: f64,
    /// Velocity commands discarded because messaging was down.
    pub dropped_commands: u64,
    /// Recent channel notifications, oldest first.
    pub notices: Vec<Notice>,
}
