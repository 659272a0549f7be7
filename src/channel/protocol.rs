//! JSON frame formats for both websocket channels.
//!
//! # Robot messaging (rosbridge v2)
//!
//! | Direction | Frame                                                     |
//! |-----------|-----------------------------------------------------------|
//! | out       | `{"op":"advertise","topic":"/cmd_vel","type":"geometry_msgs/msg/Twist"}` |
//! | out       | `{"op":"publish","topic":"/cmd_vel","msg":{...}}`         |
//! | out       | `{"op":"unadvertise","topic":"/cmd_vel"}`                 |
//!
//! # Scene streaming
//!
//! Outbound commands are `{"op": <command>, ...}` objects; the only inbound
//! frame interpreted is `{"op":"models","models":[...]}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::models::scene::SceneModel;
use crate::Result;

/// Outbound rosbridge operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RosbridgeOp {
    /// Declare a topic before publishing on it.
    Advertise {
        /// Topic name.
        topic: String,
        /// Message type name.
        #[serde(rename = "type")]
        message_type: String,
    },
    /// Publish one message.
    Publish {
        /// Topic name.
        topic: String,
        /// Message body.
        msg: Value,
    },
    /// Withdraw a previously advertised topic.
    Unadvertise {
        /// Topic name.
        topic: String,
    },
}

impl RosbridgeOp {
    /// Serialise to a single-line JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if serialisation fails.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Outbound scene command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SceneCommand {
    /// Authenticate the session; sent first when a key is configured.
    Auth {
        /// Authorization key.
        key: String,
    },
    /// Select a model.
    Select {
        /// Scene-graph identifier.
        id: String,
    },
    /// Move the camera to a model.
    MoveTo {
        /// Scene-graph identifier.
        id: String,
    },
    /// Follow a model; `null` stops following.
    Follow {
        /// Scene-graph identifier, or `None` to stop.
        id: Option<String>,
    },
    /// Recompute the viewport size.
    Resize,
    /// Reset the camera.
    ResetView,
    /// Capture the current view.
    Snapshot,
}

impl SceneCommand {
    /// Serialise to a single-line JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if serialisation fails.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum SceneFrame {
    Models { models: Vec<SceneModel> },
    #[serde(other)]
    Unknown,
}

/// Parse an inbound scene text frame.
///
/// Returns `Ok(Some(models))` for a model-list frame and `Ok(None)` for
/// empty, unrecognised, or non-JSON-object frames, which carry render data
/// the core does not interpret.
///
/// # Errors
///
/// Returns `AppError::Scene` if a `models` frame is malformed.
pub fn parse_scene_frame(text: &str) -> Result<Option<Vec<SceneModel>>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(err) => {
            debug!(%err, "scene frame is not json, skipping");
            return Ok(None);
        }
    };
    if value.get("op").is_none() {
        return Ok(None);
    }

    match serde_json::from_value::<SceneFrame>(value) {
        Ok(SceneFrame::Models { models }) => Ok(Some(models)),
        Ok(SceneFrame::Unknown) => Ok(None),
        Err(err) => Err(crate::AppError::Scene(format!(
            "malformed models frame: {err}"
        ))),
    }
}
