//! Remote channel abstraction.
//!
//! The [`SceneConnector`] / [`MessagingConnector`] traits decouple the
//! session manager from the concrete websocket clients. Opening a channel
//! returns a handle immediately; whether the connection actually came up is
//! reported later as a [`ChannelEvent`] tagged with the [`Generation`] of the
//! connect call that produced it, so the manager can discard results from
//! superseded handles.

pub mod messaging;
pub mod protocol;
pub mod scene;

use std::fmt::{Display, Formatter};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::scene::SceneModel;
use crate::Result;

/// Which of the two remote channels an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Scene-streaming session.
    Scene,
    /// Robot-messaging session.
    Messaging,
}

impl Display for ChannelKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scene => f.write_str("scene"),
            Self::Messaging => f.write_str("messaging"),
        }
    }
}

/// Monotonic tag identifying one connect call on one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(u64);

impl Generation {
    /// The generation after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Generation {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Lifecycle notification emitted by a channel's background task.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEventKind {
    /// Handshake acknowledged; the connection is usable.
    Open,
    /// Connect rejected or the connection failed after opening.
    Error(String),
    /// The connection closed.
    Close,
    /// The scene service reported its current model list.
    Models(Vec<SceneModel>),
}

/// A lifecycle notification tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    /// Originating channel.
    pub channel: ChannelKind,
    /// Connect call the originating handle belongs to.
    pub generation: Generation,
    /// What happened.
    pub kind: ChannelEventKind,
}

impl ChannelEvent {
    /// Convenience constructor.
    #[must_use]
    pub fn new(channel: ChannelKind, generation: Generation, kind: ChannelEventKind) -> Self {
        Self {
            channel,
            generation,
            kind,
        }
    }
}

/// Sender half used by connectors to report [`ChannelEvent`]s.
pub type EventSender = mpsc::Sender<ChannelEvent>;

/// Receiver half drained by the session event pump.
pub type EventReceiver = mpsc::Receiver<ChannelEvent>;

/// Live scene-streaming session.
///
/// Methods enqueue a command and return without waiting for the remote side.
pub trait SceneHandle: Send {
    /// Highlight the model with the given scene-graph identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` if the session task has ended, or
    /// `AppError::Scene` if the command queue is full.
    fn select(&self, id: &str) -> Result<()>;

    /// Move the camera to the given model.
    ///
    /// # Errors
    ///
    /// Same as [`SceneHandle::select`].
    fn move_to(&self, id: &str) -> Result<()>;

    /// Follow the given model with the camera, or stop following on `None`.
    ///
    /// # Errors
    ///
    /// Same as [`SceneHandle::select`].
    fn follow(&self, id: Option<&str>) -> Result<()>;

    /// Recompute the viewport size.
    ///
    /// # Errors
    ///
    /// Same as [`SceneHandle::select`].
    fn resize(&self) -> Result<()>;

    /// Reset the camera to its initial view.
    ///
    /// # Errors
    ///
    /// Same as [`SceneHandle::select`].
    fn reset_view(&self) -> Result<()>;

    /// Capture a snapshot of the current view.
    ///
    /// # Errors
    ///
    /// Same as [`SceneHandle::select`].
    fn snapshot(&self) -> Result<()>;

    /// Close the session and release its network resources.
    fn disconnect(self: Box<Self>);
}

/// Factory for [`SceneHandle`]s.
pub trait SceneConnector: Send {
    /// Start opening a scene session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Scene` if the session cannot even be started (for
    /// example an invalid URL). Failures after start are reported as
    /// [`ChannelEventKind::Error`].
    fn open_session(
        &mut self,
        url: &str,
        key: &str,
        generation: Generation,
    ) -> Result<Box<dyn SceneHandle>>;
}

/// Live robot-messaging session.
pub trait MessagingHandle: Send {
    /// Publish a structured payload on `topic`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` if the session task has ended, or
    /// `AppError::Messaging` if the outbound queue is full.
    fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<()>;

    /// Close the session and release its network resources.
    fn disconnect(self: Box<Self>);
}

/// Factory for [`MessagingHandle`]s.
pub trait MessagingConnector: Send {
    /// Start opening a messaging session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Messaging` if the session cannot even be started.
    fn open_channel(&mut self, url: &str, generation: Generation)
        -> Result<Box<dyn MessagingHandle>>;
}

/// Require a `ws://` or `wss://` URL.
///
/// # Errors
///
/// Returns `AppError::Config` for any other scheme.
pub fn validate_ws_url(url: &str) -> Result<()> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(())
    } else {
        Err(crate::AppError::Config(format!(
            "websocket url must start with ws:// or wss://: {url}"
        )))
    }
}

/// Report an event from a channel task; a closed receiver means the session
/// is shutting down and the event is dropped.
pub(crate) async fn emit(
    events: &EventSender,
    channel: ChannelKind,
    generation: Generation,
    kind: ChannelEventKind,
) {
    if events
        .send(ChannelEvent::new(channel, generation, kind))
        .await
        .is_err()
    {
        tracing::debug!(%channel, generation = generation.get(), "event receiver closed");
    }
}
