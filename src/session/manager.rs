//! Session lifecycle management for the scene and messaging channels.
//!
//! The manager owns at most one live handle per channel. Every connect and
//! disconnect advances that channel's [`Generation`]; lifecycle events from
//! any other generation are discarded, so a late acknowledgement or error
//! from a superseded handle can never flip the current status.
//!
//! None of the operations here return errors. Channel failures degrade to a
//! stopped, disconnected state and are recorded as operator notices.

use std::collections::VecDeque;

use tracing::{debug, info, info_span, warn};

use crate::channel::{
    ChannelEvent, ChannelEventKind, ChannelKind, Generation, MessagingConnector, MessagingHandle,
    SceneConnector, SceneHandle,
};
use crate::models::scene::{resolve_model_id, SceneModel};
use crate::models::status::{ConnectionStatus, Notice, SessionSnapshot};
use crate::models::velocity::{VelocityCommand, VelocityState};
use crate::teleop::mapper::InputMapper;

/// Maximum number of notices retained for display.
pub const MAX_NOTICES: usize = 16;

/// Key identifier that, besides stopping motion, cancels camera follow.
pub const ESCAPE_KEY: &str = "Escape";

/// One channel's handle, generation and reported status.
struct Slot<H: ?Sized> {
    handle: Option<Box<H>>,
    generation: Generation,
    status: ConnectionStatus,
}

impl<H: ?Sized> Slot<H> {
    fn new() -> Self {
        Self {
            handle: None,
            generation: Generation::default(),
            status: ConnectionStatus::Disconnected,
        }
    }

    /// Advance the generation and detach the current handle, if any.
    fn supersede(&mut self) -> Option<Box<H>> {
        self.generation = self.generation.next();
        self.status = ConnectionStatus::Disconnected;
        self.handle.take()
    }

    fn is_current(&self, generation: Generation) -> bool {
        self.handle.is_some() && self.generation == generation
    }
}

/// Owns both remote channels and the teleoperation state of one session.
pub struct SessionManager {
    scene_connector: Box<dyn SceneConnector>,
    messaging_connector: Box<dyn MessagingConnector>,
    scene: Slot<dyn SceneHandle>,
    messaging: Slot<dyn MessagingHandle>,
    mapper: InputMapper,
    topic: String,
    follow_target: Option<String>,
    selected: Option<String>,
    models: Vec<SceneModel>,
    dropped_commands: u64,
    notices: VecDeque<Notice>,
}

impl SessionManager {
    /// Create a session with both channels disconnected.
    pub fn new(
        mapper: InputMapper,
        topic: impl Into<String>,
        scene_connector: Box<dyn SceneConnector>,
        messaging_connector: Box<dyn MessagingConnector>,
    ) -> Self {
        Self {
            scene_connector,
            messaging_connector,
            scene: Slot::new(),
            messaging: Slot::new(),
            mapper,
            topic: topic.into(),
            follow_target: None,
            selected: None,
            models: Vec::new(),
            dropped_commands: 0,
            notices: VecDeque::new(),
        }
    }

    // ── Scene channel ───────────────────────────────────

    /// Open a fresh scene session, tearing down any existing one first.
    ///
    /// Status becomes `connected` as soon as the session is started; a later
    /// failure reported by the channel returns it to `disconnected`.
    pub fn connect(&mut self, url: &str, key: &str) {
        let span = info_span!("scene_connect", url);
        let _guard = span.enter();

        if let Some(previous) = self.scene.supersede() {
            info!("replacing existing scene session");
            previous.disconnect();
        }
        self.models.clear();

        let generation = self.scene.generation;
        match self.scene_connector.open_session(url, key, generation) {
            Ok(handle) => {
                self.scene.handle = Some(handle);
                self.scene.status = ConnectionStatus::Connected;
                info!(generation = generation.get(), "scene session started");
            }
            Err(err) => {
                warn!(%err, "scene session could not be started");
                self.notify(format!("scene connection failed: {err}"));
            }
        }
    }

    /// Tear down the scene session. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        let had_handle = self.scene.handle.is_some();
        if let Some(handle) = self.scene.supersede() {
            handle.disconnect();
        }
        self.models.clear();
        if had_handle {
            info!("scene session disconnected");
        } else {
            debug!("scene disconnect requested with no live session");
        }
    }

    /// Select a model in the scene. Returns whether the command was sent.
    pub fn select(&mut self, model: &str) -> bool {
        let id = resolve_model_id(&self.models, model).to_owned();
        let sent = self.forward_scene("select", |handle| handle.select(&id));
        if sent {
            self.selected = Some(id);
        }
        sent
    }

    /// Move the camera to a model. Returns whether the command was sent.
    pub fn move_to(&mut self, model: &str) -> bool {
        let id = resolve_model_id(&self.models, model).to_owned();
        self.forward_scene("move_to", |handle| handle.move_to(&id))
    }

    /// Follow a model, or stop following when `model` is `None` or empty.
    ///
    /// Follow state changes even without a scene session; the command is
    /// forwarded when one exists. Returns whether it was forwarded.
    pub fn follow(&mut self, model: Option<&str>) -> bool {
        let target = model
            .filter(|reference| !reference.is_empty())
            .map(|reference| resolve_model_id(&self.models, reference).to_owned());

        match &target {
            Some(id) => info!(model = %id, "following model"),
            None if self.follow_target.is_some() => info!("stopped following"),
            None => debug!("follow cleared while not following"),
        }
        self.follow_target.clone_from(&target);
        self.forward_scene("follow", |handle| handle.follow(target.as_deref()))
    }

    /// Stop following; the escape action.
    pub fn unfollow(&mut self) -> bool {
        self.follow(None)
    }

    /// Recompute the viewport size.
    pub fn resize(&mut self) -> bool {
        self.forward_scene("resize", |handle| handle.resize())
    }

    /// Reset the camera view.
    pub fn reset_view(&mut self) -> bool {
        self.forward_scene("reset_view", |handle| handle.reset_view())
    }

    /// Capture a snapshot of the scene.
    pub fn snapshot(&mut self) -> bool {
        self.forward_scene("snapshot", |handle| handle.snapshot())
    }

    fn forward_scene<F>(&mut self, op: &str, send: F) -> bool
    where
        F: FnOnce(&dyn SceneHandle) -> crate::Result<()>,
    {
        let Some(handle) = self.scene.handle.as_deref() else {
            debug!(op, "no scene session; command ignored");
            return false;
        };
        match send(handle) {
            Ok(()) => true,
            Err(err) => {
                warn!(op, %err, "scene command not sent");
                false
            }
        }
    }

    // ── Messaging channel ───────────────────────────────

    /// Open a fresh messaging session, tearing down any existing one first.
    ///
    /// Status stays `disconnected` until the channel reports its handshake.
    pub fn connect_messaging(&mut self, url: &str) {
        let span = info_span!("messaging_connect", url);
        let _guard = span.enter();

        self.release_messaging();

        let generation = self.messaging.generation;
        match self.messaging_connector.open_channel(url, generation) {
            Ok(handle) => {
                self.messaging.handle = Some(handle);
                info!(generation = generation.get(), "messaging session starting");
            }
            Err(err) => {
                warn!(%err, "messaging session could not be started");
                self.notify(format!("messaging connection failed: {err}"));
            }
        }
    }

    /// Stop the robot and tear down the messaging session. Safe to call
    /// when already disconnected.
    pub fn disconnect_messaging(&mut self) {
        if self.release_messaging() {
            info!("messaging session disconnected");
        } else {
            debug!("messaging disconnect requested with no live session");
        }
    }

    /// Supersede the messaging slot. A live session is stopped first and
    /// sent a final stop command if connected; with no session the held
    /// command is left alone.
    fn release_messaging(&mut self) -> bool {
        if self.messaging.handle.is_some() {
            self.mapper.stop();
            if self.messaging.status == ConnectionStatus::Connected {
                let stop = self.mapper.state().command();
                self.publish_velocity(&stop);
            }
        }
        match self.messaging.supersede() {
            Some(handle) => {
                handle.disconnect();
                true
            }
            None => false,
        }
    }

    /// Publish a velocity command if messaging is connected.
    ///
    /// Commands are best-effort: when the channel is down the command is
    /// discarded and counted, never queued or retried. Returns whether the
    /// command was handed to the channel.
    pub fn publish_velocity(&mut self, command: &VelocityCommand) -> bool {
        let handle = match (&self.messaging.handle, self.messaging.status) {
            (Some(handle), ConnectionStatus::Connected) => handle,
            _ => {
                self.dropped_commands += 1;
                debug!(dropped = self.dropped_commands, "messaging down; command dropped");
                return false;
            }
        };

        let payload = match serde_json::to_value(command) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "velocity command not serialisable");
                self.dropped_commands += 1;
                return false;
            }
        };

        match handle.publish(&self.topic, &payload) {
            Ok(()) => true,
            Err(err) => {
                self.dropped_commands += 1;
                debug!(%err, dropped = self.dropped_commands, "velocity command dropped");
                false
            }
        }
    }

    // ── Keyboard ────────────────────────────────────────

    /// Map one key and publish the resulting command.
    ///
    /// The escape key additionally cancels camera follow.
    pub fn handle_key(&mut self, key: &str) -> VelocityCommand {
        if key == ESCAPE_KEY {
            self.unfollow();
        }
        let command = self.mapper.map_key(key).command();
        self.publish_velocity(&command);
        command
    }

    // ── Channel events ──────────────────────────────────

    /// Apply a lifecycle event. Returns `false` if it was stale and ignored.
    pub fn handle_event(&mut self, event: ChannelEvent) -> bool {
        let current = match event.channel {
            ChannelKind::Scene => self.scene.is_current(event.generation),
            ChannelKind::Messaging => self.messaging.is_current(event.generation),
        };
        if !current {
            debug!(
                channel = %event.channel,
                generation = event.generation.get(),
                kind = ?event.kind,
                "discarding event from superseded session"
            );
            return false;
        }

        match (event.channel, event.kind) {
            (ChannelKind::Scene, ChannelEventKind::Open) => {
                info!("scene handshake acknowledged");
                self.scene.status = ConnectionStatus::Connected;
            }
            (ChannelKind::Scene, ChannelEventKind::Models(models)) => {
                debug!(count = models.len(), "scene model list updated");
                self.models = models;
            }
            (ChannelKind::Scene, ChannelEventKind::Error(reason)) => {
                self.fail_scene(&format!("scene connection error: {reason}"));
            }
            (ChannelKind::Scene, ChannelEventKind::Close) => {
                self.fail_scene("scene connection closed");
            }
            (ChannelKind::Messaging, ChannelEventKind::Open) => {
                info!("messaging handshake acknowledged");
                self.messaging.status = ConnectionStatus::Connected;
            }
            (ChannelKind::Messaging, ChannelEventKind::Error(reason)) => {
                self.fail_messaging(&format!("messaging connection error: {reason}"));
            }
            (ChannelKind::Messaging, ChannelEventKind::Close) => {
                self.fail_messaging("messaging connection closed");
            }
            (ChannelKind::Messaging, ChannelEventKind::Models(_)) => {
                debug!("ignoring model list on messaging channel");
            }
        }
        true
    }

    fn fail_scene(&mut self, message: &str) {
        warn!(reason = message, "scene session lost");
        if let Some(handle) = self.scene.supersede() {
            handle.disconnect();
        }
        self.models.clear();
        self.notify(message);
    }

    fn fail_messaging(&mut self, message: &str) {
        warn!(reason = message, "messaging session lost");
        self.mapper.stop();
        if let Some(handle) = self.messaging.supersede() {
            handle.disconnect();
        }
        self.notify(message);
    }

    fn notify(&mut self, message: impl Into<String>) {
        if self.notices.len() == MAX_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice::now(message));
    }

    // ── Teardown ────────────────────────────────────────

    /// Release both channels. Idempotent; also runs on drop.
    pub fn teardown(&mut self) {
        let live = self.scene.handle.is_some() || self.messaging.handle.is_some();
        self.disconnect_messaging();
        self.disconnect();
        if live {
            info!("session torn down");
        }
    }

    // ── Projections ─────────────────────────────────────

    /// Scene channel status.
    #[must_use]
    pub fn scene_status(&self) -> ConnectionStatus {
        self.scene.status
    }

    /// Messaging channel status.
    #[must_use]
    pub fn messaging_status(&self) -> ConnectionStatus {
        self.messaging.status
    }

    /// Whether the camera is following a model.
    #[must_use]
    pub fn following(&self) -> bool {
        self.follow_target.is_some()
    }

    /// Model currently followed.
    #[must_use]
    pub fn follow_target(&self) -> Option<&str> {
        self.follow_target.as_deref()
    }

    /// Most recently selected model.
    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Models last reported by the scene channel.
    #[must_use]
    pub fn models(&self) -> &[SceneModel] {
        &self.models
    }

    /// Current teleoperation state.
    #[must_use]
    pub fn velocity(&self) -> &VelocityState {
        self.mapper.state()
    }

    /// Number of velocity commands discarded so far.
    #[must_use]
    pub fn dropped_commands(&self) -> u64 {
        self.dropped_commands
    }

    /// Whether a scene handle is currently held.
    #[must_use]
    pub fn has_scene_handle(&self) -> bool {
        self.scene.handle.is_some()
    }

    /// Whether a messaging handle is currently held.
    #[must_use]
    pub fn has_messaging_handle(&self) -> bool {
        self.messaging.handle.is_some()
    }

    /// Read-only projection for display.
    #[must_use]
    pub fn status_snapshot(&self) -> SessionSnapshot {
        let state = self.mapper.state();
        SessionSnapshot {
            scene_status: self.scene.status,
            messaging_status: self.messaging.status,
            following: self.following(),
            follow_target: self.follow_target.clone(),
            selected: self.selected.clone(),
            models: self.models.clone(),
            velocity: state.command(),
            speed: state.speed,
            turn: state.turn,
            dropped_commands: self.dropped_commands,
            notices: self.notices.iter().cloned().collect(),
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}
