//! Session orchestration.
//!
//! Covers the lifecycle manager that owns both remote channels and the event
//! pump that applies channel notifications to it.

pub mod manager;
pub mod pump;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::channel::messaging::RosbridgeConnector;
use crate::channel::scene::WsSceneConnector;
use crate::channel::EventReceiver;
use crate::config::GlobalConfig;
use crate::session::manager::SessionManager;
use crate::Result;

/// A session shared between the keyboard loop, the IPC server and the event
/// pump. Every public operation runs under this single lock.
pub type SharedSession = Arc<Mutex<SessionManager>>;

/// Build a session wired to the websocket connectors described by `config`.
///
/// Returns the session together with the receiver its channel events arrive
/// on; hand the receiver to [`pump::spawn_event_pump`]. Channel session
/// tasks are spawned on `tracker`; see [`wait_for_channels`].
///
/// # Errors
///
/// Returns `AppError::Config` if the teleop settings are invalid.
pub fn build_session(
    config: &GlobalConfig,
    tracker: &TaskTracker,
) -> Result<(SharedSession, EventReceiver)> {
    let (event_tx, event_rx) = tokio::sync::mpsc::channel(config.channel_capacity);
    let mapper = config.teleop.build_mapper()?;

    let scene = WsSceneConnector::new(event_tx.clone(), config.channel_capacity, tracker.clone());
    let messaging = RosbridgeConnector::new(
        event_tx,
        config.messaging.message_type.clone(),
        config.channel_capacity,
        tracker.clone(),
    );

    let manager = SessionManager::new(
        mapper,
        config.messaging.topic.clone(),
        Box::new(scene),
        Box::new(messaging),
    );
    Ok((Arc::new(Mutex::new(manager)), event_rx))
}

/// Wait for channel session tasks to finish after teardown.
///
/// Closes `tracker` and waits at most `grace` for its tasks to end. Returns
/// `false` if tasks were still running when the grace period ran out.
pub async fn wait_for_channels(tracker: &TaskTracker, grace: Duration) -> bool {
    tracker.close();
    if tokio::time::timeout(grace, tracker.wait()).await.is_ok() {
        info!("channel sessions closed");
        true
    } else {
        warn!(
            pending = tracker.len(),
            grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
            "channel sessions still closing at shutdown"
        );
        false
    }
}
