//! Channel event pump.
//!
//! Drains [`ChannelEvent`]s reported by the connector tasks and applies them
//! to the shared session one at a time, under the session lock.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

use crate::channel::EventReceiver;
use crate::session::SharedSession;

/// Spawn the task that feeds channel events into `session`.
///
/// The task exits when `ct` is cancelled or every event sender is dropped.
pub fn spawn_event_pump(
    session: SharedSession,
    mut events: EventReceiver,
    ct: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            loop {
                tokio::select! {
                    biased;

                    () = ct.cancelled() => {
                        debug!("event pump shutting down");
                        break;
                    }

                    event = events.recv() => {
                        let Some(event) = event else {
                            debug!("all event senders dropped");
                            break;
                        };
                        session.lock().await.handle_event(event);
                    }
                }
            }
        }
        .instrument(info_span!("event_pump")),
    )
}
