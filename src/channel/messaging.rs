//! Rosbridge v2 websocket client for the robot-messaging channel.
//!
//! Topics are advertised lazily on first publish and withdrawn when the
//! session closes locally. The outbound queue is bounded and never waits:
//! a velocity command that does not fit is stale by the time it would be
//! sent, so it is dropped.

use std::collections::HashSet;

use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::channel::protocol::RosbridgeOp;
use crate::channel::{
    emit, validate_ws_url, ChannelEventKind, ChannelKind, EventSender, Generation,
    MessagingConnector, MessagingHandle,
};
use crate::{AppError, Result};

/// Opens rosbridge sessions over `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct RosbridgeConnector {
    events: EventSender,
    message_type: String,
    capacity: usize,
    tracker: TaskTracker,
}

impl RosbridgeConnector {
    /// Create a connector advertising topics with `message_type`.
    ///
    /// Session tasks are spawned on `tracker`; waiting on it after teardown
    /// lets the final stop, unadvertise and close frames reach the server.
    #[must_use]
    pub fn new(
        events: EventSender,
        message_type: impl Into<String>,
        capacity: usize,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            events,
            message_type: message_type.into(),
            capacity: capacity.max(1),
            tracker,
        }
    }
}

impl MessagingConnector for RosbridgeConnector {
    fn open_channel(
        &mut self,
        url: &str,
        generation: Generation,
    ) -> Result<Box<dyn MessagingHandle>> {
        validate_ws_url(url).map_err(|err| AppError::Messaging(err.to_string()))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| AppError::Messaging(format!("no tokio runtime: {err}")))?;

        let (outbound, outbound_rx) = mpsc::channel(self.capacity);
        let cancel = CancellationToken::new();
        let span = info_span!("messaging_session", url, generation = generation.get());

        self.tracker.spawn_on(
            run_session(
                url.to_owned(),
                self.message_type.clone(),
                generation,
                outbound_rx,
                self.events.clone(),
                cancel.clone(),
            )
            .instrument(span),
            &runtime,
        );

        Ok(Box::new(RosbridgeHandle { outbound, cancel }))
    }
}

/// Handle to a running rosbridge session task.
#[derive(Debug)]
pub struct RosbridgeHandle {
    outbound: mpsc::Sender<(String, Value)>,
    cancel: CancellationToken,
}

impl MessagingHandle for RosbridgeHandle {
    fn publish(&self, topic: &str, payload: &Value) -> Result<()> {
        self.outbound
            .try_send((topic.to_owned(), payload.clone()))
            .map_err(|err| match err {
                TrySendError::Full(_) => AppError::Messaging("outbound queue full".into()),
                TrySendError::Closed(_) => {
                    AppError::NotConnected("messaging session ended".into())
                }
            })
    }

    fn disconnect(self: Box<Self>) {
        self.cancel.cancel();
    }
}

impl Drop for RosbridgeHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_session(
    url: String,
    message_type: String,
    generation: Generation,
    mut outbound_rx: mpsc::Receiver<(String, Value)>,
    events: EventSender,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!("messaging session cancelled before connecting");
            return;
        }
        result = connect_async(url.as_str()) => result,
    };

    let socket = match connected {
        Ok((socket, _response)) => socket,
        Err(err) => {
            warn!(%err, "messaging connect failed");
            emit(
                &events,
                ChannelKind::Messaging,
                generation,
                ChannelEventKind::Error(format!("connect failed: {err}")),
            )
            .await;
            return;
        }
    };
    let (mut sink, mut stream) = socket.split();
    let mut advertised: HashSet<String> = HashSet::new();

    info!("messaging session open");
    emit(&events, ChannelKind::Messaging, generation, ChannelEventKind::Open).await;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                // Flush what was queued before the cancel, typically the
                // final stop command.
                while let Ok((topic, msg)) = outbound_rx.try_recv() {
                    let sent =
                        send_publish(&mut sink, &mut advertised, &message_type, topic, msg).await;
                    if let Err(err) = sent {
                        debug!(%err, "queued command not flushed");
                        break;
                    }
                }
                for topic in advertised.drain() {
                    if let Ok(frame) = (RosbridgeOp::Unadvertise { topic }).to_frame() {
                        if let Err(err) = sink.send(Message::Text(frame)).await {
                            debug!(%err, "unadvertise not sent");
                            break;
                        }
                    }
                }
                if let Err(err) = sink.send(Message::Close(None)).await {
                    debug!(%err, "messaging close frame not sent");
                }
                info!("messaging session closed locally");
                return;
            }

            next = outbound_rx.recv() => {
                let Some((topic, msg)) = next else {
                    debug!("messaging outbound queue closed");
                    return;
                };

                let sent =
                    send_publish(&mut sink, &mut advertised, &message_type, topic, msg).await;
                if let Err(err) = sent {
                    warn!(%err, "messaging write failed");
                    emit(
                        &events,
                        ChannelKind::Messaging,
                        generation,
                        ChannelEventKind::Error(format!("write failed: {err}")),
                    )
                    .await;
                    return;
                }
            }

            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("messaging session closed by remote");
                        emit(&events, ChannelKind::Messaging, generation, ChannelEventKind::Close)
                            .await;
                        return;
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!(len = text.len(), "ignoring inbound rosbridge frame");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%err, "messaging read failed");
                        emit(
                            &events,
                            ChannelKind::Messaging,
                            generation,
                            ChannelEventKind::Error(format!("read failed: {err}")),
                        )
                        .await;
                        return;
                    }
                }
            }
        }
    }
}

/// Publish `msg` on `topic`, advertising the topic first if this session has
/// not yet done so. Unserialisable ops are logged and skipped.
async fn send_publish<S>(
    sink: &mut S,
    advertised: &mut HashSet<String>,
    message_type: &str,
    topic: String,
    msg: Value,
) -> std::result::Result<(), tungstenite::Error>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let mut ops = Vec::with_capacity(2);
    let fresh = !advertised.contains(&topic);
    if fresh {
        ops.push(RosbridgeOp::Advertise {
            topic: topic.clone(),
            message_type: message_type.to_owned(),
        });
    }
    ops.push(RosbridgeOp::Publish {
        topic: topic.clone(),
        msg,
    });

    for op in ops {
        match op.to_frame() {
            Ok(frame) => sink.send(Message::Text(frame)).await?,
            Err(err) => warn!(%err, "dropping unserialisable rosbridge op"),
        }
    }
    if fresh {
        debug!(topic, message_type, "topic advertised");
        advertised.insert(topic);
    }
    Ok(())
}
