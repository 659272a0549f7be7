//! Websocket client for the scene-streaming service.
//!
//! Each [`WsSceneConnector::open_session`] call spawns one session task that
//! owns the socket. The returned [`WsSceneHandle`] only holds the command
//! queue and a cancellation token, so dropping or disconnecting it always
//! stops the task.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::channel::protocol::{parse_scene_frame, SceneCommand};
use crate::channel::{
    emit, validate_ws_url, ChannelEventKind, ChannelKind, EventSender, Generation, SceneConnector,
    SceneHandle,
};
use crate::{AppError, Result};

/// Opens scene sessions over `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsSceneConnector {
    events: EventSender,
    capacity: usize,
    tracker: TaskTracker,
}

impl WsSceneConnector {
    /// Create a connector reporting lifecycle events on `events`.
    ///
    /// `capacity` bounds the per-session command queue. Session tasks are
    /// spawned on `tracker` so shutdown can wait for their close frames.
    #[must_use]
    pub fn new(events: EventSender, capacity: usize, tracker: TaskTracker) -> Self {
        Self {
            events,
            capacity: capacity.max(1),
            tracker,
        }
    }
}

impl SceneConnector for WsSceneConnector {
    fn open_session(
        &mut self,
        url: &str,
        key: &str,
        generation: Generation,
    ) -> Result<Box<dyn SceneHandle>> {
        validate_ws_url(url).map_err(|err| AppError::Scene(err.to_string()))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| AppError::Scene(format!("no tokio runtime: {err}")))?;

        let (commands, command_rx) = mpsc::channel(self.capacity);
        let cancel = CancellationToken::new();
        let span = info_span!("scene_session", url, generation = generation.get());

        self.tracker.spawn_on(
            run_session(
                url.to_owned(),
                key.to_owned(),
                generation,
                command_rx,
                self.events.clone(),
                cancel.clone(),
            )
            .instrument(span),
            &runtime,
        );

        Ok(Box::new(WsSceneHandle { commands, cancel }))
    }
}

/// Handle to a running scene session task.
#[derive(Debug)]
pub struct WsSceneHandle {
    commands: mpsc::Sender<SceneCommand>,
    cancel: CancellationToken,
}

impl WsSceneHandle {
    fn enqueue(&self, command: SceneCommand) -> Result<()> {
        self.commands.try_send(command).map_err(|err| match err {
            TrySendError::Full(_) => AppError::Scene("command queue full".into()),
            TrySendError::Closed(_) => AppError::NotConnected("scene session ended".into()),
        })
    }
}

impl SceneHandle for WsSceneHandle {
    fn select(&self, id: &str) -> Result<()> {
        self.enqueue(SceneCommand::Select { id: id.to_owned() })
    }

    fn move_to(&self, id: &str) -> Result<()> {
        self.enqueue(SceneCommand::MoveTo { id: id.to_owned() })
    }

    fn follow(&self, id: Option<&str>) -> Result<()> {
        self.enqueue(SceneCommand::Follow {
            id: id.map(str::to_owned),
        })
    }

    fn resize(&self) -> Result<()> {
        self.enqueue(SceneCommand::Resize)
    }

    fn reset_view(&self) -> Result<()> {
        self.enqueue(SceneCommand::ResetView)
    }

    fn snapshot(&self) -> Result<()> {
        self.enqueue(SceneCommand::Snapshot)
    }

    fn disconnect(self: Box<Self>) {
        self.cancel.cancel();
    }
}

impl Drop for WsSceneHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_session(
    url: String,
    key: String,
    generation: Generation,
    mut command_rx: mpsc::Receiver<SceneCommand>,
    events: EventSender,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!("scene session cancelled before connecting");
            return;
        }
        result = connect_async(url.as_str()) => result,
    };

    let socket = match connected {
        Ok((socket, _response)) => socket,
        Err(err) => {
            warn!(%err, "scene connect failed");
            emit(
                &events,
                ChannelKind::Scene,
                generation,
                ChannelEventKind::Error(format!("connect failed: {err}")),
            )
            .await;
            return;
        }
    };
    let (mut sink, mut stream) = socket.split();

    if !key.is_empty() {
        let auth = SceneCommand::Auth { key }.to_frame();
        let sent = match auth {
            Ok(frame) => sink.send(Message::Text(frame)).await.map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        if let Err(err) = sent {
            emit(
                &events,
                ChannelKind::Scene,
                generation,
                ChannelEventKind::Error(format!("authentication failed: {err}")),
            )
            .await;
            return;
        }
    }

    info!("scene session open");
    emit(&events, ChannelKind::Scene, generation, ChannelEventKind::Open).await;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                if let Err(err) = sink.send(Message::Close(None)).await {
                    debug!(%err, "scene close frame not sent");
                }
                info!("scene session closed locally");
                return;
            }

            command = command_rx.recv() => {
                let Some(command) = command else {
                    debug!("scene command queue closed");
                    return;
                };
                let frame = match command.to_frame() {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(%err, "dropping unserialisable scene command");
                        continue;
                    }
                };
                if let Err(err) = sink.send(Message::Text(frame)).await {
                    warn!(%err, "scene write failed");
                    emit(
                        &events,
                        ChannelKind::Scene,
                        generation,
                        ChannelEventKind::Error(format!("write failed: {err}")),
                    )
                    .await;
                    return;
                }
            }

            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => match parse_scene_frame(&text) {
                        Ok(Some(models)) => {
                            debug!(count = models.len(), "scene models updated");
                            emit(
                                &events,
                                ChannelKind::Scene,
                                generation,
                                ChannelEventKind::Models(models),
                            )
                            .await;
                        }
                        Ok(None) => {}
                        Err(err) => warn!(%err, "ignoring scene frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("scene session closed by remote");
                        emit(&events, ChannelKind::Scene, generation, ChannelEventKind::Close).await;
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%err, "scene read failed");
                        emit(
                            &events,
                            ChannelKind::Scene,
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
