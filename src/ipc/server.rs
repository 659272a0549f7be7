//! Local IPC server for `sim-teleop-ctl` commands.
//!
//! Listens on a named pipe (Windows) or Unix domain socket (Linux/macOS)
//! using the `interprocess` crate. Accepts line-delimited JSON commands and
//! routes them to the shared session.
//!
//! ## Protocol
//!
//! Request (one JSON object per line):
//! ```json
//! {"command": "status"}
//! {"command": "connect", "url": "ws://localhost:9002", "key": "secret"}
//! {"command": "follow", "model": "turtlebot"}
//! {"command": "key", "key": "i"}
//! ```
//!
//! Response (one JSON object per line):
//! ```json
//! {"ok": true, "data": { ... } }
//! {"ok": false, "error": "unknown command: warp"}
//! ```

use std::sync::Arc;

use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced, ListenerOptions};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::config::GlobalConfig;
use crate::session::SharedSession;
use crate::{AppError, Result};

/// Shared state handed to every IPC connection.
#[derive(Clone)]
pub struct IpcState {
    /// Session the commands act on.
    pub session: SharedSession,
    /// Configuration supplying default URLs and the scene key.
    pub config: Arc<GlobalConfig>,
}

/// Inbound IPC request from `sim-teleop-ctl`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpcRequest {
    /// Command verb.
    pub command: String,
    /// Model reference (for `select`, `move_to`, `follow`).
    #[serde(default)]
    pub model: Option<String>,
    /// Channel URL override (for `connect`, `connect_messaging`).
    #[serde(default)]
    pub url: Option<String>,
    /// Scene authorization key override, or the key identifier for `key`.
    #[serde(default)]
    pub key: Option<String>,
}

/// Outbound IPC response to `sim-teleop-ctl`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IpcResponse {
    /// Whether the command succeeded.
    pub ok: bool,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IpcResponse {
    fn success(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    fn forwarded(sent: bool) -> Self {
        Self::success(json!({ "forwarded": sent }))
    }
}

/// Spawn the IPC server task.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the listener cannot be created.
pub fn spawn_ipc_server(
    state: IpcState,
    ct: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    let name = state.config.ipc_name.clone();

    let listener_name = name
        .clone()
        .to_ns_name::<GenericNamespaced>()
        .map_err(|err| AppError::Ipc(format!("invalid ipc socket name '{name}': {err}")))?;

    let listener = ListenerOptions::new()
        .name(listener_name)
        .create_tokio()
        .map_err(|err| AppError::Ipc(format!("failed to create ipc listener: {err}")))?;

    info!(ipc_name = %name, "IPC server listening");

    let handle = tokio::spawn(async move {
        let span = info_span!("ipc_server", name = %name);
        async move {
            loop {
                tokio::select! {
                    () = ct.cancelled() => {
                        info!("IPC server shutting down");
                        break;
                    }
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok(stream) => {
                                tokio::spawn(handle_connection(stream, state.clone()));
                            }
                            Err(err) => {
                                warn!(%err, "IPC accept failed");
                            }
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await;
    });

    Ok(handle)
}

/// Handle a single IPC client connection.
async fn handle_connection(stream: interprocess::local_socket::tokio::Stream, state: IpcState) {
    let span = info_span!("ipc_conn");
    async move {
        let (reader, mut writer) = stream.split();
        let mut buf_reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            match buf_reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    let response = match serde_json::from_str::<IpcRequest>(trimmed) {
                        Ok(request) => dispatch_command(&request, &state).await,
                        Err(err) => IpcResponse::error(format!("invalid json: {err}")),
                    };

                    let mut response_line = serde_json::to_string(&response).unwrap_or_else(|_| {
                        r#"{"ok":false,"error":"serialization failed"}"#.to_owned()
                    });
                    response_line.push('\n');

                    if let Err(err) = writer.write_all(response_line.as_bytes()).await {
                        warn!(%err, "failed to write ipc response");
                        break;
                    }
                }
                Err(err) => {
                    warn!(%err, "ipc read error");
                    break;
                }
            }
        }

        info!("IPC connection closed");
    }
    .instrument(span)
    .await;
}

/// Route an IPC command to the session.
pub async fn dispatch_command(request: &IpcRequest, state: &IpcState) -> IpcResponse {
    let span = info_span!("ipc_command", command = %request.command);
    async move {
        let mut session = state.session.lock().await;

        match request.command.as_str() {
            "status" => match serde_json::to_value(session.status_snapshot()) {
                Ok(snapshot) => IpcResponse::success(snapshot),
                Err(err) => IpcResponse::error(format!("failed to encode status: {err}")),
            },
            "models" => match serde_json::to_value(session.models()) {
                Ok(models) => IpcResponse::success(json!({ "models": models })),
                Err(err) => IpcResponse::error(format!("failed to encode models: {err}")),
            },
            "connect" => {
                let url = request.url.as_deref().unwrap_or(&state.config.scene.url);
                let key = request
                    .key
                    .as_deref()
                    .unwrap_or(&state.config.scene.auth_key);
                session.connect(url, key);
                IpcResponse::success(json!({ "status": session.scene_status() }))
            }
            "disconnect" => {
                session.disconnect();
                IpcResponse::success(json!({ "status": session.scene_status() }))
            }
            "connect_messaging" => {
                let url = request.url.as_deref().unwrap_or(&state.config.messaging.url);
                session.connect_messaging(url);
                IpcResponse::success(json!({
                    "status": session.messaging_status(),
                    "pending": session.has_messaging_handle(),
                }))
            }
            "disconnect_messaging" => {
                session.disconnect_messaging();
                IpcResponse::success(json!({ "status": session.messaging_status() }))
            }
            "select" => match request.model.as_deref() {
                Some(model) => IpcResponse::forwarded(session.select(model)),
                None => IpcResponse::error("missing required 'model' field"),
            },
            "move_to" => match request.model.as_deref() {
                Some(model) => IpcResponse::forwarded(session.move_to(model)),
                None => IpcResponse::error("missing required 'model' field"),
            },
            "follow" => {
                let sent = session.follow(request.model.as_deref());
                IpcResponse::success(json!({
                    "forwarded": sent,
                    "following": session.following(),
                }))
            }
            "unfollow" | "escape" => {
                let sent = session.unfollow();
                IpcResponse::success(json!({ "forwarded": sent, "following": false }))
            }
            "resize" => IpcResponse::forwarded(session.resize()),
            "reset_view" => IpcResponse::forwarded(session.reset_view()),
            "snapshot" => IpcResponse::forwarded(session.snapshot()),
            "key" => match request.key.as_deref() {
                Some(key) => match serde_json::to_value(session.handle_key(key)) {
                    Ok(command) => IpcResponse::success(command),
                    Err(err) => IpcResponse::error(format!("failed to encode command: {err}")),
                },
                None => IpcResponse::error("missing required 'key' field"),
            },
            "toggle_fullscreen" => {
                IpcResponse::error("toggle_fullscreen is handled by the display platform")
            }
            other => IpcResponse::error(format!("unknown command: {other}")),
        }
    }
    .instrument(span)
    .await
}
