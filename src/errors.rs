//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all failure modes outside the core.
///
/// The input mapper and session manager never return these to their callers;
/// channel failures there degrade to a stopped, disconnected state instead.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Scene-streaming channel failure.
    Scene(String),
    /// Robot-messaging channel failure.
    Messaging(String),
    /// IPC communication failure.
    Ipc(String),
    /// Operation invoked against a channel with no live handle.
    NotConnected(String),
    /// File-system, terminal, or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Scene(msg) => write!(f, "scene: {msg}"),
            Self::Messaging(msg) => write!(f, "messaging: {msg}"),
            Self::Ipc(msg) => write!(f, "ipc: {msg}"),
            Self::NotConnected(msg) => write!(f, "not connected: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(format!("json: {err}"))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Io(format!("websocket: {err}"))
    }
}
