//! Global configuration parsing, validation, and credential loading.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::channel::validate_ws_url;
use crate::teleop::bindings::{MoveBindings, MoveVector, SpeedBindings, SpeedFactors};
use crate::teleop::mapper::InputMapper;
use crate::{AppError, Result};

/// Keyring service name holding stored credentials.
pub const KEYRING_SERVICE: &str = "sim-teleop";

/// Environment variable consulted when the keychain has no scene key.
pub const SCENE_KEY_ENV: &str = "SIM_TELEOP_SCENE_KEY";

/// Scene-streaming channel settings.
///
/// The authorization key is loaded at runtime via OS keychain or environment
/// variable, never from the TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SceneConfig {
    /// Websocket URL of the scene service.
    #[serde(default = "default_scene_url")]
    pub url: String,
    /// Authorization key (populated at runtime).
    #[serde(skip)]
    pub auth_key: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            url: default_scene_url(),
            auth_key: String::new(),
        }
    }
}

/// Robot-messaging channel settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct MessagingConfig {
    /// Websocket URL of the rosbridge server.
    #[serde(default = "default_messaging_url")]
    pub url: String,
    /// Topic velocity commands are published on.
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Message type advertised for the topic.
    #[serde(default = "default_message_type")]
    pub message_type: String,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            url: default_messaging_url(),
            topic: default_topic(),
            message_type: default_message_type(),
        }
    }
}

/// Teleoperation gains and optional binding overrides.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct TeleopConfig {
    /// Initial linear gain.
    #[serde(default = "default_initial_speed")]
    pub initial_speed: f64,
    /// Initial angular gain.
    #[serde(default = "default_initial_turn")]
    pub initial_turn: f64,
    /// Replacement movement table; the built-in table is used when absent.
    #[serde(default)]
    pub move_bindings: Option<HashMap<String, MoveVector>>,
    /// Replacement speed table; the built-in table is used when absent.
    #[serde(default)]
    pub speed_bindings: Option<HashMap<String, SpeedFactors>>,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        Self {
            initial_speed: default_initial_speed(),
            initial_turn: default_initial_turn(),
            move_bindings: None,
            speed_bindings: None,
        }
    }
}

impl TeleopConfig {
    /// Build an input mapper from these settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a binding override is invalid.
    pub fn build_mapper(&self) -> Result<InputMapper> {
        let moves = match &self.move_bindings {
            Some(entries) => MoveBindings::new(entries.clone())?,
            None => MoveBindings::default(),
        };
        let speeds = match &self.speed_bindings {
            Some(entries) => SpeedBindings::new(entries.clone())?,
            None => SpeedBindings::default(),
        };
        Ok(InputMapper::new(
            moves,
            speeds,
            self.initial_speed,
            self.initial_turn,
        ))
    }
}

fn default_scene_url() -> String {
    "ws://localhost:9002".into()
}

fn default_messaging_url() -> String {
    "ws://localhost:9090".into()
}

fn default_topic() -> String {
    "/cmd_vel".into()
}

fn default_message_type() -> String {
    "geometry_msgs/msg/Twist".into()
}

fn default_initial_speed() -> f64 {
    0.5
}

fn default_initial_turn() -> f64 {
    1.0
}

fn default_ipc_name() -> String {
    "sim-teleop".into()
}

fn default_channel_capacity() -> usize {
    64
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Scene channel settings.
    #[serde(default)]
    pub scene: SceneConfig,
    /// Messaging channel settings.
    #[serde(default)]
    pub messaging: MessagingConfig,
    /// Teleoperation settings.
    #[serde(default)]
    pub teleop: TeleopConfig,
    /// Named pipe / Unix socket identifier for `sim-teleop-ctl`.
    #[serde(default = "default_ipc_name")]
    pub ipc_name: String,
    /// Bound of each per-channel outbound queue and of the event queue.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            scene: SceneConfig::default(),
            messaging: MessagingConfig::default(),
            teleop: TeleopConfig::default(),
            ipc_name: default_ipc_name(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the scene authorization key from OS keychain with env-var
    /// fallback.
    ///
    /// A missing key is not an error: the scene service may run without
    /// authentication, in which case the key stays empty.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the keychain lookup task panics.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.scene.auth_key = load_credential("scene_auth_key", SCENE_KEY_ENV)
            .await?
            .unwrap_or_default();
        Ok(())
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        validate_ws_url(&self.scene.url)?;
        validate_ws_url(&self.messaging.url)?;

        if self.messaging.topic.trim().is_empty() {
            return Err(AppError::Config("messaging.topic must not be empty".into()));
        }

        for (name, gain) in [
            ("initial_speed", self.teleop.initial_speed),
            ("initial_turn", self.teleop.initial_turn),
        ] {
            if !gain.is_finite() || gain <= 0.0 {
                return Err(AppError::Config(format!(
                    "teleop.{name} must be a positive finite number"
                )));
            }
        }

        if self.channel_capacity == 0 {
            return Err(AppError::Config(
                "channel_capacity must be greater than zero".into(),
            ));
        }

        if self.ipc_name.trim().is_empty() {
            return Err(AppError::Config("ipc_name must not be empty".into()));
        }

        // Binding overrides are checked by building a throwaway mapper.
        self.teleop.build_mapper()?;

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<Option<String>> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(Some(value)),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            debug!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    Ok(env::var(env_key).ok().filter(|value| !value.is_empty()))
}
