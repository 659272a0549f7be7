#![forbid(unsafe_code)]

//! `sim-teleop-ctl`: local CLI companion for `sim-teleop`.
//!
//! Connects to the IPC socket and sends JSON commands to a running session,
//! for operator actions that have no key binding.

use std::io::{BufRead, BufReader, Write};

use clap::{Parser, Subcommand};
use interprocess::local_socket::{traits::Stream as _, GenericNamespaced, Stream, ToNsName};

#[derive(Debug, Parser)]
#[command(
    name = "sim-teleop-ctl",
    about = "Local CLI for a running sim-teleop session",
    version,
    long_about = None
)]
struct Cli {
    /// IPC socket name (must match the session's `ipc_name` config).
    #[arg(long, default_value = "sim-teleop")]
    ipc_name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show channel status, follow state and the held velocity.
    Status,

    /// List models reported by the scene service.
    Models,

    /// Connect (or reconnect) the scene channel.
    Connect {
        /// Scene service URL; the configured one when omitted.
        #[arg(long)]
        url: Option<String>,
        /// Authorization key; the configured one when omitted.
        #[arg(long)]
        key: Option<String>,
    },

    /// Disconnect the scene channel.
    Disconnect,

    /// Connect (or reconnect) the robot-messaging channel.
    ConnectMessaging {
        /// Rosbridge URL; the configured one when omitted.
        #[arg(long)]
        url: Option<String>,
    },

    /// Stop the robot and disconnect the robot-messaging channel.
    DisconnectMessaging,

    /// Select a model.
    Select {
        /// Model name or scene identifier.
        model: String,
    },

    /// Move the camera to a model.
    MoveTo {
        /// Model name or scene identifier.
        model: String,
    },

    /// Follow a model with the camera; stops following when omitted.
    Follow {
        /// Model name or scene identifier.
        model: Option<String>,
    },

    /// Stop following.
    Unfollow,

    /// Recompute the viewport size.
    Resize,

    /// Reset the camera view.
    ResetView,

    /// Capture a snapshot of the scene.
    Snapshot,

    /// Send one key identifier to the teleop mapper.
    Key {
        /// Key identifier, e.g. `i`, `q`, `Escape`.
        key: String,
    },
}

fn main() {
    let args = Cli::parse();

    let request_json = match &args.command {
        Command::Status => serde_json::json!({ "command": "status" }),
        Command::Models => serde_json::json!({ "command": "models" }),
        Command::Connect { url, key } => {
            let mut req = serde_json::json!({ "command": "connect" });
            if let Some(u) = url {
                req["url"] = serde_json::Value::String(u.clone());
            }
            if let Some(k) = key {
                req["key"] = serde_json::Value::String(k.clone());
            }
            req
        }
        Command::Disconnect => serde_json::json!({ "command": "disconnect" }),
        Command::ConnectMessaging { url } => {
            let mut req = serde_json::json!({ "command": "connect_messaging" });
            if let Some(u) = url {
                req["url"] = serde_json::Value::String(u.clone());
            }
            req
        }
        Command::DisconnectMessaging => serde_json::json!({ "command": "disconnect_messaging" }),
        Command::Select { model } => {
            serde_json::json!({ "command": "select", "model": model })
        }
        Command::MoveTo { model } => {
            serde_json::json!({ "command": "move_to", "model": model })
        }
        Command::Follow { model } => {
            serde_json::json!({ "command": "follow", "model": model })
        }
        Command::Unfollow => serde_json::json!({ "command": "unfollow" }),
        Command::Resize => serde_json::json!({ "command": "resize" }),
        Command::ResetView => serde_json::json!({ "command": "reset_view" }),
        Command::Snapshot => serde_json::json!({ "command": "snapshot" }),
        Command::Key { key } => serde_json::json!({ "command": "key", "key": key }),
    };

    match send_ipc_command(&args.ipc_name, &request_json) {
        Ok(response) => {
            if let Some(obj) = response.as_object() {
                let ok = obj
                    .get("ok")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                if ok {
                    if let Some(data) = obj.get("data") {
                        println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
                    } else {
                        println!("OK");
                    }
                } else {
                    let err_msg = obj
                        .get("error")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown error");
                    eprintln!("Error: {err_msg}");
                    std::process::exit(1);
                }
            } else {
                println!("{response}");
            }
        }
        Err(err) => {
            eprintln!("Failed to connect to session: {err}");
            eprintln!("Is sim-teleop running with ipc_name '{}'?", args.ipc_name);
            std::process::exit(1);
        }
    }
}

/// Connect to the IPC socket, send a JSON command, and read the response.
fn send_ipc_command(
    ipc_name: &str,
    request: &serde_json::Value,
) -> std::result::Result<serde_json::Value, Box<dyn std::error::Error>> {
    let name = ipc_name.to_ns_name::<GenericNamespaced>()?;
    let mut stream = Stream::connect(name)?;

    let mut request_line = serde_json::to_string(request)?;
    request_line.push('\n');
    stream.write_all(request_line.as_bytes())?;
    stream.flush()?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let response: serde_json::Value = serde_json::from_str(response_line.trim())?;
    Ok(response)
}
