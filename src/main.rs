#![forbid(unsafe_code)]

//! `sim-teleop`: keyboard teleoperation client.
//!
//! Bootstraps configuration, builds the session, and runs the keyboard loop,
//! the channel event pump and the IPC server for `sim-teleop-ctl` until the
//! operator quits or a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use sim_teleop::config::GlobalConfig;
use sim_teleop::ipc::server::{spawn_ipc_server, IpcState};
use sim_teleop::session::{build_session, pump, wait_for_channels};
use sim_teleop::{keyboard, AppError, Result};

/// Time allowed for channel sessions to send their final frames.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "sim-teleop", about = "Keyboard teleoperation for remote simulations", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Built-in defaults are used when
    /// omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the scene service URL.
    #[arg(long)]
    scene_url: Option<String>,

    /// Override the rosbridge URL.
    #[arg(long)]
    messaging_url: Option<String>,

    /// Connect both channels at startup.
    #[arg(long)]
    auto_connect: bool,

    /// Do not read the terminal; drive the session through IPC only.
    #[arg(long)]
    no_keyboard: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("sim-teleop bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(url) = args.scene_url {
        config.scene.url = url;
    }
    if let Some(url) = args.messaging_url {
        config.messaging.url = url;
    }
    config.validate()?;
    config.load_credentials().await?;

    let config = Arc::new(config);
    info!(
        scene_url = %config.scene.url,
        messaging_url = %config.messaging.url,
        topic = %config.messaging.topic,
        "configuration loaded"
    );

    // ── Build session ───────────────────────────────────
    let channel_tasks = TaskTracker::new();
    let (session, events) = build_session(&config, &channel_tasks)?;
    let ct = CancellationToken::new();
    let pump_handle = pump::spawn_event_pump(Arc::clone(&session), events, ct.clone());

    let ipc_handle = spawn_ipc_server(
        IpcState {
            session: Arc::clone(&session),
            config: Arc::clone(&config),
        },
        ct.clone(),
    )?;

    if args.auto_connect {
        let mut guard = session.lock().await;
        guard.connect(&config.scene.url, &config.scene.auth_key);
        guard.connect_messaging(&config.messaging.url);
    }

    // ── Run until quit or signal ────────────────────────
    let keyboard_handle = if args.no_keyboard {
        None
    } else {
        let kb_session = Arc::clone(&session);
        let kb_ct = ct.clone();
        Some(tokio::spawn(async move {
            if let Err(err) = keyboard::run_keyboard(kb_session, kb_ct.clone()).await {
                error!(%err, "keyboard loop failed");
                kb_ct.cancel();
            }
        }))
    };

    tokio::select! {
        () = shutdown_signal() => info!("shutdown signal received"),
        () = ct.cancelled() => info!("shutdown requested"),
    }
    ct.cancel();

    // ── Release both channels ───────────────────────────
    session.lock().await.teardown();
    wait_for_channels(&channel_tasks, SHUTDOWN_GRACE).await;

    if let Some(handle) = keyboard_handle {
        if let Err(err) = handle.await {
            warn!(%err, "keyboard task ended abnormally");
        }
    }
    let _ = tokio::join!(pump_handle, ipc_handle);
    info!("sim-teleop shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout belongs to the raw-mode terminal.
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
