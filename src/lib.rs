#![forbid(unsafe_code)]

//! Keyboard teleoperation and scene-session control for remote robot
//! simulations.
//!
//! The [`teleop`] module turns key identifiers into velocity commands; the
//! [`session`] module owns the scene and messaging channels those commands
//! and camera actions flow through.

pub mod channel;
pub mod config;
pub mod errors;
pub mod ipc;
pub mod keyboard;
pub mod models;
pub mod session;
pub mod teleop;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
