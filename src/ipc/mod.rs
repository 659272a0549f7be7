//! Local IPC control surface for `sim-teleop-ctl`.

pub mod server;
