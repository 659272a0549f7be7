//! Teleoperation input mapping.
//!
//! Covers the immutable binding tables and the stateful mapper that turns
//! key identifiers into velocity commands.

pub mod bindings;
pub mod mapper;
