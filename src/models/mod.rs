//! Domain model module declarations.

pub mod scene;
pub mod status;
pub mod velocity;
