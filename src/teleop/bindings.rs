//! Immutable key binding tables.
//!
//! Both tables are built once and injected into the
//! [`InputMapper`](crate::teleop::mapper::InputMapper); nothing mutates them
//! afterwards. Lookups are case-sensitive, so `i` and `I` are distinct keys.

use std::collections::HashMap;

use crate::{AppError, Result};

/// Unit direction-of-travel multipliers: `[x, y, z, yaw]`.
pub type MoveVector = [f64; 4];

/// Gain multipliers: `[linear, angular]`.
pub type SpeedFactors = [f64; 2];

const DEFAULT_MOVES: [(&str, MoveVector); 18] = [
    ("i", [1.0, 0.0, 0.0, 0.0]),
    ("o", [1.0, 0.0, 0.0, -1.0]),
    ("j", [0.0, 0.0, 0.0, 1.0]),
    ("l", [0.0, 0.0, 0.0, -1.0]),
    ("u", [1.0, 0.0, 0.0, 1.0]),
    (",", [-1.0, 0.0, 0.0, 0.0]),
    (".", [-1.0, 0.0, 0.0, 1.0]),
    ("m", [-1.0, 0.0, 0.0, -1.0]),
    ("O", [1.0, -1.0, 0.0, 0.0]),
    ("I", [1.0, 0.0, 0.0, 0.0]),
    ("J", [0.0, 1.0, 0.0, 0.0]),
    ("L", [0.0, -1.0, 0.0, 0.0]),
    ("U", [1.0, 1.0, 0.0, 0.0]),
    ("<", [-1.0, 0.0, 0.0, 0.0]),
    (">", [-1.0, -1.0, 0.0, 0.0]),
    ("M", [-1.0, 1.0, 0.0, 0.0]),
    ("t", [0.0, 0.0, 1.0, 0.0]),
    ("b", [0.0, 0.0, -1.0, 0.0]),
];

const DEFAULT_SPEEDS: [(&str, SpeedFactors); 6] = [
    ("q", [1.1, 1.1]),
    ("z", [0.9, 0.9]),
    ("w", [1.1, 1.0]),
    ("x", [0.9, 1.0]),
    ("e", [1.0, 1.1]),
    ("c", [1.0, 0.9]),
];

/// Key → movement direction table.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveBindings(HashMap<String, MoveVector>);

impl MoveBindings {
    /// Build a table from explicit entries.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if any multiplier is not finite.
    pub fn new(entries: HashMap<String, MoveVector>) -> Result<Self> {
        if let Some((key, _)) = entries
            .iter()
            .find(|(_, vector)| vector.iter().any(|v| !v.is_finite()))
        {
            return Err(AppError::Config(format!(
                "move binding '{key}' has a non-finite multiplier"
            )));
        }
        Ok(Self(entries))
    }

    /// Look up the direction bound to `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<MoveVector> {
        self.0.get(key).copied()
    }

    /// Whether `key` is bound.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of bound keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for MoveBindings {
    fn default() -> Self {
        Self(
            DEFAULT_MOVES
                .iter()
                .map(|(key, vector)| ((*key).to_owned(), *vector))
                .collect(),
        )
    }
}

/// Key → gain multiplier table.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedBindings(HashMap<String, SpeedFactors>);

impl SpeedBindings {
    /// Build a table from explicit entries.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if any factor is zero or not finite; a zero
    /// factor would collapse a gain permanently.
    pub fn new(entries: HashMap<String, SpeedFactors>) -> Result<Self> {
        if let Some((key, _)) = entries
            .iter()
            .find(|(_, factors)| factors.iter().any(|f| !f.is_normal()))
        {
            return Err(AppError::Config(format!(
                "speed binding '{key}' must use finite, nonzero factors"
            )));
        }
        Ok(Self(entries))
    }

    /// Look up the factors bound to `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<SpeedFactors> {
        self.0.get(key).copied()
    }

    /// Whether `key` is bound.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of bound keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SpeedBindings {
    fn default() -> Self {
        Self(
            DEFAULT_SPEEDS
                .iter()
                .map(|(key, factors)| ((*key).to_owned(), *factors))
                .collect(),
        )
    }
}
