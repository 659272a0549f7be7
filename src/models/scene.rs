//! Scene models reported by the scene-streaming service.

use serde::{Deserialize, Serialize};

/// A 3D model present in the streamed scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneModel {
    /// Human-readable model name.
    pub name: String,
    /// Scene-graph identifier used by select / move-to / follow commands.
    pub gz3d_name: String,
}

impl SceneModel {
    /// Construct a model entry.
    pub fn new(name: impl Into<String>, gz3d_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gz3d_name: gz3d_name.into(),
        }
    }
}

/// Resolve an operator-supplied reference to a scene-graph identifier.
///
/// A reference matching a model's `name` resolves to its `gz3d_name`; any
/// other reference is passed through verbatim so identifiers for models not
/// yet announced still reach the scene service.
#[must_use]
pub fn resolve_model_id<'a>(models: &'a [SceneModel], reference: &'a str) -> &'a str {
    models
        .iter()
        .find(|model| model.name == reference)
        .map_or(reference, |model| model.gz3d_name.as_str())
}
