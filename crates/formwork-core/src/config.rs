//! Engine configuration.

use serde::{Deserialize, Serialize};

/// How widget bounds are matched against a selection rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitMode {
    /// Any overlap with positive area.
    #[default]
    Intersects,
    /// Bounds lie entirely inside the rectangle.
    Contains,
}

/// Drag-to-select tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Pointer travel below which a gesture is a plain click.
    pub drag_threshold: f64,
    pub hit_mode: HitMode,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 0.0,
            hit_mode: HitMode::Intersects,
        }
    }
}

/// Canvas runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Register the built-in widget kinds when a canvas is created.
    pub register_builtin_kinds: bool,
    pub selection: SelectionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            register_builtin_kinds: true,
            selection: SelectionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.register_builtin_kinds);
        assert_eq!(config.selection.hit_mode, HitMode::Intersects);
        assert_eq!(config.selection.drag_threshold, 0.0);
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(r#"{ "selection": { "hit_mode": "contains" } }"#).unwrap();
        assert!(config.register_builtin_kinds);
        assert_eq!(config.selection.hit_mode, HitMode::Contains);
        assert!(EngineConfig::from_json("{").is_err());
    }
}
