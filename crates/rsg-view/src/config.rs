//! View configuration, loadable from JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing view config: {0}")]
    Parse(#[from] serde_json::Error),
}

// ─── Config ───────────────────────────────────────────────────────────────

/// Settings for a [`crate::View`].
///
/// Missing fields take their default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Run a second Draw pass for translucent geometry. Default: **true**.
    pub draw_transparency: bool,

    /// Size of the off-screen pick target, in pixels. Pointer positions are
    /// scaled from the viewport onto it.
    pub pick_width: usize,
    pub pick_height: usize,

    /// Half extent of the patch read back around the pointer; the nearest
    /// fragment in the `(2n + 1)²` square wins. Default: **2**.
    pub pick_patch: usize,

    /// Resolve picks and update the current pick after each pick pass.
    /// With this off, `pick` only reports the raw hit. Default: **true**.
    pub process_pick_hits: bool,

    /// A button release counts as a click if it comes within this many
    /// milliseconds of the press...
    pub click_max_ms: u64,

    /// ...and the pointer moved less than this (squared pixels).
    pub click_max_step_sq: f32,

    pub viewport_width: usize,
    pub viewport_height: usize,

    /// Pick with one pass per eye and keep the nearer hit. Default: **false**.
    pub stereo: bool,

    /// Horizontal shift of each eye's pick sample from the pointer, in pick
    /// pixels. The left eye samples to the left. Default: **2**.
    pub eye_offset: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            draw_transparency: true,
            pick_width: 640,
            pick_height: 480,
            pick_patch: 2,
            process_pick_hits: true,
            click_max_ms: 300,
            click_max_step_sq: 4.0,
            viewport_width: 640,
            viewport_height: 480,
            stereo: false,
            eye_offset: 2,
        }
    }
}

impl ViewConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        log::debug!("loaded view config from {}", path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> String {
        // Plain struct of scalars; serialization cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_is_the_default() {
        assert_eq!(ViewConfig::from_json("{}").unwrap(), ViewConfig::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let c = ViewConfig::from_json(r#"{ "draw_transparency": false, "click_max_ms": 150 }"#).unwrap();
        assert!(!c.draw_transparency);
        assert_eq!(c.click_max_ms, 150);
        assert_eq!(c.click_max_step_sq, 4.0);
        assert_eq!(c.pick_width, 640);
        assert!(!c.stereo);
        assert_eq!(c.eye_offset, 2);
    }

    #[test]
    fn json_survives_a_round_trip() {
        let c = ViewConfig {
            pick_width: 32,
            pick_height: 16,
            ..Default::default()
        };
        assert_eq!(ViewConfig::from_json(&c.to_json()).unwrap(), c);
    }

    #[test]
    fn bad_json_and_missing_files_are_errors() {
        assert!(matches!(ViewConfig::from_json("{ nope"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            ViewConfig::load("/nonexistent/rsg-view.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
