//! Engine settings shared by the interpreter and the terminal player.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tempo in force until a script plays music, beats per minute.
    #[serde(default = "default_tempo")]
    pub default_tempo: f32,
    #[serde(default = "default_world_width")]
    pub world_width: f32,
    #[serde(default = "default_world_height")]
    pub world_height: f32,
    /// Target frame duration of the terminal player.
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
    /// Fixed RNG seed; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Seconds an enemy may spend off-screen before the player drops it.
    #[serde(default = "default_offscreen_grace")]
    pub offscreen_grace: f32,
}

fn default_tempo() -> f32 { 120.0 }
fn default_world_width() -> f32 { 320.0 }
fn default_world_height() -> f32 { 180.0 }
fn default_frame_ms() -> u64 { 33 }
fn default_offscreen_grace() -> f32 { 0.5 }

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_tempo: default_tempo(),
            world_width: default_world_width(),
            world_height: default_world_height(),
            frame_ms: default_frame_ms(),
            seed: None,
            offscreen_grace: default_offscreen_grace(),
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config, falling back to defaults when the file is
    /// missing or invalid.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "invalid engine config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
