// This is free and unencumbered software released into the public domain.

use crate::shared::{DEFAULT_ASSET_ROOT, Facing};

/// Engine slot name the session switches effects on.
pub const DEFAULT_EFFECT_SLOT: &str = "effect";

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub device: Option<String>,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub facing: Facing,
    pub buffer_frames: usize,
    pub effect_slot: String,
    pub asset_root: String,
    pub diagnostics: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            device: None,
            width: 1920,
            height: 1080,
            fps: 30.0,
            facing: Facing::Front,
            buffer_frames: 2,
            effect_slot: DEFAULT_EFFECT_SLOT.into(),
            asset_root: DEFAULT_ASSET_ROOT.into(),
            diagnostics: false,
        }
    }
}

impl PipelineConfig {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            ..Default::default()
        }
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_facing(mut self, facing: Facing) -> Self {
        self.facing = facing;
        self
    }

    pub fn with_buffer_frames(mut self, n: usize) -> Self {
        self.buffer_frames = n.max(1);
        self
    }

    pub fn with_effect_slot(mut self, slot: impl Into<String>) -> Self {
        self.effect_slot = slot.into();
        self
    }

    pub fn with_asset_root(mut self, root: impl Into<String>) -> Self {
        self.asset_root = root.into();
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_capture_preset() {
        let config = PipelineConfig::default();
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
        assert_eq!(config.facing, Facing::Front);
        assert_eq!(config.buffer_frames, 2);
        assert_eq!(config.effect_slot, "effect");
        assert_eq!(config.asset_root, "file:///android_asset");
    }

    #[test]
    fn buffer_frames_clamps_to_one() {
        let config = PipelineConfig::default().with_buffer_frames(0);
        assert_eq!(config.buffer_frames, 1);
    }
}
