// This is free and unencumbered software released into the public domain.

use crate::shared::PipelineError;
use std::path::Path;

/// Reserved descriptor name meaning "no effect".
pub const NO_EFFECT_NAME: &str = "none";

/// Asset root the default resolution builds load paths under.
pub const DEFAULT_ASSET_ROOT: &str = "file:///android_asset";

/// File extension of loadable effect assets.
pub const EFFECT_ASSET_EXTENSION: &str = "deepar";

/// A selectable visual effect, identified by its asset name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectDescriptor {
    name: String,
}

impl EffectDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_no_effect(&self) -> bool {
        self.name == NO_EFFECT_NAME
    }

    /// Resolve the load path under `asset_root`, or `None` for the
    /// no-effect sentinel.
    pub fn resolve_path(&self, asset_root: &str) -> Option<String> {
        if self.is_no_effect() {
            None
        } else {
            Some(format!("{asset_root}/{}", self.name))
        }
    }
}

/// The ordered effect list with a single rotating selection index.
///
/// The no-effect sentinel is always the first entry; the initial selection
/// is index 0 (no effect).
#[derive(Clone, Debug)]
pub struct EffectRoster {
    effects: Vec<EffectDescriptor>,
    current: usize,
}

impl EffectRoster {
    /// Build a roster from effect names, prepending the no-effect sentinel
    /// unless it already leads the list.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut effects = vec![EffectDescriptor::new(NO_EFFECT_NAME)];
        effects.extend(
            names
                .into_iter()
                .map(|n| EffectDescriptor::new(n))
                .filter(|d| !d.is_no_effect()),
        );
        Self {
            effects,
            current: 0,
        }
    }

    /// Scan `dir` for effect asset files, sorted by name.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let dir = dir.as_ref();
        let entries =
            std::fs::read_dir(dir).map_err(|e| PipelineError::driver("reading asset directory", e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::driver("reading asset directory", e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EFFECT_ASSET_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_owned());
            }
        }
        names.sort();

        Ok(Self::new(names))
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn effects(&self) -> &[EffectDescriptor] {
        &self.effects
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &EffectDescriptor {
        &self.effects[self.current]
    }

    /// Move the selection to the next entry, wrapping at the end, and
    /// return the newly selected descriptor.
    pub fn advance(&mut self) -> &EffectDescriptor {
        self.current = (self.current + 1) % self.effects.len();
        &self.effects[self.current]
    }
}

impl Default for EffectRoster {
    fn default() -> Self {
        Self::new(DEFAULT_EFFECT_NAMES.iter().copied())
    }
}

/// The stock effect set shipped with the demo assets.
pub const DEFAULT_EFFECT_NAMES: &[&str] = &[
    "viking_helmet.deepar",
    "MakeupLook.deepar",
    "Split_View_Look.deepar",
    "Emotions_Exaggerator.deepar",
    "Emotion_Meter.deepar",
    "Stallone.deepar",
    "flower_face.deepar",
    "galaxy_background.deepar",
    "Humanoid.deepar",
    "Neon_Devil_Horns.deepar",
    "Ping_Pong.deepar",
    "Pixel_Hearts.deepar",
    "Snail.deepar",
    "Hope.deepar",
    "Vendetta_Mask.deepar",
    "Fire_Effect.deepar",
    "burning_effect.deepar",
    "Elephant_Trunk.deepar",
];
