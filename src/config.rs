//! Runtime configuration.
//!
//! Loaded from an optional JSON file; every field has a default, so an empty
//! object (or no file at all) is a valid configuration.
//!
//! ```json
//! {
//!   "batch": { "throttle_ms": 250, "caption_failure": "omit_caption" },
//!   "fonts": { "sans": "/usr/share/fonts/TTF/DejaVuSans.ttf" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::document::SurfaceBudget;
use crate::error::{Result, StencilError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Largest on-screen edit surface.
    pub edit_surface: SurfaceBudget,
    pub preview_budget: PreviewBudget,
    pub batch: BatchConfig,
    pub generation: GenerationConfig,
    /// Font family name → TTF/OTF file.
    pub fonts: BTreeMap<String, PathBuf>,
    /// JSON key-value store backing brand context and the content collection.
    pub store_path: Option<PathBuf>,
}

/// Display box the preview is fitted into before the half-size reduction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewBudget {
    pub width: u32,
    pub height: u32,
}

impl Default for PreviewBudget {
    fn default() -> Self {
        Self {
            width: 400,
            height: 400,
        }
    }
}

/// What to do when a requested caption cannot be generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionFailurePolicy {
    /// Treat the whole row as failed.
    #[default]
    SkipRow,
    /// Keep the image, leave the caption empty.
    OmitCaption,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Pause between items, in milliseconds. 0 disables throttling.
    pub throttle_ms: u64,
    /// Upper bound on in-flight calls to the text generator.
    pub max_concurrent_generations: usize,
    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,
    pub caption_failure: CaptionFailurePolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 100,
            max_concurrent_generations: 1,
            jpeg_quality: 92,
            caption_failure: CaptionFailurePolicy::default(),
        }
    }
}

impl BatchConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "STENCIL_API_KEY".into(),
            timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load from `path`, or defaults when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    StencilError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_json(&text)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| StencilError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.edit_surface.max_width == 0 || self.edit_surface.max_height == 0 {
            return Err(StencilError::Config("edit_surface must be non-zero".into()));
        }
        if self.preview_budget.width == 0 || self.preview_budget.height == 0 {
            return Err(StencilError::Config("preview_budget must be non-zero".into()));
        }
        if self.batch.max_concurrent_generations == 0 {
            return Err(StencilError::Config(
                "batch.max_concurrent_generations must be at least 1".into(),
            ));
        }
        if !(1..=100).contains(&self.batch.jpeg_quality) {
            return Err(StencilError::Config(format!(
                "batch.jpeg_quality must be 1..=100, got {}",
                self.batch.jpeg_quality
            )));
        }
        if self.generation.timeout_secs == 0 {
            return Err(StencilError::Config("generation.timeout_secs must be non-zero".into()));
        }
        Ok(())
    }
}
