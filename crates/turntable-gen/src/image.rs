//! Text-to-image generation: options, anchors and the generator trait

use crate::prompt::ScenePrompt;
use serde::{Deserialize, Serialize};
use turntable_core::Result;

/// Seed used when deterministic generation is requested
pub const FIXED_SEED: u64 = 42;

/// Influence of the anchor image on anchored requests.
///
/// Low enough to let the camera rotate, high enough to hold colour.
pub const ANCHOR_STRENGTH: f32 = 0.30;

/// Output aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "16:9")]
    Wide,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Wide => "16:9",
        }
    }
}

/// A previously generated image used as weak visual conditioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorReference {
    pub image_url: String,
    pub strength: f32,
}

impl AnchorReference {
    /// Anchor at the fixed weak strength used for multiview batches
    pub fn weak(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            strength: ANCHOR_STRENGTH,
        }
    }
}

/// Per-call generation options
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub aspect_ratio: AspectRatio,
    /// Fixed seed for comparable repeated calls; `None` lets the service pick
    pub seed: Option<u64>,
    /// Stylistic drift between calls; 0 disables it
    pub variation_strength: f32,
    pub anchor: Option<AnchorReference>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::Square,
            seed: Some(FIXED_SEED),
            variation_strength: 0.0,
            anchor: None,
        }
    }
}

impl GenerationOptions {
    pub fn with_anchor(mut self, anchor: AnchorReference) -> Self {
        self.anchor = Some(anchor);
        self
    }
}

/// A text-to-image service
pub trait ImageGenerator: Send + Sync {
    /// Provider name (e.g. "bria", "mock")
    fn name(&self) -> &str;

    /// Render one image and return its URL. Blocks until the service answers.
    fn generate(&self, prompt: &ScenePrompt, options: &GenerationOptions) -> Result<String>;

    /// Download the bytes of an image this generator produced
    fn fetch(&self, image_url: &str) -> Result<Vec<u8>>;
}
