//! Mock providers for offline runs
//!
//! `MockImageGenerator` hands out deterministic `mock://` URLs and renders
//! solid-colour PNGs for them; `MockModelConverter` finishes every task on
//! its second poll with a fixed public GLB. No network calls are made.
//!
//! The converter keeps a poll counter per task id until that task succeeds.
//! Tasks that are abandoned earlier keep their entry for the life of the
//! converter.

use crate::conversion::{ModelConverter, TaskOutput, TaskReport};
use crate::image::{GenerationOptions, ImageGenerator};
use crate::prompt::ScenePrompt;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use turntable_core::{ContentHash, Result, TurntableError};

const MOCK_URL_PREFIX: &str = "mock://render/";
const MOCK_RENDER_SIZE: u32 = 64;

/// Public coloured GLB handed back by the mock converter
pub const MOCK_MODEL_URL: &str = "https://model-viewer.googleusercontent.com/models/astronaut.glb";

/// Image generator that renders placeholder PNGs locally
#[derive(Default)]
pub struct MockImageGenerator;

impl MockImageGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl ImageGenerator for MockImageGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    fn generate(&self, prompt: &ScenePrompt, options: &GenerationOptions) -> Result<String> {
        let mut key = prompt.to_structured_json()?;
        if let Some(anchor) = &options.anchor {
            key.push_str(&anchor.image_url);
        }
        let hash = ContentHash::from_bytes(key.as_bytes());
        Ok(format!("{}{}.png", MOCK_URL_PREFIX, &hash.to_hex()[..16]))
    }

    fn fetch(&self, image_url: &str) -> Result<Vec<u8>> {
        let name = image_url.strip_prefix(MOCK_URL_PREFIX).ok_or_else(|| {
            TurntableError::TransportError(format!("Mock generator cannot fetch {}", image_url))
        })?;
        render_solid_png(name, MOCK_RENDER_SIZE)
    }
}

/// Encode a solid-colour PNG whose colour is derived from `name`
fn render_solid_png(name: &str, size: u32) -> Result<Vec<u8>> {
    let hash_val = name
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let r = ((hash_val >> 16) & 0xFF) as u8;
    let g = ((hash_val >> 8) & 0xFF) as u8;
    let b = (hash_val & 0xFF) as u8;

    let img = image::RgbaImage::from_pixel(size, size, image::Rgba([r, g, b, 255]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| TurntableError::StorageError(format!("Failed to encode PNG: {}", e)))?;
    Ok(bytes)
}

/// Converter that completes every task on the second poll
#[derive(Default)]
pub struct MockModelConverter {
    polls: Mutex<HashMap<String, u32>>,
}

impl MockModelConverter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelConverter for MockModelConverter {
    fn name(&self) -> &str {
        "mock"
    }

    fn submit(&self, image_url: &str) -> Result<String> {
        let hash = ContentHash::from_bytes(image_url.as_bytes());
        Ok(format!("mock-{}-{}", &hash.to_hex()[..8], uuid::Uuid::new_v4()))
    }

    fn poll(&self, task_id: &str) -> Result<TaskReport> {
        let mut polls = self
            .polls
            .lock()
            .map_err(|_| TurntableError::TransportError("mock converter poisoned".to_string()))?;
        let count = polls.entry(task_id.to_string()).or_insert(0);
        *count += 1;

        if *count < 2 {
            return Ok(TaskReport::Pending { progress: 50 });
        }

        polls.remove(task_id);
        let mut output = serde_json::Map::new();
        output.insert("pbr_model".to_string(), serde_json::json!(MOCK_MODEL_URL));
        Ok(TaskReport::Success {
            output: TaskOutput::new(output),
        })
    }
}
