//! Bria structured-prompt image generation provider
//!
//! Renders via the Bria v2 `image/generate` endpoint in synchronous mode:
//! the call blocks until the image exists and the response carries its URL
//! under `result.image_url`.

use crate::config::TurntableConfig;
use crate::image::{GenerationOptions, ImageGenerator};
use crate::prompt::ScenePrompt;
use crate::transport::{HttpResponse, HttpTransport};
use std::sync::Arc;
use tracing::{debug, info};
use turntable_core::{GenerationFailure, Result, TurntableError};

const DEFAULT_BRIA_URL: &str = "https://engine.prod.bria-api.com/v2/image/generate";

/// Bria provider for studio reference renders
pub struct BriaImageClient {
    api_key: String,
    api_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl BriaImageClient {
    pub fn new(
        api_key: impl Into<String>,
        api_url: Option<&str>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: api_url.unwrap_or(DEFAULT_BRIA_URL).to_string(),
            transport,
        }
    }

    /// Create a new BriaImageClient from config
    pub fn from_config(config: &TurntableConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let api_key = config.api_key("bria").ok_or_else(|| {
            TurntableError::ConfigError(
                "Bria API key not configured. Set TURNTABLE_BRIA_API_KEY or add to .turntable/config.toml"
                    .to_string(),
            )
        })?;
        Ok(Self::new(api_key, config.api_url("bria"), transport))
    }
}

/// Build the request body for one render
pub fn build_payload(prompt: &ScenePrompt, options: &GenerationOptions) -> Result<serde_json::Value> {
    let mut payload = serde_json::json!({
        "structured_prompt": prompt.to_structured_json()?,
        "aspect_ratio": options.aspect_ratio.as_str(),
        "sync": true,
        "variation_strength": options.variation_strength,
    });

    if let Some(seed) = options.seed {
        payload["seed"] = serde_json::json!(seed);
    }

    if let Some(anchor) = &options.anchor {
        payload["image_url"] = serde_json::json!(anchor.image_url);
        payload["image_strength"] = serde_json::json!(anchor.strength);
    }

    Ok(payload)
}

/// Extract the image URL from a generation response
pub fn parse_generation_response(response: &HttpResponse) -> Result<String> {
    if !response.is_success() {
        return Err(TurntableError::GenerationFailed(GenerationFailure::Status {
            status: response.status,
            body: response.text(),
        }));
    }

    let body: serde_json::Value = response.json().map_err(|e| {
        TurntableError::GenerationFailed(GenerationFailure::Parse(format!(
            "Invalid JSON in Bria response: {}",
            e
        )))
    })?;

    body.get("result")
        .and_then(|r| r.get("image_url"))
        .and_then(|u| u.as_str())
        .filter(|u| !u.is_empty())
        .map(|u| u.to_string())
        .ok_or_else(|| {
            TurntableError::GenerationFailed(GenerationFailure::Parse(format!(
                "No result.image_url in Bria response: {}",
                body
            )))
        })
}

impl ImageGenerator for BriaImageClient {
    fn name(&self) -> &str {
        "bria"
    }

    fn generate(&self, prompt: &ScenePrompt, options: &GenerationOptions) -> Result<String> {
        let payload = build_payload(prompt, options)?;
        debug!(
            camera = prompt.camera_directive(),
            anchored = options.anchor.is_some(),
            "requesting Bria render"
        );

        let headers = [("api_token", self.api_key.as_str())];
        let response = self
            .transport
            .post_json(&self.api_url, &headers, &payload)
            .map_err(|e| match e {
                TurntableError::TransportError(msg) => {
                    TurntableError::GenerationFailed(GenerationFailure::Transport(msg))
                }
                other => other,
            })?;

        let image_url = parse_generation_response(&response)?;
        info!(%image_url, "Bria image created");
        Ok(image_url)
    }

    fn fetch(&self, image_url: &str) -> Result<Vec<u8>> {
        let response = self.transport.get(image_url, &[])?;
        if !response.is_success() {
            return Err(TurntableError::TransportError(format!(
                "Image download returned status {}",
                response.status
            )));
        }
        Ok(response.body)
    }
}
