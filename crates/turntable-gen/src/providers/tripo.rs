//! Tripo image-to-3D conversion provider
//!
//! Submits `image_to_model` tasks to the Tripo v2 task API with texture and
//! PBR materials enabled, then reports task status for the poll loop in
//! `crate::conversion`.

use crate::config::TurntableConfig;
use crate::conversion::{ModelConverter, TaskOutput, TaskReport};
use crate::transport::{HttpResponse, HttpTransport};
use serde::Deserialize;
use std::sync::Arc;
use turntable_core::{ConversionFailure, Result, TurntableError};

const DEFAULT_TRIPO_URL: &str = "https://api.tripo3d.ai/v2/openapi/task";

/// Tripo provider for textured model conversion
pub struct TripoConverter {
    api_key: String,
    api_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl TripoConverter {
    pub fn new(
        api_key: impl Into<String>,
        api_url: Option<&str>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: api_url.unwrap_or(DEFAULT_TRIPO_URL).trim_end_matches('/').to_string(),
            transport,
        }
    }

    /// Create a new TripoConverter from config
    pub fn from_config(config: &TurntableConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let api_key = config.api_key("tripo").ok_or_else(|| {
            TurntableError::ConfigError(
                "Tripo API key not configured. Set TURNTABLE_TRIPO_API_KEY or add to .turntable/config.toml"
                    .to_string(),
            )
        })?;
        Ok(Self::new(api_key, config.api_url("tripo"), transport))
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_key)
    }
}

/// Request body for an image-to-model task
pub fn build_submit_payload(image_url: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "image_to_model",
        "file": {
            "type": "jpg",
            "url": image_url
        },
        "texture": true,
        "pbr": true
    })
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<TaskData>,
}

/// Loosely typed task payload; each field is read on its own so one
/// oddly-typed value never hides the status.
#[derive(Debug, Default, Deserialize)]
struct TaskData {
    #[serde(default)]
    task_id: Option<serde_json::Value>,
    #[serde(default)]
    status: Option<serde_json::Value>,
    #[serde(default)]
    progress: Option<serde_json::Value>,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    task_error: Option<serde_json::Value>,
}

impl TaskData {
    fn task_id(&self) -> Option<String> {
        match self.task_id.as_ref()? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn status(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.as_str())
    }

    /// Advisory only; anything non-numeric reads as 0
    fn progress(&self) -> u8 {
        self.progress
            .as_ref()
            .and_then(|p| p.as_f64())
            .unwrap_or(0.0)
            .clamp(0.0, 100.0) as u8
    }

    /// A non-object output carries no artifact keys
    fn output(&self) -> TaskOutput {
        match &self.output {
            Some(serde_json::Value::Object(map)) => TaskOutput::new(map.clone()),
            _ => TaskOutput::new(serde_json::Map::new()),
        }
    }
}

/// Extract the task id from a submit response
pub fn parse_submit_response(response: &HttpResponse) -> Result<String> {
    if !response.is_success() {
        return Err(TurntableError::ConversionFailed(ConversionFailure::Submit(
            format!("status {}: {}", response.status, response.text()),
        )));
    }

    let envelope: Envelope = response.json().map_err(|e| {
        TurntableError::ConversionFailed(ConversionFailure::Submit(format!(
            "Invalid JSON in submit response: {}",
            e
        )))
    })?;

    envelope
        .data
        .and_then(|d| d.task_id())
        .ok_or_else(|| {
            TurntableError::ConversionFailed(ConversionFailure::Submit(format!(
                "Unexpected submit response: {}",
                response.text()
            )))
        })
}

/// Classify a status response.
///
/// Every nested field is optional; a missing `data` object or status is
/// reported as `Unrecognized` rather than an error. Non-2xx and invalid JSON
/// are errors, which the poll loop treats as transient.
pub fn parse_status_response(response: &HttpResponse) -> Result<TaskReport> {
    if !response.is_success() {
        return Err(TurntableError::TransportError(format!(
            "status poll returned {}: {}",
            response.status,
            response.text()
        )));
    }

    let envelope: Envelope = response.json().map_err(|e| {
        TurntableError::TransportError(format!("Invalid JSON in status response: {}", e))
    })?;

    let Some(data) = envelope.data else {
        return Ok(TaskReport::Unrecognized { raw: response.text() });
    };

    let report = match data.status() {
        Some("success") => TaskReport::Success {
            output: data.output(),
        },
        Some("failed") => TaskReport::Failed {
            message: data.task_error.as_ref().and_then(error_message),
        },
        Some(_) => TaskReport::Pending {
            progress: data.progress(),
        },
        None => TaskReport::Unrecognized { raw: response.text() },
    };
    Ok(report)
}

fn error_message(task_error: &serde_json::Value) -> Option<String> {
    match task_error {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(o) => o
            .get("message")
            .and_then(|m| m.as_str())
            .map(|m| m.to_string())
            .or_else(|| Some(task_error.to_string())),
        other => Some(other.to_string()),
    }
}

impl ModelConverter for TripoConverter {
    fn name(&self) -> &str {
        "tripo"
    }

    fn submit(&self, image_url: &str) -> Result<String> {
        let auth = self.auth_header();
        let headers = [("Authorization", auth.as_str())];
        let response = self
            .transport
            .post_json(&self.api_url, &headers, &build_submit_payload(image_url))
            .map_err(|e| TurntableError::ConversionFailed(ConversionFailure::Submit(e.to_string())))?;
        parse_submit_response(&response)
    }

    fn poll(&self, task_id: &str) -> Result<TaskReport> {
        let auth = self.auth_header();
        let headers = [("Authorization", auth.as_str())];
        let url = format!("{}/{}", self.api_url, task_id);
        let response = self.transport.get(&url, &headers)?;
        parse_status_response(&response)
    }
}
