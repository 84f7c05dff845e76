//! Provider registry
//!
//! Maps provider names to concrete implementations.

pub mod bria;
pub mod mock;
pub mod tripo;

use crate::config::TurntableConfig;
use crate::conversion::ModelConverter;
use crate::image::ImageGenerator;
use crate::transport::HttpTransport;
use std::sync::Arc;
use turntable_core::{Result, TurntableError};

/// Create a text-to-image provider by name with configuration
pub fn create_image_generator(
    name: &str,
    config: &TurntableConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<Arc<dyn ImageGenerator>> {
    ensure_enabled(name, config)?;
    match name {
        "mock" => Ok(Arc::new(mock::MockImageGenerator::new())),
        "bria" => Ok(Arc::new(bria::BriaImageClient::from_config(config, transport)?)),
        _ => Err(TurntableError::ConfigError(format!(
            "Unknown image provider '{}'. Available: {}",
            name,
            available_image_providers().join(", ")
        ))),
    }
}

/// Create an image-to-3D provider by name with configuration
pub fn create_model_converter(
    name: &str,
    config: &TurntableConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<Arc<dyn ModelConverter>> {
    ensure_enabled(name, config)?;
    match name {
        "mock" => Ok(Arc::new(mock::MockModelConverter::new())),
        "tripo" => Ok(Arc::new(tripo::TripoConverter::from_config(config, transport)?)),
        _ => Err(TurntableError::ConfigError(format!(
            "Unknown model provider '{}'. Available: {}",
            name,
            available_model_providers().join(", ")
        ))),
    }
}

pub fn available_image_providers() -> Vec<&'static str> {
    vec!["mock", "bria"]
}

pub fn available_model_providers() -> Vec<&'static str> {
    vec!["mock", "tripo"]
}

fn ensure_enabled(name: &str, config: &TurntableConfig) -> Result<()> {
    if config.is_enabled(name) {
        Ok(())
    } else {
        Err(TurntableError::ConfigError(format!(
            "Provider '{}' is disabled in config",
            name
        )))
    }
}
