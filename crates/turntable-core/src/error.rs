//! Error types for turntable

use thiserror::Error;

/// The main error type for turntable operations
#[derive(Debug, Error)]
pub enum TurntableError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Image generation failed: {0}")]
    GenerationFailed(GenerationFailure),

    #[error("Model conversion failed: {0}")]
    ConversionFailed(ConversionFailure),

    #[error("Model conversion timed out: task {task_id} unresolved after {attempts} poll attempts")]
    ConversionTimeout { task_id: String, attempts: u32 },

    #[error("HTTP transport error: {0}")]
    TransportError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Worker error: {0}")]
    WorkerError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),
}

/// Why a single text-to-image call did not produce an image URL
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationFailure {
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Terminal failure of an image-to-3D conversion task
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionFailure {
    /// The task was never accepted by the service
    #[error("submission rejected: {0}")]
    Submit(String),

    /// The service reported the task as failed
    #[error("task {task_id} failed: {message}")]
    Rejected { task_id: String, message: String },

    /// The service reported success but no artifact key was present
    #[error("task {task_id} succeeded but result missing (output keys: {keys:?})")]
    MissingArtifact { task_id: String, keys: Vec<String> },
}

/// Result type alias for turntable operations
pub type Result<T> = std::result::Result<T, TurntableError>;

impl TurntableError {
    /// Short machine-readable tag, used when recording failures on jobs
    pub fn kind(&self) -> &'static str {
        match self {
            TurntableError::ValidationError(_) => "validation",
            TurntableError::GenerationFailed(GenerationFailure::Status { .. }) => {
                "generation_status"
            }
            TurntableError::GenerationFailed(GenerationFailure::Parse(_)) => "generation_parse",
            TurntableError::GenerationFailed(GenerationFailure::Transport(_)) => {
                "generation_transport"
            }
            TurntableError::ConversionFailed(ConversionFailure::Submit(_)) => "conversion_submit",
            TurntableError::ConversionFailed(ConversionFailure::Rejected { .. }) => {
                "conversion_failed"
            }
            TurntableError::ConversionFailed(ConversionFailure::MissingArtifact { .. }) => {
                "missing_artifact"
            }
            TurntableError::ConversionTimeout { .. } => "conversion_timeout",
            TurntableError::TransportError(_) => "transport",
            TurntableError::StorageError(_) => "storage",
            TurntableError::ConfigError(_) => "config",
            TurntableError::JobNotFound(_) => "job_not_found",
            TurntableError::WorkerError(_) => "worker",
            TurntableError::IoError(_) => "io",
            TurntableError::TomlParseError(_) | TurntableError::TomlSerError(_) => "toml",
        }
    }
}

impl From<toml::de::Error> for TurntableError {
    fn from(err: toml::de::Error) -> Self {
        TurntableError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for TurntableError {
    fn from(err: toml::ser::Error) -> Self {
        TurntableError::TomlSerError(err.to_string())
    }
}
