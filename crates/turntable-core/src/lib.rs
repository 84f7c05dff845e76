//! Turntable Core - Foundational types shared by the turntable crates
//!
//! - `TurntableError` / `Result` - the error taxonomy of the pipeline
//! - `ContentHash` - SHA-256 hashes of persisted artifacts
//! - `JobId` - pipeline job identifiers

mod error;
mod hash;
mod id;

pub use error::{ConversionFailure, GenerationFailure, Result, TurntableError};
pub use hash::ContentHash;
pub use id::JobId;
