//! Turntable Gen - prompt to studio render to textured 3D model
//!
//! Builds deterministic structured prompts, renders them through a
//! text-to-image provider (one reference shot, or a turntable ring of views
//! anchored on the first), and converts renders into 3D models through an
//! asynchronous image-to-3D provider driven by a bounded poll loop. Jobs
//! run on a fixed worker pool and report their state to an in-process
//! job store.

pub mod config;
pub mod conversion;
pub mod image;
pub mod job;
pub mod multiview;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod sleep;
pub mod storage;
pub mod transport;
pub mod worker;

pub use config::TurntableConfig;
pub use conversion::{convert, ConversionTask, ModelConverter, PollPolicy, TaskReport, TaskStatus};
pub use image::{AnchorReference, GenerationOptions, ImageGenerator};
pub use job::{JobFailure, JobMode, JobObserver, JobStore, PipelineJob, Stage};
pub use multiview::{MultiviewOrchestrator, MultiviewReport, DEFAULT_ANGLES};
pub use pipeline::{validate_subject, PipelineCoordinator};
pub use prompt::{turntable_directive, ScenePrompt};
pub use sleep::{ManualSleeper, Sleeper, ThreadSleeper};
pub use storage::{ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use transport::{HttpResponse, HttpTransport, UreqTransport};
pub use worker::{PipelineWorker, ViewJobSummary};
