//! Image-to-3D conversion tasks
//!
//! Conversion services are asynchronous: a submission returns a task id and
//! the result has to be polled for. `run_task` is the bounded polling state
//! machine bridging that into a synchronous outcome:
//!
//! ```text
//! submitted -> pending -> { success | failed | timeout }
//! ```
//!
//! Only `pending` is non-terminal. A poll that errors at the transport or
//! parse level is recorded and polling continues; if such errors persist the
//! task ends in `timeout`, never in `failed`.

use crate::sleep::Sleeper;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use turntable_core::{ConversionFailure, Result, TurntableError};

/// Seconds between status polls
pub const POLL_INTERVAL_SECS: u64 = 5;
/// Upper bound on status polls per task
pub const MAX_POLL_ATTEMPTS: u32 = 100;

/// Output keys that may carry the model URL, highest priority first
pub const ARTIFACT_KEYS: [&str; 3] = ["model", "pbr_model", "base_model"];

/// Interval and attempt budget of the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(POLL_INTERVAL_SECS),
            max_attempts: MAX_POLL_ATTEMPTS,
        }
    }
}

/// Status of a conversion task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Success,
    Failed,
    Timeout,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// The `output` object of a successful task. Its shape varies by
/// conversion type, so it is kept as a raw map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOutput {
    entries: serde_json::Map<String, serde_json::Value>,
}

impl TaskOutput {
    pub fn new(entries: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { entries }
    }

    /// First artifact URL found under `ARTIFACT_KEYS`, in priority order.
    ///
    /// Values may be plain URL strings or objects with a `url` field; empty
    /// strings count as absent.
    pub fn artifact_url(&self) -> Option<&str> {
        ARTIFACT_KEYS
            .iter()
            .find_map(|key| self.entries.get(*key).and_then(url_of))
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

fn url_of(value: &serde_json::Value) -> Option<&str> {
    let url = match value {
        serde_json::Value::String(s) => Some(s.as_str()),
        serde_json::Value::Object(o) => o.get("url").and_then(|u| u.as_str()),
        _ => None,
    };
    url.filter(|u| !u.is_empty())
}

/// One parsed status report
#[derive(Debug, Clone, PartialEq)]
pub enum TaskReport {
    /// Still running; progress is advisory only
    Pending { progress: u8 },
    Success { output: TaskOutput },
    Failed { message: Option<String> },
    /// The payload did not have a recognizable shape
    Unrecognized { raw: String },
}

/// An asynchronous image-to-3D service
pub trait ModelConverter: Send + Sync {
    /// Provider name (e.g. "tripo", "mock")
    fn name(&self) -> &str;

    /// Submit a conversion and return the service's task id
    fn submit(&self, image_url: &str) -> Result<String>;

    /// Fetch the current status of a task
    fn poll(&self, task_id: &str) -> Result<TaskReport>;
}

/// One external conversion job, owned exclusively by its poll loop
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionTask {
    pub task_id: String,
    pub status: TaskStatus,
    /// Progress percentage (0-100), advisory
    pub progress: u8,
    pub model_url: Option<String>,
    pub failure: Option<ConversionFailure>,
    /// Polls issued so far
    pub attempts: u32,
    pub transient_errors: u32,
    pub last_transient_error: Option<String>,
}

impl ConversionTask {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Pending,
            progress: 0,
            model_url: None,
            failure: None,
            attempts: 0,
            transient_errors: 0,
            last_transient_error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn apply(&mut self, report: TaskReport) {
        match report {
            TaskReport::Pending { progress } => {
                self.progress = progress.min(100);
                debug!(task_id = %self.task_id, progress = self.progress, "conversion processing");
            }
            TaskReport::Success { output } => match output.artifact_url() {
                Some(url) => {
                    self.status = TaskStatus::Success;
                    self.progress = 100;
                    self.model_url = Some(url.to_string());
                }
                None => {
                    warn!(
                        task_id = %self.task_id,
                        keys = ?output.keys(),
                        "success reported but model URL is missing from output"
                    );
                    self.status = TaskStatus::Failed;
                    self.failure = Some(ConversionFailure::MissingArtifact {
                        task_id: self.task_id.clone(),
                        keys: output.keys(),
                    });
                }
            },
            TaskReport::Failed { message } => {
                self.status = TaskStatus::Failed;
                self.failure = Some(ConversionFailure::Rejected {
                    task_id: self.task_id.clone(),
                    message: message.unwrap_or_else(|| "Unknown error".to_string()),
                });
            }
            TaskReport::Unrecognized { raw } => {
                self.record_transient(format!("unrecognized status payload: {}", raw));
            }
        }
    }

    fn record_transient(&mut self, reason: String) {
        warn!(task_id = %self.task_id, attempt = self.attempts, %reason, "poll error, will retry");
        self.transient_errors += 1;
        self.last_transient_error = Some(reason);
    }

    fn expire(&mut self) {
        self.status = TaskStatus::Timeout;
    }

    /// Consume a terminal task into its model URL or its failure
    pub fn into_result(self) -> Result<String> {
        match self.status {
            TaskStatus::Success => self.model_url.ok_or_else(|| {
                TurntableError::ConversionFailed(ConversionFailure::MissingArtifact {
                    task_id: self.task_id.clone(),
                    keys: Vec::new(),
                })
            }),
            TaskStatus::Failed => Err(TurntableError::ConversionFailed(
                self.failure.unwrap_or(ConversionFailure::Rejected {
                    task_id: self.task_id,
                    message: "Unknown error".to_string(),
                }),
            )),
            TaskStatus::Timeout | TaskStatus::Pending => Err(TurntableError::ConversionTimeout {
                task_id: self.task_id,
                attempts: self.attempts,
            }),
        }
    }
}

/// Drive a pending task to a terminal status.
///
/// Each iteration sleeps `policy.interval` and then polls, for at most
/// `policy.max_attempts` polls.
pub fn run_task(
    converter: &dyn ModelConverter,
    task: &mut ConversionTask,
    policy: &PollPolicy,
    sleeper: &dyn Sleeper,
) {
    while !task.is_terminal() {
        if task.attempts >= policy.max_attempts {
            warn!(task_id = %task.task_id, attempts = task.attempts, "conversion timed out");
            task.expire();
            break;
        }

        sleeper.sleep(policy.interval);
        task.attempts += 1;

        match converter.poll(&task.task_id) {
            Ok(report) => task.apply(report),
            Err(e) => task.record_transient(e.to_string()),
        }
    }
}

/// Submit an image for conversion and poll it to completion.
///
/// Returns the model artifact URL. A failed submission is terminal and is
/// never retried.
pub fn convert(
    converter: &dyn ModelConverter,
    image_url: &str,
    policy: &PollPolicy,
    sleeper: &dyn Sleeper,
) -> Result<String> {
    let task_id = converter.submit(image_url)?;
    info!(provider = converter.name(), %task_id, "conversion task submitted");

    let mut task = ConversionTask::new(task_id);
    run_task(converter, &mut task, policy, sleeper);

    match &task.status {
        TaskStatus::Success => info!(task_id = %task.task_id, attempts = task.attempts, "3D model ready"),
        status => warn!(task_id = %task.task_id, %status, "conversion did not succeed"),
    }
    task.into_result()
}
