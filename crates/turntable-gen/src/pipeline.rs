//! Pipeline coordinator
//!
//! Chains image generation and 3D conversion for one job. The single-image
//! path is fail-fast: the first failing stage ends the job. The multiview
//! path tolerates failed angles and failed per-view conversions as long as
//! something usable comes out.
//!
//! The coordinator owns the job it is running. Every stage transition is
//! pushed to a `JobObserver` as a full snapshot.

use crate::config::TurntableConfig;
use crate::conversion::{convert, ModelConverter, PollPolicy};
use crate::image::{GenerationOptions, ImageGenerator};
use crate::job::{JobMode, JobObserver, PipelineJob, Stage, ViewConversion};
use crate::multiview::{MultiviewOrchestrator, DEFAULT_ANGLES};
use crate::prompt::ScenePrompt;
use crate::providers::{create_image_generator, create_model_converter};
use crate::sleep::{Sleeper, ThreadSleeper};
use crate::storage::{ArtifactStore, FsArtifactStore};
use crate::transport::HttpTransport;
use std::sync::Arc;
use tracing::{info, warn};
use turntable_core::{JobId, Result, TurntableError};

/// Longest subject accepted, in characters
pub const MAX_SUBJECT_CHARS: usize = 1000;

/// Check a subject before any external call is made.
///
/// Returns the trimmed subject.
pub fn validate_subject(subject: &str) -> Result<&str> {
    let trimmed = subject.trim();
    if trimmed.is_empty() {
        return Err(TurntableError::ValidationError(
            "Subject must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_SUBJECT_CHARS {
        return Err(TurntableError::ValidationError(format!(
            "Subject is longer than {} characters",
            MAX_SUBJECT_CHARS
        )));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(TurntableError::ValidationError(
            "Subject must not contain control characters".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Runs jobs through the generation and conversion services
pub struct PipelineCoordinator {
    generator: Arc<dyn ImageGenerator>,
    converter: Arc<dyn ModelConverter>,
    orchestrator: MultiviewOrchestrator,
    angles: Vec<u16>,
    policy: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl PipelineCoordinator {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        converter: Arc<dyn ModelConverter>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            orchestrator: MultiviewOrchestrator::new(generator.clone(), store),
            generator,
            converter,
            angles: DEFAULT_ANGLES.to_vec(),
            policy: PollPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Wire up the configured providers and a filesystem store under
    /// `[pipeline] storage_root`.
    pub fn from_config(config: &TurntableConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let generator =
            create_image_generator(&config.generation.image_provider, config, transport.clone())?;
        let converter = create_model_converter(&config.generation.model_provider, config, transport)?;
        let store = Arc::new(FsArtifactStore::new(&config.pipeline.storage_root));
        info!(
            image_provider = generator.name(),
            model_provider = converter.name(),
            storage_root = %config.pipeline.storage_root,
            "pipeline configured"
        );
        Ok(Self::new(generator, converter, store))
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Override the turntable ring used by `run_multiview`
    pub fn with_angles(mut self, angles: &[u16]) -> Self {
        self.angles = angles.to_vec();
        self
    }

    /// Single image, then one conversion. Stops at the first failure.
    pub fn run(&self, job_id: JobId, subject: &str, observer: &dyn JobObserver) -> PipelineJob {
        let mut job = PipelineJob::new(job_id, subject, JobMode::Single);
        observer.job_updated(&job);
        info!(job_id = %job.id, %subject, "pipeline started");

        let prompt = ScenePrompt::single(subject);
        let image_url = match self.generator.generate(&prompt, &GenerationOptions::default()) {
            Ok(url) => url,
            Err(e) => return self.finish_failed(job, &e, observer),
        };
        info!(job_id = %job.id, %image_url, "reference image generated");
        job.image_urls.push(image_url.clone());
        job.advance(Stage::ModelConversion);
        observer.job_updated(&job);

        match convert(self.converter.as_ref(), &image_url, &self.policy, self.sleeper.as_ref()) {
            Ok(model_url) => {
                info!(job_id = %job.id, %model_url, "pipeline complete");
                job.model_urls.push(model_url);
                job.complete();
                observer.job_updated(&job);
                job
            }
            Err(e) => self.finish_failed(job, &e, observer),
        }
    }

    /// The turntable ring, then optionally one conversion per saved view.
    pub fn run_multiview(
        &self,
        job_id: JobId,
        subject: &str,
        convert_views: bool,
        observer: &dyn JobObserver,
    ) -> PipelineJob {
        let mut job = PipelineJob::new(
            job_id,
            subject,
            JobMode::Multiview {
                convert: convert_views,
            },
        );
        observer.job_updated(&job);

        let report = self
            .orchestrator
            .generate_views(subject, job.id.as_str(), &self.angles);
        job.image_urls = report.saved.iter().map(|v| v.image_url.clone()).collect();
        job.views = report.saved;
        job.view_failures = report.failures;

        if job.views.is_empty() {
            let reason = format!("No view could be generated ({} angles failed)", job.view_failures.len());
            warn!(job_id = %job.id, "{}", reason);
            job.fail_with("no_views", reason);
            observer.job_updated(&job);
            return job;
        }

        if !convert_views {
            job.complete();
            observer.job_updated(&job);
            return job;
        }

        job.advance(Stage::ModelConversion);
        observer.job_updated(&job);

        let views = job.views.clone();
        for view in &views {
            let outcome = convert(
                self.converter.as_ref(),
                &view.image_url,
                &self.policy,
                self.sleeper.as_ref(),
            );
            let conversion = match outcome {
                Ok(model_url) => {
                    job.model_urls.push(model_url.clone());
                    ViewConversion {
                        angle: view.angle,
                        model_url: Some(model_url),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(job_id = %job.id, angle = view.angle, error = %e, "view conversion failed");
                    ViewConversion {
                        angle: view.angle,
                        model_url: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            job.conversions.push(conversion);
            observer.job_updated(&job);
        }

        if job.model_urls.is_empty() {
            let reason = format!("All {} view conversions failed", job.conversions.len());
            warn!(job_id = %job.id, "{}", reason);
            job.fail_with("conversion_failed", reason);
        } else {
            info!(job_id = %job.id, models = job.model_urls.len(), "multiview pipeline complete");
            job.complete();
        }
        observer.job_updated(&job);
        job
    }

    fn finish_failed(
        &self,
        mut job: PipelineJob,
        error: &TurntableError,
        observer: &dyn JobObserver,
    ) -> PipelineJob {
        warn!(job_id = %job.id, stage = %job.stage, error = %error, "pipeline failed");
        job.fail(error);
        observer.job_updated(&job);
        job
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::{TaskOutput, TaskReport};
    use crate::job::JobStore;
    use crate::providers::mock::{MockImageGenerator, MockModelConverter, MOCK_MODEL_URL};
    use crate::sleep::ManualSleeper;
    use crate::storage::MemoryArtifactStore;
    use std::sync::Mutex;
    use turntable_core::{ConversionFailure, GenerationFailure};

    struct FailingGenerator;

    impl ImageGenerator for FailingGenerator {
        fn name(&self) -> &str {
            "failing"
        }

        fn generate(&self, _prompt: &ScenePrompt, _options: &GenerationOptions) -> Result<String> {
            Err(TurntableError::GenerationFailed(GenerationFailure::Status {
                status: 503,
                body: "busy".to_string(),
            }))
        }

        fn fetch(&self, _image_url: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    /// Counts submissions and fails every task
    #[derive(Default)]
    struct RejectingConverter {
        submits: Mutex<u32>,
    }

    impl ModelConverter for RejectingConverter {
        fn name(&self) -> &str {
            "rejecting"
        }

        fn submit(&self, _image_url: &str) -> Result<String> {
            let mut submits = self.submits.lock().unwrap();
            *submits += 1;
            Ok(format!("task-{}", submits))
        }

        fn poll(&self, _task_id: &str) -> Result<TaskReport> {
            Ok(TaskReport::Failed {
                message: Some("unsupported image".to_string()),
            })
        }
    }

    /// Succeeds only for the first submitted image
    #[derive(Default)]
    struct FirstOnlyConverter {
        submits: Mutex<u32>,
    }

    impl ModelConverter for FirstOnlyConverter {
        fn name(&self) -> &str {
            "first-only"
        }

        fn submit(&self, _image_url: &str) -> Result<String> {
            let mut submits = self.submits.lock().unwrap();
            *submits += 1;
            if *submits == 1 {
                Ok("good".to_string())
            } else {
                Err(TurntableError::ConversionFailed(ConversionFailure::Submit(
                    "quota exceeded".to_string(),
                )))
            }
        }

        fn poll(&self, _task_id: &str) -> Result<TaskReport> {
            let mut output = serde_json::Map::new();
            output.insert("model".to_string(), serde_json::json!("https://x/first.glb"));
            Ok(TaskReport::Success {
                output: TaskOutput::new(output),
            })
        }
    }

    fn coordinator(
        generator: Arc<dyn ImageGenerator>,
        converter: Arc<dyn ModelConverter>,
    ) -> PipelineCoordinator {
        PipelineCoordinator::new(generator, converter, Arc::new(MemoryArtifactStore::new()))
            .with_sleeper(Arc::new(ManualSleeper::new()))
    }

    #[test]
    fn test_validate_subject() {
        assert_eq!(validate_subject("  ceramic mug ").unwrap(), "ceramic mug");
        assert_eq!(validate_subject("").unwrap_err().kind(), "validation");
        assert!(validate_subject("   ").is_err());
        assert!(validate_subject("mug\u{0}").is_err());
        assert!(validate_subject(&"a".repeat(MAX_SUBJECT_CHARS + 1)).is_err());
    }

    #[test]
    fn test_from_config_requires_real_provider_keys() {
        let transport: Arc<dyn HttpTransport> = Arc::new(crate::transport::UreqTransport::new());
        let config = TurntableConfig::default();
        assert_eq!(
            PipelineCoordinator::from_config(&config, transport.clone())
                .err()
                .unwrap()
                .kind(),
            "config"
        );

        let mut mock = TurntableConfig::default();
        mock.use_mock_providers();
        assert!(PipelineCoordinator::from_config(&mock, transport).is_ok());
    }

    #[test]
    fn test_single_path_success() {
        let store = JobStore::new();
        let coordinator = coordinator(
            Arc::new(MockImageGenerator::new()),
            Arc::new(MockModelConverter::new()),
        );
        let job = coordinator.run(JobId::generate(), "ceramic mug", &store);

        assert_eq!(job.stage, Stage::Done);
        assert_eq!(job.model_url(), Some(MOCK_MODEL_URL));
        assert_eq!(job.image_urls.len(), 1);
        assert_eq!(store.load(&job.id).unwrap(), job);
    }

    #[test]
    fn test_generation_failure_skips_conversion() {
        let converter = Arc::new(RejectingConverter::default());
        let coordinator = coordinator(Arc::new(FailingGenerator), converter.clone());
        let job = coordinator.run(JobId::generate(), "mug", &JobStore::new());

        assert_eq!(job.stage, Stage::Failed);
        let failure = job.failure.unwrap();
        assert_eq!(failure.stage, Stage::ImageGeneration);
        assert_eq!(failure.kind, "generation_status");
        assert_eq!(*converter.submits.lock().unwrap(), 0);
    }

    #[test]
    fn test_conversion_failure_tags_conversion_stage() {
        let coordinator = coordinator(
            Arc::new(MockImageGenerator::new()),
            Arc::new(RejectingConverter::default()),
        );
        let job = coordinator.run(JobId::generate(), "mug", &JobStore::new());

        assert_eq!(job.stage, Stage::Failed);
        let failure = job.failure.unwrap();
        assert_eq!(failure.stage, Stage::ModelConversion);
        assert!(failure.reason.contains("unsupported image"));
        assert_eq!(job.image_urls.len(), 1);
    }

    #[test]
    fn test_multiview_without_conversion() {
        let coordinator = coordinator(
            Arc::new(MockImageGenerator::new()),
            Arc::new(RejectingConverter::default()),
        );
        let job = coordinator.run_multiview(JobId::generate(), "lamp", false, &JobStore::new());

        assert_eq!(job.stage, Stage::Done);
        assert_eq!(job.views.len(), DEFAULT_ANGLES.len());
        assert!(job.conversions.is_empty());
    }

    #[test]
    fn test_multiview_with_no_views_fails_at_view_generation() {
        let coordinator = coordinator(Arc::new(FailingGenerator), Arc::new(MockModelConverter::new()));
        let job = coordinator.run_multiview(JobId::generate(), "lamp", true, &JobStore::new());

        assert_eq!(job.stage, Stage::Failed);
        assert_eq!(job.failure.unwrap().stage, Stage::ViewGeneration);
        assert_eq!(job.view_failures.len(), DEFAULT_ANGLES.len());
    }

    #[test]
    fn test_multiview_partial_conversion_is_done() {
        let coordinator = coordinator(
            Arc::new(MockImageGenerator::new()),
            Arc::new(FirstOnlyConverter::default()),
        )
        .with_angles(&[0, 90, 180]);
        let job = coordinator.run_multiview(JobId::generate(), "lamp", true, &JobStore::new());

        assert_eq!(job.stage, Stage::Done);
        assert_eq!(job.model_urls, vec!["https://x/first.glb".to_string()]);
        assert_eq!(job.conversions.len(), 3);
        assert!(job.conversions[1].error.as_ref().unwrap().contains("quota exceeded"));
    }

    #[test]
    fn test_multiview_all_conversions_failed() {
        let coordinator = coordinator(
            Arc::new(MockImageGenerator::new()),
            Arc::new(RejectingConverter::default()),
        )
        .with_angles(&[0, 180]);
        let job = coordinator.run_multiview(JobId::generate(), "lamp", true, &JobStore::new());

        assert_eq!(job.stage, Stage::Failed);
        let failure = job.failure.unwrap();
        assert_eq!(failure.stage, Stage::ModelConversion);
        assert_eq!(failure.kind, "conversion_failed");
    }
}
