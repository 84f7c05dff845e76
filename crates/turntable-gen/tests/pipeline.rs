//! End-to-end pipeline runs against scripted HTTP services

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use turntable_core::{JobId, Result, TurntableError};
use turntable_gen::providers::bria::BriaImageClient;
use turntable_gen::providers::mock::{MockImageGenerator, MockModelConverter};
use turntable_gen::providers::tripo::TripoConverter;
use turntable_gen::{
    FsArtifactStore, HttpResponse, HttpTransport, JobStore, ManualSleeper, MemoryArtifactStore,
    PipelineCoordinator, PipelineWorker, Stage, DEFAULT_ANGLES,
};

const BRIA_URL: &str = "https://bria.test/v2/image/generate";
const TRIPO_URL: &str = "https://tripo.test/v2/openapi/task";
const IMAGE_X: &str = "https://cdn.test/renders/X.png";
const MODEL_Y: &str = "https://cdn.test/models/Y.glb";

/// Plays back canned responses per (method, url) and records every call
#[derive(Default)]
struct ScriptedHttp {
    routes: Mutex<Vec<(String, String, VecDeque<HttpResponse>)>>,
    calls: Mutex<Vec<(String, String, Option<serde_json::Value>)>>,
}

impl ScriptedHttp {
    fn on(self, method: &str, url: &str, responses: Vec<(u16, &str)>) -> Self {
        self.routes.lock().unwrap().push((
            method.to_string(),
            url.to_string(),
            responses
                .into_iter()
                .map(|(status, body)| HttpResponse::new(status, body))
                .collect(),
        ));
        self
    }

    fn respond(&self, method: &str, url: &str, payload: Option<&serde_json::Value>) -> Result<HttpResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), url.to_string(), payload.cloned()));
        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .find(|(m, u, _)| m == method && u == url)
            .ok_or_else(|| TurntableError::TransportError(format!("no route for {} {}", method, url)))?;
        route
            .2
            .pop_front()
            .ok_or_else(|| TurntableError::TransportError(format!("script exhausted for {}", url)))
    }

    fn calls_to(&self, method: &str, url: &str) -> Vec<Option<serde_json::Value>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, u, _)| m == method && u == url)
            .map(|(_, _, p)| p.clone())
            .collect()
    }
}

impl HttpTransport for ScriptedHttp {
    fn post_json(
        &self,
        url: &str,
        _headers: &[(&str, &str)],
        payload: &serde_json::Value,
    ) -> Result<HttpResponse> {
        self.respond("POST", url, Some(payload))
    }

    fn get(&self, url: &str, _headers: &[(&str, &str)]) -> Result<HttpResponse> {
        self.respond("GET", url, None)
    }
}

fn ceramic_mug_services() -> Arc<ScriptedHttp> {
    let generated = format!(r#"{{"result":{{"image_url":"{}"}}}}"#, IMAGE_X);
    let succeeded = format!(
        r#"{{"data":{{"task_id":"T","status":"success","progress":100,"output":{{"pbr_model":"{}"}}}}}}"#,
        MODEL_Y
    );
    let status_url = format!("{}/T", TRIPO_URL);
    Arc::new(
        ScriptedHttp::default()
            .on(
                "POST",
                BRIA_URL,
                vec![(200, generated.as_str())],
            )
            .on("POST", TRIPO_URL, vec![(200, r#"{"code":0,"data":{"task_id":"T"}}"#)])
            .on(
                "GET",
                &status_url,
                vec![
                    (200, r#"{"data":{"task_id":"T","status":"running","progress":10}}"#),
                    (200, r#"{"data":{"task_id":"T","status":"running","progress":40}}"#),
                    (200, succeeded.as_str()),
                ],
            ),
    )
}

fn scripted_coordinator(http: Arc<ScriptedHttp>, sleeper: Arc<ManualSleeper>) -> PipelineCoordinator {
    let generator = Arc::new(BriaImageClient::new("bria-key", Some(BRIA_URL), http.clone()));
    let converter = Arc::new(TripoConverter::new("tripo-key", Some(TRIPO_URL), http));
    PipelineCoordinator::new(generator, converter, Arc::new(MemoryArtifactStore::new()))
        .with_sleeper(sleeper)
}

#[test]
fn ceramic_mug_runs_to_done_through_worker_pool() {
    let http = ceramic_mug_services();
    let sleeper = Arc::new(ManualSleeper::new());
    let worker = PipelineWorker::new(
        scripted_coordinator(http.clone(), sleeper.clone()),
        Arc::new(JobStore::new()),
        2,
    );

    let job_id = worker.submit_job("ceramic mug").unwrap();
    let job = worker
        .jobs()
        .wait_terminal(&job_id, Duration::from_secs(10))
        .unwrap();

    assert_eq!(job.stage, Stage::Done);
    assert_eq!(job.image_urls, vec![IMAGE_X.to_string()]);
    assert_eq!(job.model_url(), Some(MODEL_Y));
    assert!(job.failure.is_none());

    // The converter was handed the generated image
    let submits = http.calls_to("POST", TRIPO_URL);
    assert_eq!(submits.len(), 1);
    assert_eq!(submits[0].as_ref().unwrap()["file"]["url"], IMAGE_X);

    // Three polls, each preceded by the 5 s interval
    assert_eq!(http.calls_to("GET", &format!("{}/T", TRIPO_URL)).len(), 3);
    assert_eq!(sleeper.count(), 3);
    assert_eq!(sleeper.total(), Duration::from_secs(15));
}

#[test]
fn rejected_generation_never_reaches_converter() {
    let http = Arc::new(ScriptedHttp::default().on("POST", BRIA_URL, vec![(401, "invalid api token")]));
    let worker = PipelineWorker::new(
        scripted_coordinator(http.clone(), Arc::new(ManualSleeper::new())),
        Arc::new(JobStore::new()),
        1,
    );

    let job_id = worker.submit_job("ceramic mug").unwrap();
    let job = worker
        .jobs()
        .wait_terminal(&job_id, Duration::from_secs(10))
        .unwrap();

    assert_eq!(job.stage, Stage::Failed);
    let failure = job.failure.unwrap();
    assert_eq!(failure.stage, Stage::ImageGeneration);
    assert!(failure.reason.contains("401"));
    assert!(http.calls_to("POST", TRIPO_URL).is_empty());
}

#[test]
fn caller_supplied_job_id_is_kept() {
    let worker = PipelineWorker::new(
        scripted_coordinator(ceramic_mug_services(), Arc::new(ManualSleeper::new())),
        Arc::new(JobStore::new()),
        1,
    );

    let requested = JobId::parse("mug-001").unwrap();
    let job_id = worker
        .submit_job_with_id(requested.clone(), "ceramic mug")
        .unwrap();
    assert_eq!(job_id, requested);

    let job = worker
        .jobs()
        .wait_terminal(&job_id, Duration::from_secs(10))
        .unwrap();
    assert_eq!(job.stage, Stage::Done);
}

#[test]
fn multiview_job_writes_views_to_disk() {
    let root = std::env::temp_dir().join(format!("turntable_views_{}", uuid::Uuid::new_v4()));
    let coordinator = PipelineCoordinator::new(
        Arc::new(MockImageGenerator::new()),
        Arc::new(MockModelConverter::new()),
        Arc::new(FsArtifactStore::new(&root)),
    )
    .with_sleeper(Arc::new(ManualSleeper::new()));
    let worker = PipelineWorker::new(coordinator, Arc::new(JobStore::new()), 1);

    let summary = worker.submit_view_job("wooden crate", false).unwrap();
    assert_eq!(summary.stage, Stage::Done);
    assert_eq!(summary.view_count, DEFAULT_ANGLES.len());

    for angle in DEFAULT_ANGLES {
        let path = root
            .join(summary.job_id.as_str())
            .join("views")
            .join(format!("{}.png", angle));
        assert!(path.exists(), "missing {}", path.display());
    }

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn queued_multiview_job_converts_each_view() {
    let coordinator = PipelineCoordinator::new(
        Arc::new(MockImageGenerator::new()),
        Arc::new(MockModelConverter::new()),
        Arc::new(MemoryArtifactStore::new()),
    )
    .with_sleeper(Arc::new(ManualSleeper::new()))
    .with_angles(&[0, 120, 240]);
    let worker = PipelineWorker::new(coordinator, Arc::new(JobStore::new()), 2);

    let job_id = worker.submit_views_async("desk lamp", true).unwrap();
    let job = worker
        .jobs()
        .wait_terminal(&job_id, Duration::from_secs(10))
        .unwrap();

    assert_eq!(job.stage, Stage::Done);
    assert_eq!(job.views.len(), 3);
    assert_eq!(job.conversions.len(), 3);
    assert_eq!(job.model_urls.len(), 3);
}
