//! Multiview turntable generation
//!
//! Renders one subject from a fixed ring of camera angles. All views share
//! one orientation-free master prompt; only the camera directive changes.
//! The angle-0 render becomes a weak anchor for every later angle so colour
//! and structure stay consistent while the pose is free to rotate.
//!
//! A failing angle is recorded and skipped: a partial view set is still
//! useful, so unlike the single-image path this batch never fails fast.

use crate::image::{AnchorReference, GenerationOptions, ImageGenerator};
use crate::prompt::{turntable_directive, ScenePrompt};
use crate::storage::{view_location, ArtifactStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use turntable_core::{ContentHash, Result};

/// The default turntable ring, in degrees
pub const DEFAULT_ANGLES: [u16; 8] = [0, 45, 90, 135, 180, 225, 270, 315];

/// One view written to storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedView {
    pub angle: u16,
    /// Where the store put the bytes
    pub location: String,
    /// URL the image service returned for this view
    pub image_url: String,
    /// `sha256:` hash of the bytes written
    pub content_hash: String,
}

/// One angle that produced no saved view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewFailure {
    pub angle: u16,
    pub reason: String,
}

/// Per-angle outcome of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiviewReport {
    pub saved: Vec<SavedView>,
    pub failures: Vec<ViewFailure>,
}

impl MultiviewReport {
    pub fn saved_locations(&self) -> Vec<String> {
        self.saved.iter().map(|v| v.location.clone()).collect()
    }

    pub fn attempted(&self) -> usize {
        self.saved.len() + self.failures.len()
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Drives an image generator around the turntable ring
pub struct MultiviewOrchestrator {
    generator: Arc<dyn ImageGenerator>,
    store: Arc<dyn ArtifactStore>,
}

impl MultiviewOrchestrator {
    pub fn new(generator: Arc<dyn ImageGenerator>, store: Arc<dyn ArtifactStore>) -> Self {
        Self { generator, store }
    }

    /// Generate every angle of `angles` (ascending, duplicates dropped).
    pub fn generate_views(&self, subject: &str, job_id: &str, angles: &[u16]) -> MultiviewReport {
        let mut ordered = angles.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        info!(%job_id, %subject, views = ordered.len(), "starting multiview generation");

        let base = ScenePrompt::multiview_base(subject);
        let mut anchor_url: Option<String> = None;
        let mut report = MultiviewReport::default();

        for angle in ordered {
            let prompt = base.with_camera(&turntable_directive(angle));

            let mut options = GenerationOptions::default();
            if angle > 0 {
                if let Some(url) = &anchor_url {
                    options = options.with_anchor(AnchorReference::weak(url.clone()));
                }
            }

            let image_url = match self.generator.generate(&prompt, &options) {
                Ok(url) => url,
                Err(e) => {
                    warn!(%job_id, angle, error = %e, "view generation failed");
                    report.failures.push(ViewFailure {
                        angle,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if angle == 0 {
                anchor_url = Some(image_url.clone());
                info!(%job_id, "anchor image locked");
            }

            match self.persist(job_id, angle, &image_url) {
                Ok(view) => {
                    info!(%job_id, angle, location = %view.location, "saved view");
                    report.saved.push(view);
                }
                Err(e) => {
                    warn!(%job_id, angle, error = %e, "view could not be saved");
                    report.failures.push(ViewFailure {
                        angle,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            %job_id,
            saved = report.saved.len(),
            failed = report.failures.len(),
            "multiview generation finished"
        );
        report
    }

    fn persist(&self, job_id: &str, angle: u16, image_url: &str) -> Result<SavedView> {
        let bytes = self.generator.fetch(image_url)?;
        let extension = image::guess_format(&bytes)
            .ok()
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("png");
        let location = self
            .store
            .put(&view_location(job_id, angle, extension), &bytes)?;

        Ok(SavedView {
            angle,
            location,
            image_url: image_url.to_string(),
            content_hash: ContentHash::from_bytes(&bytes).to_prefixed_hex(),
        })
    }
}
