//! Structured scene prompts
//!
//! A `ScenePrompt` is the structured description the text-to-image engine
//! consumes. Every field is filled from a fixed studio template; the camera
//! directive is the only axis that varies between requests for the same
//! subject, which is what keeps geometry and colour stable across views.

use serde::{Deserialize, Serialize};
use turntable_core::{GenerationFailure, Result, TurntableError};

/// Camera directive used when none is requested
pub const DEFAULT_CAMERA: &str = "Front view";

/// Which template the non-camera fields come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    /// One reference render for direct 3D conversion
    Single,
    /// Orientation-free master used for every view of a turntable batch
    Multiview,
}

/// A single object in the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub description: String,
    pub location: String,
    pub relationship: String,
    pub relative_size: String,
    pub shape_and_color: String,
    pub texture: String,
    pub appearance_details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lighting {
    pub conditions: String,
    pub direction: String,
    pub shadows: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aesthetics {
    pub composition: String,
    pub color_scheme: String,
    pub mood_atmosphere: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency_requirements: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotographicCharacteristics {
    /// The camera directive
    pub camera_angle: String,
    pub lens_focal_length: String,
    pub depth_of_field: String,
    pub focus: String,
}

/// Structured description of one image-generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenePrompt {
    pub short_description: String,
    pub objects: Vec<SceneObject>,
    pub background_setting: String,
    pub lighting: Lighting,
    pub aesthetics: Aesthetics,
    pub photographic_characteristics: PhotographicCharacteristics,
    pub style_medium: String,
    pub context: String,
    pub artistic_style: String,
}

impl ScenePrompt {
    /// Single-image prompt with the default front camera
    pub fn single(subject: &str) -> Self {
        Self::build(subject, DEFAULT_CAMERA)
    }

    /// Single-image prompt with an explicit camera directive
    pub fn build(subject: &str, camera: &str) -> Self {
        Self::from_template(PromptTemplate::Single, subject, camera)
    }

    /// Orientation-free master prompt for a multiview batch.
    ///
    /// The object description makes no claim about orientation; view
    /// control is left entirely to the camera directive.
    pub fn multiview_base(subject: &str) -> Self {
        Self::from_template(PromptTemplate::Multiview, subject, DEFAULT_CAMERA)
    }

    pub fn from_template(template: PromptTemplate, subject: &str, camera: &str) -> Self {
        let (object_description, shape_and_color, consistency) = match template {
            PromptTemplate::Single => (
                format!("A {} with clear details.", subject),
                "Standard structure, uniform color.",
                None,
            ),
            PromptTemplate::Multiview => (
                format!("A {} with identical structure.", subject),
                "Identical structure, uniform color.",
                Some("Geometry must match exactly.".to_string()),
            ),
        };

        Self {
            short_description: format!("A technical studio photo of a {}.", subject),
            objects: vec![SceneObject {
                description: object_description,
                location: "center".to_string(),
                relationship: "Primary subject.".to_string(),
                relative_size: "large within frame".to_string(),
                shape_and_color: shape_and_color.to_string(),
                texture: "Smooth, clean material.".to_string(),
                appearance_details: "Symmetrical design.".to_string(),
            }],
            background_setting: "Solid white background.".to_string(),
            lighting: Lighting {
                conditions: "Studio lighting".to_string(),
                direction: "Front".to_string(),
                shadows: "Minimal".to_string(),
            },
            aesthetics: Aesthetics {
                composition: "Centered".to_string(),
                color_scheme: "Neutral".to_string(),
                mood_atmosphere: "Technical".to_string(),
                consistency_requirements: consistency,
            },
            photographic_characteristics: PhotographicCharacteristics {
                camera_angle: camera.to_string(),
                lens_focal_length: "50mm".to_string(),
                depth_of_field: "Deep focus".to_string(),
                focus: "Sharp focus".to_string(),
            },
            style_medium: "photograph".to_string(),
            context: "3D asset generation reference.".to_string(),
            artistic_style: "realistic".to_string(),
        }
    }

    /// An independent copy with only the camera directive replaced
    pub fn with_camera(&self, directive: &str) -> Self {
        let mut variant = self.clone();
        variant.photographic_characteristics.camera_angle = directive.to_string();
        variant
    }

    pub fn camera_directive(&self) -> &str {
        &self.photographic_characteristics.camera_angle
    }

    /// Serialize to the structured-JSON string the image service expects
    pub fn to_structured_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            TurntableError::GenerationFailed(GenerationFailure::Parse(format!(
                "Failed to serialize scene prompt: {}",
                e
            )))
        })
    }

    pub fn from_structured_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            TurntableError::GenerationFailed(GenerationFailure::Parse(format!(
                "Invalid scene prompt JSON: {}",
                e
            )))
        })
    }
}

/// Camera directive for one turntable angle, in degrees
pub fn turntable_directive(angle: u16) -> String {
    format!("Turntable view, rotated {} degrees.", angle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_camera_varies_between_builds() {
        let front = ScenePrompt::build("brass lantern", "Front view");
        let side = ScenePrompt::build("brass lantern", "Side view");
        let top = ScenePrompt::build("brass lantern", "Top-down view");

        assert_eq!(front.camera_directive(), "Front view");
        assert_eq!(side.camera_directive(), "Side view");

        // Normalizing the camera must make every variant identical
        assert_eq!(side.with_camera("Front view"), front);
        assert_eq!(top.with_camera("Front view"), front);
    }

    #[test]
    fn test_single_defaults_to_front_view() {
        let prompt = ScenePrompt::single("teapot");
        assert_eq!(prompt.camera_directive(), DEFAULT_CAMERA);
        assert_eq!(prompt.objects[0].description, "A teapot with clear details.");
        assert!(prompt.aesthetics.consistency_requirements.is_none());
    }

    #[test]
    fn test_multiview_base_omits_orientation() {
        let base = ScenePrompt::multiview_base("robot toy");
        let description = &base.objects[0].description;
        assert_eq!(description, "A robot toy with identical structure.");
        assert!(!description.contains("rotated"));
        assert!(!description.contains("view"));
        assert_eq!(
            base.aesthetics.consistency_requirements.as_deref(),
            Some("Geometry must match exactly.")
        );
    }

    #[test]
    fn test_with_camera_leaves_original_untouched() {
        let base = ScenePrompt::multiview_base("chair");
        let rotated = base.with_camera(&turntable_directive(45));
        assert_eq!(base.camera_directive(), DEFAULT_CAMERA);
        assert_eq!(rotated.camera_directive(), "Turntable view, rotated 45 degrees.");
    }

    #[test]
    fn test_structured_json_roundtrip_matches_angle_zero_variant() {
        let base = ScenePrompt::multiview_base("wooden crate");
        let angle_zero = base.with_camera(&turntable_directive(0));
        let rotated = base.with_camera("Turntable view, rotated 90 degrees.");

        let json = rotated.to_structured_json().unwrap();
        let parsed = ScenePrompt::from_structured_json(&json).unwrap();

        assert_eq!(parsed.camera_directive(), "Turntable view, rotated 90 degrees.");
        assert_eq!(parsed.with_camera(angle_zero.camera_directive()), angle_zero);
    }

    #[test]
    fn test_single_template_omits_consistency_key() {
        let json = ScenePrompt::single("mug").to_structured_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["aesthetics"].get("consistency_requirements").is_none());
        assert_eq!(
            value["photographic_characteristics"]["camera_angle"],
            "Front view"
        );
    }

    #[test]
    fn test_empty_subject_is_accepted() {
        let prompt = ScenePrompt::single("");
        assert_eq!(prompt.short_description, "A technical studio photo of a .");
    }
}
