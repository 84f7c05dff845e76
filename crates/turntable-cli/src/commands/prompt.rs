//! Structured prompt preview

use anyhow::Result;
use turntable_gen::prompt::DEFAULT_CAMERA;
use turntable_gen::{turntable_directive, ScenePrompt};

pub fn run(subject: &str, camera: Option<&str>, angle: Option<u16>) -> Result<()> {
    let prompt = match angle {
        Some(angle) => ScenePrompt::multiview_base(subject).with_camera(&turntable_directive(angle)),
        None => ScenePrompt::build(subject, camera.unwrap_or(DEFAULT_CAMERA)),
    };
    println!("{}", serde_json::to_string_pretty(&prompt)?);
    Ok(())
}
