//! Project config scaffolding

use anyhow::Result;
use std::path::Path;
use turntable_gen::TurntableConfig;

pub fn run(dir: &str) -> Result<()> {
    let path = TurntableConfig::init_project(Path::new(dir)).map_err(|e| anyhow::anyhow!("{}", e))?;
    println!("Created {}", path.display());
    println!("  Set TURNTABLE_BRIA_API_KEY and TURNTABLE_TRIPO_API_KEY, or add api_key entries to it.");
    println!("  Run with --provider-mock to try the pipeline offline.");
    Ok(())
}
