//! Turntable CLI - submit prompt-to-3D jobs and inspect prompts

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{batch, generate, init, prompt, views};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "turntable")]
#[command(about = "Turn a short text prompt into studio renders and a textured 3D model", long_about = None)]
#[command(version)]
struct Cli {
    /// Use the offline mock providers instead of the configured services
    #[arg(long, global = true)]
    provider_mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter .turntable/config.toml
    Init {
        /// Project directory
        #[arg(default_value = ".")]
        dir: String,
    },

    /// Generate one reference image and convert it into a 3D model
    Generate {
        /// What to model (e.g. "ceramic mug")
        subject: String,

        /// Give up waiting after this many seconds (the job keeps its last state)
        #[arg(long, default_value = "900")]
        wait_secs: u64,
    },

    /// Render the subject from every turntable angle
    Views {
        /// What to render
        subject: String,

        /// Also convert every saved view into a 3D model
        #[arg(long)]
        convert: bool,
    },

    /// Print the structured prompt for a subject
    Prompt {
        /// What to render
        subject: String,

        /// Camera directive (default: "Front view")
        #[arg(long, conflicts_with = "angle")]
        camera: Option<String>,

        /// Turntable angle in degrees; uses the multiview template
        #[arg(long)]
        angle: Option<u16>,
    },

    /// Submit several subjects at once and report each outcome
    Batch {
        /// Subjects to generate
        #[arg(required = true)]
        subjects: Vec<String>,

        /// Give up waiting after this many seconds per job
        #[arg(long, default_value = "900")]
        wait_secs: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mock = cli.provider_mock;

    match cli.command {
        Commands::Init { dir } => init::run(&dir),
        Commands::Generate { subject, wait_secs } => generate::run(&subject, wait_secs, mock),
        Commands::Views { subject, convert } => views::run(&subject, convert, mock),
        Commands::Prompt {
            subject,
            camera,
            angle,
        } => prompt::run(&subject, camera.as_deref(), angle),
        Commands::Batch {
            subjects,
            wait_secs,
        } => batch::run(&subjects, wait_secs, mock),
    }
}
