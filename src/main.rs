use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;

use paddlewise_lib::{
    build_controller, init_logging,
    models::VideoAsset,
    session::{DashboardEvent, SessionStatus},
    settings::SettingsStore,
};

/// Uploads a paddling video and follows the live analysis.
#[derive(Parser, Debug)]
#[command(name = "paddlewise")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Processing backend base URL
    #[arg(long, global = true, env = "PADDLEWISE_API_BASE")]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a video and print dashboard events as JSON lines
    Analyze { video: PathBuf },
    /// Store the note-generation credential
    SetKey { key: String },
    /// Remove the stored credential, disabling coaching notes
    ClearKey,
    /// Print the effective settings
    ShowSettings,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let path = match cli.settings {
        Some(path) => path,
        None => SettingsStore::default_path()?,
    };
    let settings = SettingsStore::new(path).context("Failed to load settings")?;

    match cli.command {
        Command::Analyze { video } => analyze(&settings, cli.api_base, video).await,
        Command::SetKey { key } => {
            if key.trim().is_empty() {
                bail!("credential is blank");
            }
            settings.set_coach_credential(Some(key))?;
            println!("Credential saved to {}", settings.path().display());
            Ok(())
        }
        Command::ClearKey => {
            settings.set_coach_credential(None)?;
            println!("Credential removed");
            Ok(())
        }
        Command::ShowSettings => {
            let mut snapshot = settings.snapshot();
            snapshot.api_base = cli.api_base.unwrap_or_else(|| settings.api_base());
            snapshot.hf_api_key = snapshot.hf_api_key.map(|_| "<set>".to_string());
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
    }
}

async fn analyze(settings: &SettingsStore, api_base: Option<String>, video: PathBuf) -> Result<()> {
    let asset = VideoAsset::from_path(&video)
        .await
        .with_context(|| format!("Failed to read {}", video.display()))?;

    let sink = |event: DashboardEvent| match serde_json::to_string(&event) {
        Ok(line) => println!("{line}"),
        Err(err) => log::error!("Failed to encode dashboard event: {}", err),
    };
    let controller = build_controller(settings, api_base, Arc::new(sink));

    let job = controller.start_job(asset).await?;
    log::info!("Following job {}", job.id);

    let status = tokio::select! {
        status = controller.wait_finished() => status,
        _ = signal::ctrl_c() => {
            log::info!("Interrupted; closing stream");
            SessionStatus::Idle
        }
    };
    controller.stop().await?;

    if status == SessionStatus::Failed {
        bail!("analysis of job {} failed", job.id);
    }
    Ok(())
}
