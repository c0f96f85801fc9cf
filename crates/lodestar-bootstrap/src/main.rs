// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Lodestar.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Lodestar bootstrap - entry point
//!
//! Brings the cached launcher and bundles up to date, then starts the
//! launcher. Any fatal error is written next to the cache together with the
//! full log transcript.

use clap::Parser;
use lodestar_bootstrap::config::{CONFIG_FILE_NAME, default_work_dir, load_config};
use lodestar_bootstrap::handoff::{CommandLauncher, LaunchContext, LaunchHandoff};
use lodestar_bootstrap::{Bootstrap, Transcript};
use std::path::{Path, PathBuf};
use tracing::{error, info};

const FAILURE_LOG: &str = "bootstrap-failure.log";

#[derive(Debug, Parser)]
#[command(name = "lodestar-bootstrap", version, about)]
struct Cli {
    /// Download everything again, even when the cache is current
    #[arg(long)]
    force: bool,

    /// Cache and install directory
    #[arg(long, value_name = "DIR")]
    work_dir: Option<PathBuf>,

    /// Config file (default: <work-dir>/bootstrap.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Passed through to the launcher
    #[arg(last = true)]
    launcher_args: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let transcript = Transcript::new();
    lodestar_bootstrap::transcript::init_tracing(&transcript)?;

    let work_dir = cli.work_dir.clone().unwrap_or_else(default_work_dir);

    if let Err(e) = run(cli, &work_dir).await {
        error!("FATAL ERROR: {e:#}");
        error!("Please fix the error and restart.");
        save_transcript(&transcript, &work_dir);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli, work_dir: &Path) -> anyhow::Result<()> {
    let config_path = cli
        .config
        .unwrap_or_else(|| work_dir.join(CONFIG_FILE_NAME));
    let config = load_config(&config_path)?;
    let launcher = CommandLauncher::from_config(&config.launch);

    let bootstrap = Bootstrap::new(config, work_dir)?;
    let summary = bootstrap.execute(cli.force).await?;

    let context = LaunchContext::from_summary(&summary, cli.launcher_args)?;
    info!("Handing off to {}", context.artifact.display());
    tokio::task::spawn_blocking(move || launcher.launch(&context)).await??;

    Ok(())
}

fn save_transcript(transcript: &Transcript, work_dir: &Path) {
    if !work_dir.is_dir() {
        return;
    }
    let path = work_dir.join(FAILURE_LOG);
    match transcript.write_to(&path) {
        Ok(()) => info!("Wrote log to {}", path.display()),
        Err(e) => error!("Unable to write {}: {e}", path.display()),
    }
}
