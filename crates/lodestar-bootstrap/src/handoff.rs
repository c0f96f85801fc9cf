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

//! Hand control to the installed launcher
//!
//! The bootstrap only guarantees the files are in place. What runs next is
//! up to a [`LaunchHandoff`] implementation, which receives everything it
//! needs in a [`LaunchContext`].

use crate::bootstrap::InstallSummary;
use crate::config::LaunchConfig;
use crate::error::{BootstrapError, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::process::Command;

/// Version of the context layout handed to the launcher
pub const HANDOFF_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchContext {
    pub work_dir: PathBuf,
    /// Final primary executable archive
    pub artifact: PathBuf,
    pub bundles: Vec<PathBuf>,
    /// Pass-through command line arguments
    pub args: Vec<String>,
    pub handoff_version: u32,
}

impl LaunchContext {
    pub fn from_summary(summary: &InstallSummary, args: Vec<String>) -> Result<Self> {
        let artifact = summary
            .primary_artifact()
            .ok_or_else(|| BootstrapError::Launch("no primary executable was installed".to_owned()))?;

        Ok(Self {
            work_dir: summary.work_dir.clone(),
            artifact: artifact.to_path_buf(),
            bundles: summary.bundle_dirs(),
            args,
            handoff_version: HANDOFF_VERSION,
        })
    }
}

pub trait LaunchHandoff {
    fn launch(&self, ctx: &LaunchContext) -> Result<()>;
}

impl<F> LaunchHandoff for F
where
    F: Fn(&LaunchContext) -> Result<()>,
{
    fn launch(&self, ctx: &LaunchContext) -> Result<()> {
        self(ctx)
    }
}

/// Runs an external program and waits for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &LaunchConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    /// The command that `launch` would run
    pub fn command(&self, ctx: &LaunchContext) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.args.iter().map(|arg| substitute(arg, ctx)))
            .args(&ctx.args)
            .current_dir(&ctx.work_dir);
        command
    }
}

impl LaunchHandoff for CommandLauncher {
    fn launch(&self, ctx: &LaunchContext) -> Result<()> {
        tracing::info!(
            "Starting {} with {} (handoff v{})",
            self.program,
            ctx.artifact.display(),
            ctx.handoff_version
        );

        let status = self
            .command(ctx)
            .status()
            .map_err(|e| BootstrapError::Launch(format!("failed to run {}: {e}", self.program)))?;

        if status.success() {
            Ok(())
        } else {
            Err(BootstrapError::Launch(format!(
                "{} exited with {status}",
                self.program
            )))
        }
    }
}

fn substitute(arg: &str, ctx: &LaunchContext) -> String {
    arg.replace("{artifact}", &ctx.artifact.to_string_lossy())
        .replace("{work_dir}", &ctx.work_dir.to_string_lossy())
        .replace("{version}", &ctx.handoff_version.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{ResourceSummary, SyncOutcome};
    use crate::install::{BundleReport, InstallReport};
    use crate::resource::ArchiveKind;
    use std::cell::RefCell;

    fn summary() -> InstallSummary {
        InstallSummary {
            work_dir: PathBuf::from("/work"),
            resources: vec![
                ResourceSummary {
                    id: "launcher".to_owned(),
                    kind: ArchiveKind::PrimaryExecutable,
                    cached_commit: None,
                    sync: SyncOutcome::UpToDate,
                    install: Some(InstallReport::Primary {
                        artifact: PathBuf::from("/work/launcher.jar"),
                        entries: 12,
                    }),
                },
                ResourceSummary {
                    id: "assets".to_owned(),
                    kind: ArchiveKind::FlatBundle,
                    cached_commit: None,
                    sync: SyncOutcome::TimedOut,
                    install: Some(InstallReport::Bundle {
                        directory: PathBuf::from("/work/assets"),
                        report: BundleReport::default(),
                    }),
                },
            ],
        }
    }

    #[test]
    fn test_context_from_summary() {
        let ctx = LaunchContext::from_summary(&summary(), vec!["--demo".to_owned()]).unwrap();
        assert_eq!(ctx.artifact, PathBuf::from("/work/launcher.jar"));
        assert_eq!(ctx.bundles, vec![PathBuf::from("/work/assets")]);
        assert_eq!(ctx.handoff_version, HANDOFF_VERSION);
    }

    #[test]
    fn test_context_requires_primary() {
        let mut summary = summary();
        summary.resources.remove(0);
        assert!(matches!(
            LaunchContext::from_summary(&summary, vec![]),
            Err(BootstrapError::Launch(_))
        ));
    }

    #[test]
    fn test_command_substitutes_placeholders() {
        let ctx = LaunchContext::from_summary(&summary(), vec!["--demo".to_owned()]).unwrap();
        let launcher = CommandLauncher::new(
            "java",
            vec![
                "-jar".to_owned(),
                "{artifact}".to_owned(),
                "--workDir={work_dir}".to_owned(),
                "--handoff={version}".to_owned(),
            ],
        );

        let command = launcher.command(&ctx);
        let args: Vec<_> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-jar",
                "/work/launcher.jar",
                "--workDir=/work",
                "--handoff=2",
                "--demo"
            ]
        );
    }

    #[test]
    fn test_closure_handoff() {
        let seen = RefCell::new(None);
        let handoff = |ctx: &LaunchContext| -> Result<()> {
            *seen.borrow_mut() = Some(ctx.artifact.clone());
            Ok(())
        };

        let ctx = LaunchContext::from_summary(&summary(), vec![]).unwrap();
        handoff.launch(&ctx).unwrap();
        assert_eq!(
            seen.into_inner(),
            Some(PathBuf::from("/work/launcher.jar"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_command_launcher_runs_program() {
        let temp = tempfile::TempDir::new().unwrap();
        let artifact = temp.path().join("launcher.jar");
        std::fs::write(&artifact, b"jar").unwrap();

        let ctx = LaunchContext {
            work_dir: temp.path().to_path_buf(),
            artifact,
            bundles: vec![],
            args: vec![],
            handoff_version: HANDOFF_VERSION,
        };

        let ok = CommandLauncher::new("sh", vec!["-c".to_owned(), "test -f {artifact}".to_owned()]);
        ok.launch(&ctx).unwrap();

        let failing = CommandLauncher::new("sh", vec!["-c".to_owned(), "exit 3".to_owned()]);
        assert!(matches!(
            failing.launch(&ctx),
            Err(BootstrapError::Launch(_))
        ));

        let missing = CommandLauncher::new("/nonexistent/lodestar-launcher", vec![]);
        assert!(missing.launch(&ctx).is_err());
    }
}
