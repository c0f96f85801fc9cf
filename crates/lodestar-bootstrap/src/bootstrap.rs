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

//! Synchronize and install every configured resource
//!
//! Resources are processed one after another. For each one:
//!
//! 1. a verified download left over from an earlier run is committed,
//! 2. with `force` or without a cached copy, the download runs in the
//!    foreground and must succeed for the primary executable,
//! 3. otherwise the download runs in the background and we wait a short
//!    while for its found/not-found decision; only a found update is waited
//!    for to the end,
//! 4. the committed file is installed.

use crate::config::BootstrapConfig;
use crate::controller::{DownloadOutcome, UpdateController};
use crate::downloader::Downloader;
use crate::error::{BootstrapError, Result};
use crate::events::{PipelineEvent, report_event};
use crate::hasher::file_digest;
use crate::http::build_client;
use crate::install::{ContainerUnpacker, InstallPipeline, InstallReport};
use crate::replace::{CommitOutcome, commit};
use crate::resource::{ArchiveKind, UpdatableResource};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How synchronizing one resource ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Cached copy matches the server
    UpToDate,
    /// A new copy was downloaded and committed
    Updated {
        commit: CommitOutcome,
        digest: String,
        bytes: u64,
    },
    /// Download gave up; the cached copy stays in use
    Stale { reason: String },
    /// No decision within the wait; the cached copy is used and the check
    /// keeps running in the background
    TimedOut,
    /// Download gave up and nothing is cached
    Unavailable { reason: String },
}

#[derive(Debug, Clone)]
pub struct ResourceSummary {
    pub id: String,
    pub kind: ArchiveKind,
    /// Commit of a download staged by an earlier run
    pub cached_commit: Option<CommitOutcome>,
    pub sync: SyncOutcome,
    /// `None` when a bundle could not be installed
    pub install: Option<InstallReport>,
}

#[derive(Debug, Clone)]
pub struct InstallSummary {
    pub work_dir: PathBuf,
    pub resources: Vec<ResourceSummary>,
}

impl InstallSummary {
    pub fn primary_artifact(&self) -> Option<&Path> {
        self.resources
            .iter()
            .find_map(|resource| match &resource.install {
                Some(InstallReport::Primary { artifact, .. }) => Some(artifact.as_path()),
                Some(InstallReport::Bundle { .. }) | None => None,
            })
    }

    pub fn bundle_dirs(&self) -> Vec<PathBuf> {
        self.resources
            .iter()
            .filter_map(|resource| match &resource.install {
                Some(InstallReport::Bundle { directory, .. }) => Some(directory.clone()),
                Some(InstallReport::Primary { .. }) | None => None,
            })
            .collect()
    }

    pub fn resource(&self, id: &str) -> Option<&ResourceSummary> {
        self.resources.iter().find(|resource| resource.id == id)
    }
}

#[derive(Debug)]
pub struct Bootstrap {
    config: BootstrapConfig,
    work_dir: PathBuf,
    client: reqwest::Client,
    resources: Vec<UpdatableResource>,
    pipeline: InstallPipeline,
}

impl Bootstrap {
    pub fn new(config: BootstrapConfig, work_dir: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        let work_dir = work_dir.into();
        prepare_work_dir(&work_dir)?;

        let resources = config.resolve_resources(&work_dir)?;
        let client = build_client(&config)?;

        Ok(Self {
            config,
            work_dir,
            client,
            resources,
            pipeline: InstallPipeline::new(),
        })
    }

    #[must_use]
    pub fn with_unpacker(mut self, unpacker: Arc<dyn ContainerUnpacker>) -> Self {
        self.pipeline = InstallPipeline::with_unpacker(unpacker);
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn resources(&self) -> &[UpdatableResource] {
        &self.resources
    }

    pub async fn execute(&self, force: bool) -> Result<InstallSummary> {
        log_banner(&self.work_dir);

        let mut summaries = Vec::with_capacity(self.resources.len());
        for resource in &self.resources {
            let cached_commit = commit_cached(resource)?;
            let sync = self.synchronize(resource, force).await?;
            let install = self.install(resource).await?;

            summaries.push(ResourceSummary {
                id: resource.id().to_owned(),
                kind: resource.kind(),
                cached_commit,
                sync,
                install,
            });
        }

        Ok(InstallSummary {
            work_dir: self.work_dir.clone(),
            resources: summaries,
        })
    }

    async fn synchronize(&self, resource: &UpdatableResource, force: bool) -> Result<SyncOutcome> {
        let foreground = force || !resource.slot_path().is_file();

        let local_digest = if foreground {
            None
        } else {
            let slot = resource.slot_path().to_path_buf();
            tokio::task::spawn_blocking(move || file_digest(&slot))
                .await
                .map_err(|e| BootstrapError::Task(e.to_string()))?
        };

        let downloader = Downloader::new(
            self.client.clone(),
            resource,
            local_digest,
            self.config.max_retries,
        )
        .forced(force);

        if foreground {
            let controller = UpdateController::new();
            let report = downloader.run(&controller).await;
            return Self::settle(resource, report.outcome, report.attempts, true);
        }

        let controller = Arc::new(UpdateController::new());
        let worker = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { downloader.run(&controller).await })
        };

        tracing::info!("Looking for update");
        let Some(found) = controller
            .wait_update_found(self.config.update_wait())
            .await
        else {
            // The worker stays detached; a later staged file is committed next run.
            tracing::info!("Didn't find an update in time.");
            return Ok(SyncOutcome::TimedOut);
        };

        if found {
            tracing::info!("Found update in time, waiting to download");
            report_event(&PipelineEvent::UpdateFound {
                resource: resource.id().to_owned(),
            });
        }

        let outcome = controller.wait_downloaded().await;
        let attempts = match worker.await {
            Ok(report) => report.attempts,
            Err(e) => {
                tracing::warn!("Downloader for {} did not finish cleanly: {e}", resource.id());
                0
            }
        };
        Self::settle(resource, outcome, attempts, false)
    }

    /// Act on how the download ended
    fn settle(
        resource: &UpdatableResource,
        outcome: DownloadOutcome,
        attempts: u32,
        foreground: bool,
    ) -> Result<SyncOutcome> {
        match outcome {
            DownloadOutcome::NotNeeded => {
                report_event(&PipelineEvent::NoUpdate {
                    resource: resource.id().to_owned(),
                });
                Ok(SyncOutcome::UpToDate)
            }
            DownloadOutcome::Verified {
                path,
                digest,
                bytes,
            } => {
                report_event(&PipelineEvent::DownloadVerified {
                    resource: resource.id().to_owned(),
                    digest: digest.clone(),
                    bytes,
                    attempts,
                });
                let commit = commit(&path, resource.slot_path())?;
                report_event(&PipelineEvent::Committed {
                    resource: resource.id().to_owned(),
                    by_copy: matches!(commit, CommitOutcome::Copied { .. }),
                });
                Ok(SyncOutcome::Updated {
                    commit,
                    digest,
                    bytes,
                })
            }
            DownloadOutcome::Failed { reason } => {
                report_event(&PipelineEvent::DownloadFailed {
                    resource: resource.id().to_owned(),
                    reason: reason.clone(),
                });

                if foreground && resource.kind() == ArchiveKind::PrimaryExecutable {
                    return Err(BootstrapError::ForcedDownload {
                        resource: resource.id().to_owned(),
                        reason,
                    });
                }

                if resource.slot_path().is_file() {
                    tracing::warn!(
                        "Keeping cached {} ({reason})",
                        resource.slot_path().display()
                    );
                    Ok(SyncOutcome::Stale { reason })
                } else {
                    tracing::warn!("{} is unavailable ({reason})", resource.id());
                    Ok(SyncOutcome::Unavailable { reason })
                }
            }
        }
    }

    async fn install(&self, resource: &UpdatableResource) -> Result<Option<InstallReport>> {
        if !resource.slot_path().is_file() {
            return match resource.kind() {
                ArchiveKind::PrimaryExecutable => Err(BootstrapError::MissingSlot {
                    resource: resource.id().to_owned(),
                    slot: resource.slot_path().to_path_buf(),
                }),
                ArchiveKind::FlatBundle => {
                    tracing::warn!("Nothing to install for {}, skipping", resource.id());
                    Ok(None)
                }
            };
        }

        let pipeline = self.pipeline.clone();
        let owned = resource.clone();
        let result = tokio::task::spawn_blocking(move || pipeline.install(&owned))
            .await
            .map_err(|e| BootstrapError::Task(e.to_string()))?;

        match result {
            Ok(report) => {
                let (entries, bundle) = match &report {
                    InstallReport::Primary { entries, .. } => (*entries, None),
                    InstallReport::Bundle { report, .. } => (report.files, Some(*report)),
                };
                report_event(&PipelineEvent::Installed {
                    resource: resource.id().to_owned(),
                    entries,
                    bundle,
                });
                Ok(Some(report))
            }
            Err(e) if resource.kind() == ArchiveKind::FlatBundle => {
                tracing::warn!("Unable to install {}: {e}", resource.id());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Commit a verified download staged by an earlier run
fn commit_cached(resource: &UpdatableResource) -> Result<Option<CommitOutcome>> {
    if !resource.staging_path().is_file() {
        return Ok(None);
    }

    tracing::info!("Found cached update");
    let outcome = commit(resource.staging_path(), resource.slot_path())?;
    if outcome.replaced() {
        report_event(&PipelineEvent::Committed {
            resource: resource.id().to_owned(),
            by_copy: matches!(outcome, CommitOutcome::Copied { .. }),
        });
    }
    Ok(Some(outcome))
}

/// Make sure `work_dir` is a usable directory
pub fn prepare_work_dir(work_dir: &Path) -> Result<()> {
    if work_dir.exists() && !work_dir.is_dir() {
        return Err(BootstrapError::WorkDir {
            path: work_dir.to_path_buf(),
            reason: "exists but is not a directory".to_owned(),
        });
    }

    std::fs::create_dir_all(work_dir).map_err(|e| BootstrapError::WorkDir {
        path: work_dir.to_path_buf(),
        reason: format!("unable to create directory: {e}"),
    })
}

fn log_banner(work_dir: &Path) {
    tracing::info!("Lodestar bootstrap (v{})", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Current time is {}",
        chrono::Local::now().format("%b %e, %Y %l:%M:%S %p")
    );
    tracing::info!(
        "os = '{}', family = '{}', arch = '{}'",
        std::env::consts::OS,
        std::env::consts::FAMILY,
        std::env::consts::ARCH
    );
    tracing::info!("Working directory: {}", work_dir.display());
}
