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

//! Check-then-fetch state machine for one resource
//!
//! ```text
//! CheckingRemote -> (NoUpdate | UpdateFound) -> Fetching -> (Verified | Mismatch) -> Done | Failed
//! ```
//!
//! The body is streamed into the partial file while it is hashed. Only a
//! body whose digest verifies is renamed to the staging path. Whatever the
//! ending, both controller signals are resolved before `run` returns.

use crate::controller::{DownloadOutcome, UpdateController};
use crate::hasher::StreamingDigest;
use crate::remote_check::{self, RemoteDigest};
use crate::resource::UpdatableResource;
use futures_util::StreamExt;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    CheckingRemote,
    NoUpdate,
    UpdateFound,
    Fetching { attempt: u32 },
    Verified,
    Mismatch,
    Done,
    Failed,
}

/// Retryable failure of a single fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },
}

/// What a finished run did
#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub outcome: DownloadOutcome,
    /// Full iterations started, never above the retry bound
    pub attempts: u32,
    pub transitions: Vec<DownloadState>,
}

#[derive(Debug)]
pub struct Downloader {
    client: reqwest::Client,
    resource: String,
    body_url: String,
    sidecar_url: String,
    staging_path: PathBuf,
    partial_path: PathBuf,
    local_digest: Option<String>,
    force: bool,
    max_retries: u32,
}

impl Downloader {
    /// `local_digest` is the digest of the current cache slot, `None` when
    /// nothing is installed yet.
    pub fn new(
        client: reqwest::Client,
        resource: &UpdatableResource,
        local_digest: Option<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            client,
            resource: resource.id().to_owned(),
            body_url: resource.body_url().to_owned(),
            sidecar_url: resource.sidecar_url().to_owned(),
            staging_path: resource.staging_path().to_path_buf(),
            partial_path: resource.partial_path(),
            local_digest,
            force: false,
            max_retries,
        }
    }

    /// Skip the digest comparison and always fetch
    #[must_use]
    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub async fn run(self, controller: &UpdateController) -> DownloadReport {
        let guard = SignalGuard(controller);
        let mut transitions = Vec::new();
        let mut attempts = 0;

        let outcome = self
            .drive(controller, &mut transitions, &mut attempts)
            .await;

        // Decision first, completion second.
        controller.mark_update_found(false);
        controller.mark_downloaded(outcome.clone());
        drop(guard);

        DownloadReport {
            outcome,
            attempts,
            transitions,
        }
    }

    async fn drive(
        &self,
        controller: &UpdateController,
        transitions: &mut Vec<DownloadState>,
        attempts: &mut u32,
    ) -> DownloadOutcome {
        let compare_with = if self.force {
            None
        } else {
            self.local_digest.as_deref()
        };
        let mut remote = RemoteDigest::Unknown;

        for attempt in 1..=self.max_retries {
            *attempts = attempt;
            transitions.push(DownloadState::CheckingRemote);

            // A known digest stays valid for the whole session; the sentinel
            // is asked again on every iteration.
            if !remote.is_known() {
                match remote_check::check(&self.client, &self.sidecar_url).await {
                    Ok(digest) => remote = digest,
                    Err(e) => {
                        tracing::warn!("Remote file not found. ({}: {e})", self.resource);
                        transitions.push(DownloadState::Failed);
                        return DownloadOutcome::Failed {
                            reason: e.to_string(),
                        };
                    }
                }
            }

            if let Some(local) = compare_with {
                if remote.matches(local) {
                    tracing::info!("No update found.");
                    controller.mark_update_found(false);
                    transitions.push(DownloadState::NoUpdate);
                    transitions.push(DownloadState::Done);
                    return DownloadOutcome::NotNeeded;
                }
                transitions.push(DownloadState::UpdateFound);
            }
            controller.mark_update_found(true);

            transitions.push(DownloadState::Fetching { attempt });
            match self.fetch(attempt, &remote).await {
                Ok((digest, bytes)) => {
                    transitions.push(DownloadState::Verified);
                    transitions.push(DownloadState::Done);
                    return DownloadOutcome::Verified {
                        path: self.staging_path.clone(),
                        digest,
                        bytes,
                    };
                }
                Err(e) => {
                    transitions.push(DownloadState::Mismatch);
                    match &e {
                        FetchError::Mismatch { .. } => {
                            tracing::warn!("After downloading, the digest didn't match. Retrying");
                            tracing::debug!("{e}");
                        }
                        FetchError::Transport(_) | FetchError::Io(_) => {
                            tracing::warn!("Exception: {e}");
                            suggest_help(&e);
                        }
                    }
                    self.discard_partial().await;
                }
            }
        }

        tracing::error!(
            "Unable to download remote file. Check your internet connection/proxy settings."
        );
        transitions.push(DownloadState::Failed);
        DownloadOutcome::Failed {
            reason: format!(
                "{} not downloaded after {} attempts",
                self.resource, self.max_retries
            ),
        }
    }

    /// Stream the body to the partial file, verify it and move it to staging
    async fn fetch(&self, attempt: u32, expected: &RemoteDigest) -> Result<(String, u64), FetchError> {
        if attempt > 1 {
            tracing::info!(
                "Downloading: {} (try {attempt}/{})",
                self.body_url,
                self.max_retries
            );
        } else {
            tracing::info!("Downloading: {}", self.body_url);
        }

        let start = Instant::now();
        let response = self
            .client
            .get(&self.body_url)
            .send()
            .await?
            .error_for_status()?;
        tracing::info!("Got reply in: {}ms", start.elapsed().as_millis());

        let started = Instant::now();
        let mut file = tokio::fs::File::create(&self.partial_path).await?;
        let mut digest = StreamingDigest::new();
        let mut bytes = 0u64;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            digest.update(&chunk);
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        log_throughput(bytes, started.elapsed().as_secs_f64());

        let actual = digest.finish();
        if !expected.verifies(&actual) {
            return Err(FetchError::Mismatch {
                expected: expected.to_string(),
                actual,
            });
        }

        tokio::fs::rename(&self.partial_path, &self.staging_path).await?;
        Ok((actual, bytes))
    }

    async fn discard_partial(&self) {
        match tokio::fs::remove_file(&self.partial_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove {}: {e}",
                self.partial_path.display()
            ),
        }
    }
}

/// Resolves both signals if the worker stops without reaching the end of `run`
struct SignalGuard<'a>(&'a UpdateController);

impl Drop for SignalGuard<'_> {
    fn drop(&mut self) {
        self.0.mark_update_found(false);
        self.0.mark_downloaded(DownloadOutcome::Failed {
            reason: "download worker stopped".to_owned(),
        });
    }
}

#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn log_throughput(bytes: u64, elapsed_secs: f64) {
    let kb = bytes as f64 / 1024.0;
    let secs = elapsed_secs.max(1e-9);
    tracing::info!(
        "Downloaded {kb:.1}kb in {}s at {:.1}kb/s",
        secs as u64,
        kb / secs
    );
}

/// Known root causes worth pointing the operator at
pub fn help_hint(err: &(dyn std::error::Error + 'static)) -> Option<&'static str> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>()
            && matches!(
                io.kind(),
                std::io::ErrorKind::AddrInUse | std::io::ErrorKind::AddrNotAvailable
            )
        {
            return Some(
                "Recognized exception: the likely cause is a broken ipv4/6 stack. Check your TCP/IP settings.",
            );
        }
        if e.to_string().to_ascii_lowercase().contains("certificate") {
            return Some(
                "Recognized exception: the likely cause is a set of broken/missing root certificates. Check your system certificate store.",
            );
        }
        current = e.source();
    }
    None
}

fn suggest_help(err: &FetchError) {
    let hint = match err {
        FetchError::Transport(e) => help_hint(e),
        FetchError::Io(e) => help_hint(e),
        FetchError::Mismatch { .. } => None,
    };
    if let Some(hint) = hint {
        tracing::warn!("{hint}");
    }
}
