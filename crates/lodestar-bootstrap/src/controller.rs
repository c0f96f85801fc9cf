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

//! One-shot signals between a background download and the waiting caller
//!
//! A controller carries exactly two facts for one check/download cycle:
//! whether an update was found, and how the download ended. Each can be set
//! once; later writes are ignored and every wait, earlier or later, sees the
//! first value. Use a fresh controller per cycle.

use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;

/// How a download cycle ended. Always delivered, so waiters never hang.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Cached copy is current; nothing was staged
    NotNeeded,
    /// A verified body sits at `path`
    Verified {
        path: PathBuf,
        digest: String,
        bytes: u64,
    },
    /// Gave up; whatever is cached stays in use
    Failed { reason: String },
}

#[derive(Debug)]
pub struct UpdateController {
    found: watch::Sender<Option<bool>>,
    downloaded: watch::Sender<Option<DownloadOutcome>>,
}

impl UpdateController {
    pub fn new() -> Self {
        let (found, _) = watch::channel(None);
        let (downloaded, _) = watch::channel(None);
        Self { found, downloaded }
    }

    /// Record the found/not-found decision. Returns false if already decided.
    pub fn mark_update_found(&self, found: bool) -> bool {
        self.found.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(found);
            true
        })
    }

    /// Record the end of the download. Returns false if already recorded.
    pub fn mark_downloaded(&self, outcome: DownloadOutcome) -> bool {
        self.downloaded.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }

    pub fn update_found(&self) -> Option<bool> {
        *self.found.borrow()
    }

    pub fn download_outcome(&self) -> Option<DownloadOutcome> {
        self.downloaded.borrow().clone()
    }

    /// Wait up to `timeout` for the found/not-found decision.
    ///
    /// `None` means no decision arrived in time.
    pub async fn wait_update_found(&self, timeout: Duration) -> Option<bool> {
        let mut rx = self.found.subscribe();
        let wait = async {
            match rx.wait_for(Option::is_some).await {
                Ok(value) => *value,
                Err(_) => None,
            }
        };
        tokio::time::timeout(timeout, wait).await.ok().flatten()
    }

    /// Wait for the download to end. No timeout: the downloader always
    /// resolves this before it finishes.
    pub async fn wait_downloaded(&self) -> DownloadOutcome {
        let mut rx = self.downloaded.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(value) => value.clone().unwrap_or_else(closed_outcome),
            // The sender lives in `self`, so the channel cannot close under us.
            Err(_) => closed_outcome(),
        }
    }
}

fn closed_outcome() -> DownloadOutcome {
    DownloadOutcome::Failed {
        reason: "download signal closed".to_owned(),
    }
}

impl Default for UpdateController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_signals_are_one_shot() {
        let controller = UpdateController::new();
        assert!(controller.update_found().is_none());

        assert!(controller.mark_update_found(true));
        assert!(!controller.mark_update_found(false));
        assert_eq!(controller.update_found(), Some(true));

        assert!(controller.mark_downloaded(DownloadOutcome::NotNeeded));
        assert!(!controller.mark_downloaded(DownloadOutcome::Failed {
            reason: "late".to_owned()
        }));
        assert_eq!(
            controller.download_outcome(),
            Some(DownloadOutcome::NotNeeded)
        );
    }

    #[tokio::test]
    async fn test_wait_after_decision_returns_immediately() {
        let controller = UpdateController::new();
        controller.mark_update_found(false);

        let found = controller.wait_update_found(Duration::from_millis(1)).await;
        assert_eq!(found, Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_without_decision() {
        let controller = UpdateController::new();
        let found = controller.wait_update_found(Duration::from_secs(3)).await;
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_wait_wakes_on_later_decision() {
        let controller = Arc::new(UpdateController::new());
        let writer = Arc::clone(&controller);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.mark_update_found(true);
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.mark_downloaded(DownloadOutcome::Failed {
                reason: "retries exhausted".to_owned(),
            });
        });

        assert_eq!(
            controller.wait_update_found(Duration::from_secs(5)).await,
            Some(true)
        );
        assert!(matches!(
            controller.wait_downloaded().await,
            DownloadOutcome::Failed { .. }
        ));
        handle.await.unwrap();
    }
}
