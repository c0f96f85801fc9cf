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

//! Structured pipeline events

use crate::install::BundleReport;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub enum PipelineEvent {
    UpdateFound {
        resource: String,
    },
    NoUpdate {
        resource: String,
    },
    DownloadVerified {
        resource: String,
        digest: String,
        bytes: u64,
        attempts: u32,
    },
    DownloadFailed {
        resource: String,
        reason: String,
    },
    Committed {
        resource: String,
        by_copy: bool,
    },
    Installed {
        resource: String,
        entries: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        bundle: Option<BundleReport>,
    },
}

/// Log `event` as one JSON line.
///
/// Never fails the pipeline; a serialisation problem is only logged.
pub fn report_event(event: &PipelineEvent) {
    match serde_json::to_string(event) {
        Ok(json) => tracing::info!("Pipeline event: {json}"),
        Err(e) => tracing::warn!("Failed to serialise pipeline event: {e}"),
    }
}
