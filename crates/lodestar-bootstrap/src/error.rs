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

//! Error types for the bootstrap crate
//!
//! Everything in [`BootstrapError`] aborts the run. Transient download
//! failures never show up here: the downloader retries them internally and
//! reports exhaustion as a `DownloadOutcome::Failed` payload.

use crate::fs_util::RemoveTreeError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid working directory {}: {reason}", path.display())]
    WorkDir { path: PathBuf, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("while replacing {}: target is not a file and could not be removed: {source}", slot.display())]
    Obstructed {
        slot: PathBuf,
        #[source]
        source: RemoveTreeError,
    },

    #[error("unable to replace {}: target not writable", slot.display())]
    DestinationLocked { slot: PathBuf },

    #[error("unable to copy {} to {}: {source}", staged.display(), slot.display())]
    CopyFailed {
        staged: PathBuf,
        slot: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to download {resource} while being forced: {reason}")]
    ForcedDownload { resource: String, reason: String },

    #[error("{resource} has no committed file at {}", slot.display())]
    MissingSlot { resource: String, slot: PathBuf },

    #[error("unable to {stage} {}: {reason}", path.display())]
    Decode {
        stage: DecodeStage,
        path: PathBuf,
        reason: String,
    },

    #[error("unable to start: {0}")]
    Launch(String),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Which half of the primary executable's decode chain failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    Envelope,
    Container,
    Bundle,
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Envelope => f.write_str("strip compression from"),
            Self::Container => f.write_str("unpack container"),
            Self::Bundle => f.write_str("expand bundle"),
        }
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
