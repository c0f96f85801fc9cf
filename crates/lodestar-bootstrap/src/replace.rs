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

//! Commit a staged download into its cache slot
//!
//! A rename is tried first. When it is refused (typically across volumes)
//! the staged file is copied next to the slot and that copy is renamed over
//! it, so readers of the slot see either the old or the new file, whole.

use crate::error::{BootstrapError, Result};
use crate::fs_util::{remove_tree, with_suffix};
use std::fs;
use std::io;
use std::path::Path;

const COPY_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Staged file renamed onto the slot
    Renamed,
    /// Slot replaced through a copy; the staged file may have been left behind
    Copied { staging_removed: bool },
    /// No staged file to commit
    NothingStaged,
    /// Staged file disappeared while committing
    Vanished,
}

impl CommitOutcome {
    pub fn replaced(self) -> bool {
        matches!(self, Self::Renamed | Self::Copied { .. })
    }
}

/// The file operations a commit performs
pub trait FileOps {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileOps;

impl FileOps for StdFileOps {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        fs::copy(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

pub fn commit(staged: &Path, slot: &Path) -> Result<CommitOutcome> {
    commit_with(&StdFileOps, staged, slot)
}

pub fn commit_with(ops: &impl FileOps, staged: &Path, slot: &Path) -> Result<CommitOutcome> {
    if let Ok(metadata) = fs::symlink_metadata(slot)
        && !metadata.is_file()
    {
        tracing::warn!("{} is not a file, removing it", slot.display());
        remove_tree(slot).map_err(|source| BootstrapError::Obstructed {
            slot: slot.to_path_buf(),
            source,
        })?;
    }

    if !staged.is_file() {
        return Ok(CommitOutcome::NothingStaged);
    }

    match ops.rename(staged, slot) {
        Ok(()) => {
            tracing::debug!("Moved {} to {}", staged.display(), slot.display());
            return Ok(CommitOutcome::Renamed);
        }
        Err(e) => {
            tracing::debug!(
                "Rename of {} failed ({e}), falling back to copy",
                staged.display()
            );
        }
    }

    if !staged.exists() {
        tracing::warn!("Nevermind... file vanished?");
        return Ok(CommitOutcome::Vanished);
    }

    if is_locked(slot) {
        return Err(BootstrapError::DestinationLocked {
            slot: slot.to_path_buf(),
        });
    }

    let copy_path = with_suffix(slot, COPY_SUFFIX);
    let copied = ops
        .copy(staged, &copy_path)
        .and_then(|_| ops.rename(&copy_path, slot));
    if let Err(source) = copied {
        if let Err(e) = ops.remove_file(&copy_path)
            && e.kind() != io::ErrorKind::NotFound
        {
            tracing::warn!("Unable to remove {}: {e}", copy_path.display());
        }
        return Err(BootstrapError::CopyFailed {
            staged: staged.to_path_buf(),
            slot: slot.to_path_buf(),
            source,
        });
    }

    let staging_removed = match ops.remove_file(staged) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Unable to remove {} after copy: {e}", staged.display());
            false
        }
    };

    Ok(CommitOutcome::Copied { staging_removed })
}

fn is_locked(slot: &Path) -> bool {
    fs::metadata(slot).is_ok_and(|m| m.permissions().readonly())
}
