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

//! Turn a committed cache slot into its usable form
//!
//! The primary executable goes through two decode stages:
//!
//! 1. the compression envelope is stripped into an intermediate file,
//! 2. the container in that file is rewritten as the final archive.
//!
//! Bundles are zip files expanded into a directory.

pub mod bundle;
pub mod container;
pub mod envelope;

pub use bundle::{BundleReport, expand_bundle};
pub use container::{ContainerUnpacker, TarToZip};
pub use envelope::Envelope;

use crate::error::{BootstrapError, DecodeStage, Result};
use crate::fs_util::{remove_tree, with_suffix};
use crate::resource::{ArchiveKind, UpdatableResource};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallReport {
    Primary { artifact: PathBuf, entries: usize },
    Bundle {
        directory: PathBuf,
        report: BundleReport,
    },
}

#[derive(Debug, Clone)]
pub struct InstallPipeline {
    unpacker: Arc<dyn ContainerUnpacker>,
}

impl InstallPipeline {
    pub fn new() -> Self {
        Self::with_unpacker(Arc::new(TarToZip))
    }

    pub fn with_unpacker(unpacker: Arc<dyn ContainerUnpacker>) -> Self {
        Self { unpacker }
    }

    pub fn install(&self, resource: &UpdatableResource) -> Result<InstallReport> {
        match resource.kind() {
            ArchiveKind::PrimaryExecutable => {
                self.install_primary(resource.slot_path(), resource.unpack_path())
            }
            ArchiveKind::FlatBundle => {
                Self::install_bundle(resource.slot_path(), resource.unpack_path())
            }
        }
    }

    pub fn install_primary(&self, slot: &Path, artifact: &Path) -> Result<InstallReport> {
        let decode_error = |stage, path: &Path, reason: String| BootstrapError::Decode {
            stage,
            path: path.to_path_buf(),
            reason,
        };

        let envelope = Envelope::from_path(slot).ok_or_else(|| {
            decode_error(
                DecodeStage::Envelope,
                slot,
                "unrecognised compression".to_owned(),
            )
        })?;
        let intermediate = Envelope::intermediate_path(slot);
        if intermediate == artifact {
            return Err(decode_error(
                DecodeStage::Envelope,
                slot,
                format!("decodes onto the unpack destination {}", artifact.display()),
            ));
        }

        tracing::info!("Unpacking {}", slot.display());
        let size = envelope
            .decode(slot, &intermediate)
            .map_err(|e| decode_error(DecodeStage::Envelope, slot, e.to_string()))?;
        tracing::debug!("{envelope:?} envelope decoded to {size} bytes");

        // Built aside and renamed, so a failed run keeps the last good archive.
        let pending = with_suffix(artifact, ".part");
        let entries = self
            .unpacker
            .unpack(&intermediate, &pending)
            .map_err(|e| decode_error(DecodeStage::Container, &intermediate, e.to_string()))?;

        if fs::symlink_metadata(artifact).is_ok_and(|m| m.is_dir()) {
            remove_tree(artifact)
                .map_err(|e| decode_error(DecodeStage::Container, artifact, e.to_string()))?;
        }
        fs::rename(&pending, artifact)?;

        if let Err(e) = fs::remove_file(&intermediate) {
            tracing::warn!("Unable to remove {}: {e}", intermediate.display());
        }

        tracing::info!("Unpacked {} ({entries} entries)", artifact.display());
        Ok(InstallReport::Primary {
            artifact: artifact.to_path_buf(),
            entries,
        })
    }

    pub fn install_bundle(slot: &Path, directory: &Path) -> Result<InstallReport> {
        tracing::info!("Extracting {} to {}", slot.display(), directory.display());
        let report = expand_bundle(slot, directory).map_err(|e| BootstrapError::Decode {
            stage: DecodeStage::Bundle,
            path: slot.to_path_buf(),
            reason: e.to_string(),
        })?;

        if report.failed > 0 {
            tracing::warn!(
                "{} of {} entries in {} could not be extracted",
                report.failed,
                report.failed + report.files + report.directories,
                slot.display()
            );
        }

        Ok(InstallReport::Bundle {
            directory: directory.to_path_buf(),
            report,
        })
    }
}

impl Default for InstallPipeline {
    fn default() -> Self {
        Self::new()
    }
}
