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

//! Managed resources and their on-disk layout
//!
//! Every resource owns three paths inside the working directory:
//!
//! - the cache slot `<file>` holding the last committed download,
//! - the staging file `<file>.new` holding a verified download not yet committed,
//! - the partial file `<file>.new.part` the body is streamed into.
//!
//! Only the commit step moves anything into the cache slot.

use crate::config::ResourceSpec;
use crate::error::{BootstrapError, Result};
use crate::fs_util::with_suffix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const STAGING_SUFFIX: &str = ".new";
pub const PARTIAL_SUFFIX: &str = ".part";
pub const SIDECAR_SUFFIX: &str = ".hash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveKind {
    /// Compressed container that decodes into the launcher archive
    PrimaryExecutable,
    /// Zip expanded into a directory
    FlatBundle,
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryExecutable => f.write_str("primary executable"),
            Self::FlatBundle => f.write_str("bundle"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatableResource {
    id: String,
    body_url: String,
    sidecar_url: String,
    slot_path: PathBuf,
    staging_path: PathBuf,
    unpack_path: PathBuf,
    kind: ArchiveKind,
}

impl UpdatableResource {
    pub fn new(
        id: impl Into<String>,
        body_url: impl Into<String>,
        slot_path: impl Into<PathBuf>,
        unpack_path: impl Into<PathBuf>,
        kind: ArchiveKind,
    ) -> Self {
        let body_url = body_url.into();
        let slot_path = slot_path.into();
        Self {
            id: id.into(),
            sidecar_url: sidecar_url(&body_url),
            body_url,
            staging_path: with_suffix(&slot_path, STAGING_SUFFIX),
            slot_path,
            unpack_path: unpack_path.into(),
            kind,
        }
    }

    pub fn from_spec(spec: &ResourceSpec, base_url: &str, work_dir: &Path) -> Result<Self> {
        let file_name = match (&spec.file_name, &spec.url) {
            (Some(file_name), _) => file_name.clone(),
            (None, Some(url)) => file_name_from_url(url).ok_or_else(|| {
                BootstrapError::Config(format!("cannot derive a file name from {url}"))
            })?,
            (None, None) => match spec.kind {
                ArchiveKind::PrimaryExecutable => format!("{}.pack.lzma", spec.name),
                ArchiveKind::FlatBundle => format!("{}.zip", spec.name),
            },
        };

        if file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return Err(BootstrapError::Config(format!(
                "invalid file name for {}: {file_name:?}",
                spec.name
            )));
        }

        let body_url = spec.url.clone().unwrap_or_else(|| {
            format!("{}/{file_name}", base_url.trim_end_matches('/'))
        });

        let unpack_name = spec.unpack_to.clone().unwrap_or_else(|| match spec.kind {
            ArchiveKind::PrimaryExecutable => format!("{}.jar", spec.name),
            ArchiveKind::FlatBundle => spec.name.clone(),
        });
        if Path::new(&unpack_name).is_absolute() || unpack_name.contains("..") {
            return Err(BootstrapError::Config(format!(
                "unpack_to for {} must stay inside the working directory",
                spec.name
            )));
        }

        Ok(Self::new(
            spec.name.clone(),
            body_url,
            work_dir.join(file_name),
            work_dir.join(unpack_name),
            spec.kind,
        ))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn body_url(&self) -> &str {
        &self.body_url
    }

    pub fn sidecar_url(&self) -> &str {
        &self.sidecar_url
    }

    pub fn slot_path(&self) -> &Path {
        &self.slot_path
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    pub fn partial_path(&self) -> PathBuf {
        with_suffix(&self.staging_path, PARTIAL_SUFFIX)
    }

    pub fn unpack_path(&self) -> &Path {
        &self.unpack_path
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }
}

/// `<path>.hash`, keeping any query or fragment after it
fn sidecar_url(body_url: &str) -> String {
    let split = body_url.find(['?', '#']).unwrap_or(body_url.len());
    let (path, rest) = body_url.split_at(split);
    format!("{path}{SIDECAR_SUFFIX}{rest}")
}

fn file_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    (!name.is_empty()).then(|| name.to_owned())
}
