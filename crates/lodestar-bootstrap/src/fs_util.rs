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

//! Filesystem helpers shared by the commit and install steps

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Every node a recursive removal could not delete
#[derive(Debug, Error)]
#[error("failed to remove {} path(s) under {}", .failures.len(), .root.display())]
pub struct RemoveTreeError {
    pub root: PathBuf,
    pub failures: Vec<(PathBuf, io::Error)>,
}

/// Remove `path` and everything below it.
///
/// Unlike `fs::remove_dir_all` this keeps going after a failed node and
/// reports every failure at the end. A missing `path` is not an error.
pub fn remove_tree(path: &Path) -> Result<(), RemoveTreeError> {
    let mut failures = Vec::new();
    remove_node(path, &mut failures);

    if failures.is_empty() {
        Ok(())
    } else {
        for (node, err) in &failures {
            tracing::debug!("Could not remove {}: {err}", node.display());
        }
        Err(RemoveTreeError {
            root: path.to_path_buf(),
            failures,
        })
    }
}

fn remove_node(path: &Path, failures: &mut Vec<(PathBuf, io::Error)>) {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => {
            failures.push((path.to_path_buf(), e));
            return;
        }
    };

    if !metadata.is_dir() {
        if let Err(e) = fs::remove_file(path) {
            failures.push((path.to_path_buf(), e));
        }
        return;
    }

    match fs::read_dir(path) {
        Ok(entries) => {
            for entry in entries {
                match entry {
                    Ok(entry) => remove_node(&entry.path(), failures),
                    Err(e) => failures.push((path.to_path_buf(), e)),
                }
            }
        }
        Err(e) => failures.push((path.to_path_buf(), e)),
    }

    if let Err(e) = fs::remove_dir(path) {
        failures.push((path.to_path_buf(), e));
    }
}

/// `launcher.pack.lzma` + `.new` -> `launcher.pack.lzma.new`
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
