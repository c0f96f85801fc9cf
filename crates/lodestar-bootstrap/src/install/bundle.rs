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

//! Best-effort zip expansion for bundle resources

use crate::fs_util::{remove_tree, with_suffix};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BundleReport {
    pub files: usize,
    pub directories: usize,
    pub failed: usize,
}

enum Extracted {
    File,
    Directory,
}

/// Expand `archive` into `destination`.
///
/// Only an unreadable archive is an error. A failing entry is logged,
/// counted in `failed` and the rest are still extracted. The tree is built
/// in a sibling directory and swapped in, so files dropped from the bundle
/// do not survive in `destination`.
pub fn expand_bundle(archive: &Path, destination: &Path) -> io::Result<BundleReport> {
    let mut zip = ZipArchive::new(BufReader::new(File::open(archive)?))?;

    let fresh = with_suffix(destination, ".part");
    remove_tree(&fresh).map_err(io::Error::other)?;
    fs::create_dir_all(&fresh)?;

    let mut report = BundleReport::default();
    for index in 0..zip.len() {
        match extract_entry(&mut zip, index, &fresh) {
            Ok(Extracted::File) => report.files += 1,
            Ok(Extracted::Directory) => report.directories += 1,
            Err(e) => {
                tracing::warn!(
                    "Failed to extract entry {index} of {}: {e}",
                    archive.display()
                );
                report.failed += 1;
            }
        }
    }

    remove_tree(destination).map_err(io::Error::other)?;
    fs::rename(&fresh, destination)?;

    Ok(report)
}

fn extract_entry(
    zip: &mut ZipArchive<BufReader<File>>,
    index: usize,
    destination: &Path,
) -> io::Result<Extracted> {
    let mut entry = zip.by_index(index)?;
    let Some(relative) = entry.enclosed_name() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} escapes the bundle directory", entry.name()),
        ));
    };
    let out_path = destination.join(relative);

    let extracted = if entry.name().ends_with(['/', '\\']) {
        fs::create_dir_all(&out_path)?;
        Extracted::Directory
    } else {
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&out_path)?;
        io::copy(&mut entry, &mut out_file)?;
        Extracted::File
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = entry.unix_mode() {
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))?;
        }
    }

    Ok(extracted)
}
