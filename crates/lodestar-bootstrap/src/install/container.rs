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

//! Inner container of the primary executable
//!
//! The shipped container is a tar stream, rewritten here as a zip archive
//! the launcher can open directly. Output is deterministic: same input,
//! same bytes.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Component, Path};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Turns the decoded container into the final archive
pub trait ContainerUnpacker: fmt::Debug + Send + Sync {
    /// Write the archive for `container` to `output`. Returns the entry count.
    fn unpack(&self, container: &Path, output: &Path) -> io::Result<usize>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TarToZip;

impl ContainerUnpacker for TarToZip {
    fn unpack(&self, container: &Path, output: &Path) -> io::Result<usize> {
        let result = convert(container, output);
        if result.is_err() {
            let _ = std::fs::remove_file(output);
        }
        result
    }
}

fn convert(container: &Path, output: &Path) -> io::Result<usize> {
    let mut archive = tar::Archive::new(BufReader::new(File::open(container)?));
    let mut zip = ZipWriter::new(BufWriter::new(File::create(output)?));
    let mut entries = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let name = entry_name(&path)?;
        let kind = entry.header().entry_type();
        let mode = entry.header().mode().unwrap_or(0o644) & 0o7777;

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(mode);

        if kind.is_dir() {
            zip.add_directory(name, options)?;
        } else if kind.is_file() {
            zip.start_file(name, options)?;
            io::copy(&mut entry, &mut zip)?;
        } else {
            tracing::debug!("Skipping {} ({kind:?})", path.display());
            continue;
        }
        entries += 1;
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(entries)
}

/// Forward-slash archive name; anything leaving the archive root is rejected
fn entry_name(path: &Path) -> io::Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("non UTF-8 entry name: {}", path.display()),
                )
            })?),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("entry escapes the container: {}", path.display()),
                ));
            }
        }
    }

    if parts.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "empty entry name",
        ));
    }
    Ok(parts.join("/"))
}
