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

//! Fixture builders for the end-to-end scenarios

use lodestar_bootstrap::config::{BootstrapConfig, ResourceSpec};
use lodestar_bootstrap::resource::ArchiveKind;
use std::io::{self, Cursor, Write};
use zip::write::SimpleFileOptions;

/// MD5 hex digest, as published in `.hash` sidecars
pub fn digest(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Tar container with the given files
pub fn launcher_container(files: &[(&str, &[u8])]) -> io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_700_000_000);
        header.set_cksum();
        builder.append_data(&mut header, name, *data)?;
    }
    builder.into_inner()
}

/// `launcher.pack.lzma` body: the tar container inside an LZMA envelope
pub fn packed_launcher(files: &[(&str, &[u8])]) -> io::Result<Vec<u8>> {
    let container = launcher_container(files)?;
    let mut compressed = Vec::new();
    lzma_rs::lzma_compress(&mut Cursor::new(container), &mut compressed)?;
    Ok(compressed)
}

/// Zip bundle with the given files
pub fn bundle_zip(files: &[(&str, &[u8])]) -> io::Result<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        zip.start_file(*name, SimpleFileOptions::default())?;
        zip.write_all(data)?;
    }
    Ok(zip.finish()?.into_inner())
}

pub fn primary_spec() -> ResourceSpec {
    ResourceSpec {
        name: "launcher".to_owned(),
        url: None,
        file_name: Some("launcher.pack.lzma".to_owned()),
        kind: ArchiveKind::PrimaryExecutable,
        unpack_to: Some("launcher.jar".to_owned()),
    }
}

pub fn bundle_spec(name: &str) -> ResourceSpec {
    ResourceSpec {
        name: name.to_owned(),
        url: None,
        file_name: None,
        kind: ArchiveKind::FlatBundle,
        unpack_to: None,
    }
}

/// Config pointed at a mock server, with a short retry bound
pub fn config(base_url: &str, resources: Vec<ResourceSpec>) -> BootstrapConfig {
    BootstrapConfig {
        base_url: base_url.to_owned(),
        max_retries: 3,
        resources,
        ..Default::default()
    }
}
