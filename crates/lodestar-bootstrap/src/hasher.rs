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

//! Content digests of cached and downloaded files
//!
//! The download server publishes MD5 sidecars, so that is what we compute:
//! 32 lowercase hex characters.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read buffer size; only affects throughput
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Length of a rendered digest
pub const DIGEST_HEX_LEN: usize = 32;

/// Incremental digest fed while a body streams to disk
pub struct StreamingDigest {
    context: md5::Context,
}

impl std::fmt::Debug for StreamingDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingDigest").finish_non_exhaustive()
    }
}

impl StreamingDigest {
    pub fn new() -> Self {
        Self {
            context: md5::Context::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.context.consume(data);
    }

    pub fn finish(self) -> String {
        format!("{:x}", self.context.compute())
    }
}

/// Digest of the file at `path`, or `None` when it is missing or unreadable.
///
/// `None` is not an error: callers treat it as "nothing installed yet".
pub fn file_digest(path: &Path) -> Option<String> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!("No digest for {}: {e}", path.display());
            return None;
        }
    };

    let mut digest = StreamingDigest::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => digest.update(&buffer[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::warn!("Failed to read {} for digest: {e}", path.display());
                return None;
            }
        }
    }

    Some(digest.finish())
}

/// True when `value` looks like a rendered digest
pub fn is_digest(value: &str) -> bool {
    value.len() == DIGEST_HEX_LEN && value.chars().all(|c| c.is_ascii_hexdigit())
}
