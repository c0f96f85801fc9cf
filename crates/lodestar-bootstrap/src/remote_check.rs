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

//! Digest sidecar lookup
//!
//! Every body URL has a `<url>.hash` companion holding one line: the
//! expected digest, or `-` when the server does not know it.

use crate::hasher::is_digest;
use thiserror::Error;

/// Sidecar value meaning "digest unknown on server"
pub const UNKNOWN_SENTINEL: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteDigest {
    Known(String),
    Unknown,
}

impl RemoteDigest {
    /// Whether the remote copy is the one already cached.
    ///
    /// An unknown remote digest never matches, which forces a fetch.
    pub fn matches(&self, local: &str) -> bool {
        match self {
            Self::Known(remote) => remote.eq_ignore_ascii_case(local),
            Self::Unknown => false,
        }
    }

    /// Whether a freshly computed digest passes the integrity check.
    ///
    /// The check is skipped when the server never told us what to expect.
    pub fn verifies(&self, computed: &str) -> bool {
        match self {
            Self::Known(remote) => remote.eq_ignore_ascii_case(computed),
            Self::Unknown => true,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

impl std::fmt::Display for RemoteDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Known(digest) => f.write_str(digest),
            Self::Unknown => f.write_str(UNKNOWN_SENTINEL),
        }
    }
}

#[derive(Debug, Error)]
pub enum RemoteCheckError {
    #[error("sidecar unreachable: {0}")]
    Unreachable(String),

    #[error("sidecar is malformed: {0:?}")]
    Malformed(String),
}

/// Parse the first line of a sidecar body
pub fn parse_sidecar(body: &str) -> Result<RemoteDigest, RemoteCheckError> {
    let line = body.lines().next().unwrap_or_default().trim();

    if line == UNKNOWN_SENTINEL {
        return Ok(RemoteDigest::Unknown);
    }
    if is_digest(line) {
        return Ok(RemoteDigest::Known(line.to_ascii_lowercase()));
    }

    Err(RemoteCheckError::Malformed(line.to_owned()))
}

/// Fetch and parse the sidecar at `sidecar_url`.
///
/// Not retried here; a failed lookup ends the current check.
pub async fn check(
    client: &reqwest::Client,
    sidecar_url: &str,
) -> Result<RemoteDigest, RemoteCheckError> {
    let response = client
        .get(sidecar_url)
        .send()
        .await
        .map_err(|e| RemoteCheckError::Unreachable(format!("Request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(RemoteCheckError::Unreachable(format!(
            "Server returned status: {}",
            response.status()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| RemoteCheckError::Unreachable(format!("Failed to read response: {e}")))?;

    parse_sidecar(&body)
}
