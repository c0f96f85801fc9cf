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

//! Shared HTTP client
//!
//! Proxies come from the usual `HTTPS_PROXY` / `ALL_PROXY` environment
//! variables, which reqwest honours by default.

use crate::config::BootstrapConfig;
use crate::error::{BootstrapError, Result};
use reqwest::header::{CACHE_CONTROL, EXPIRES, HeaderMap, HeaderValue, PRAGMA};

pub const USER_AGENT: &str = concat!("lodestar-bootstrap/", env!("CARGO_PKG_VERSION"));

pub fn build_client(config: &BootstrapConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-store,max-age=0,no-cache"),
    );
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .connect_timeout(config.connect_timeout())
        .read_timeout(config.read_timeout())
        .build()
        .map_err(|e| BootstrapError::Config(format!("Failed to build HTTP client: {e}")))
}
