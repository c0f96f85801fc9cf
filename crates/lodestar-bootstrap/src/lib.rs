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

//! Lodestar bootstrap - keeps the launcher and its bundles up to date
//!
//! For every configured resource the bootstrap checks the download server,
//! fetches and verifies a newer copy when there is one, commits it into the
//! local cache and unpacks it. Control then passes to the launcher through
//! a [`handoff::LaunchHandoff`].

pub mod bootstrap;
pub mod config;
pub mod controller;
pub mod downloader;
pub mod error;
pub mod events;
pub mod fs_util;
pub mod handoff;
pub mod hasher;
pub mod http;
pub mod install;
pub mod remote_check;
pub mod replace;
pub mod resource;
pub mod transcript;

pub use bootstrap::{Bootstrap, InstallSummary, SyncOutcome};
pub use config::{BootstrapConfig, ResourceSpec};
pub use controller::{DownloadOutcome, UpdateController};
pub use error::{BootstrapError, Result};
pub use handoff::{CommandLauncher, LaunchContext, LaunchHandoff};
pub use resource::{ArchiveKind, UpdatableResource};
pub use transcript::Transcript;
