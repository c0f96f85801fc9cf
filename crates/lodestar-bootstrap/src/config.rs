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

//! Configuration module for the bootstrap

use crate::error::{BootstrapError, Result};
use crate::fs_util::with_suffix;
use crate::install::Envelope;
use crate::resource::{ArchiveKind, UpdatableResource};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the config inside the working directory
pub const CONFIG_FILE_NAME: &str = "bootstrap.toml";

const APPLICATION_DIR: &str = "Lodestar";

fn default_base_url() -> String {
    "https://downloads.lodestar.example/bootstrap".to_owned()
}

fn default_3() -> u64 {
    3
}

fn default_10_retries() -> u32 {
    10
}

fn default_30() -> u64 {
    30
}

fn default_10() -> u64 {
    10
}

fn default_resources() -> Vec<ResourceSpec> {
    vec![ResourceSpec {
        name: "launcher".to_owned(),
        url: None,
        file_name: Some("launcher.pack.lzma".to_owned()),
        kind: ArchiveKind::PrimaryExecutable,
        unpack_to: Some("launcher.jar".to_owned()),
    }]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Base URL that resource file names are resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// How long to wait for the "update found" decision before moving on (seconds)
    #[serde(default = "default_3")]
    pub update_wait_secs: u64,

    /// Upper bound on full check/fetch iterations per resource
    #[serde(default = "default_10_retries")]
    pub max_retries: u32,

    #[serde(default = "default_30")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_10")]
    pub read_timeout_secs: u64,

    /// Managed resources, processed in order
    #[serde(default = "default_resources")]
    pub resources: Vec<ResourceSpec>,

    #[serde(default)]
    pub launch: LaunchConfig,
}

/// One `[[resources]]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceSpec {
    pub name: String,

    /// Full body URL; defaults to `<base_url>/<file_name>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Cache slot file name; defaults to the last URL segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    pub kind: ArchiveKind,

    /// Unpack destination relative to the working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpack_to: Option<String>,
}

/// How the launcher is started once everything is in place
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchConfig {
    #[serde(default = "default_program")]
    pub program: String,

    /// `{artifact}`, `{work_dir}` and `{version}` are substituted
    #[serde(default = "default_launch_args")]
    pub args: Vec<String>,
}

fn default_program() -> String {
    "java".to_owned()
}

fn default_launch_args() -> Vec<String> {
    vec!["-jar".to_owned(), "{artifact}".to_owned()]
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_launch_args(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            update_wait_secs: 3,
            max_retries: 10,
            connect_timeout_secs: 30,
            read_timeout_secs: 10,
            resources: default_resources(),
            launch: LaunchConfig::default(),
        }
    }
}

impl BootstrapConfig {
    pub fn update_wait(&self) -> Duration {
        Duration::from_secs(self.update_wait_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.resources.is_empty() {
            return Err(BootstrapError::Config(
                "at least one resource must be configured".to_owned(),
            ));
        }
        if self.max_retries == 0 {
            return Err(BootstrapError::Config(
                "max_retries must be at least 1".to_owned(),
            ));
        }

        let primaries = self
            .resources
            .iter()
            .filter(|r| r.kind == ArchiveKind::PrimaryExecutable)
            .count();
        if primaries > 1 {
            return Err(BootstrapError::Config(format!(
                "only one primary_executable resource is allowed, found {primaries}"
            )));
        }

        let mut names = HashSet::new();
        for resource in &self.resources {
            if resource.name.is_empty()
                || resource.name.contains(['/', '\\'])
                || resource.name.starts_with('.')
            {
                return Err(BootstrapError::Config(format!(
                    "invalid resource name: {:?}",
                    resource.name
                )));
            }
            if !names.insert(resource.name.as_str()) {
                return Err(BootstrapError::Config(format!(
                    "duplicate resource name: {}",
                    resource.name
                )));
            }
        }

        Ok(())
    }

    /// Resolve every resource spec to concrete URLs and paths under `work_dir`
    pub fn resolve_resources(&self, work_dir: &Path) -> Result<Vec<UpdatableResource>> {
        let resources = self
            .resources
            .iter()
            .map(|spec| UpdatableResource::from_spec(spec, &self.base_url, work_dir))
            .collect::<Result<Vec<_>>>()?;

        // Every file a resource writes belongs to that resource alone.
        let mut paths = HashSet::new();
        for resource in &resources {
            for path in written_paths(resource) {
                if !paths.insert(path.clone()) {
                    return Err(BootstrapError::Config(format!(
                        "{} reuses path {}",
                        resource.id(),
                        path.display()
                    )));
                }
            }
        }

        Ok(resources)
    }
}

fn written_paths(resource: &UpdatableResource) -> Vec<PathBuf> {
    let mut paths = vec![
        resource.slot_path().to_path_buf(),
        resource.staging_path().to_path_buf(),
        resource.unpack_path().to_path_buf(),
        with_suffix(resource.unpack_path(), ".part"),
    ];
    if resource.kind() == ArchiveKind::PrimaryExecutable {
        paths.push(Envelope::intermediate_path(resource.slot_path()));
    }
    paths
}

/// Platform default for the working directory
pub fn default_work_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

    if cfg!(target_os = "windows") {
        dirs::config_dir()
            .unwrap_or(home)
            .join(APPLICATION_DIR)
    } else if cfg!(target_os = "macos") {
        home.join("Library/Application Support").join(APPLICATION_DIR)
    } else {
        home.join(APPLICATION_DIR)
    }
}

/// Load the config at `path`, falling back to defaults when it does not exist
pub fn load_config(path: &Path) -> Result<BootstrapConfig> {
    if !path.exists() {
        tracing::info!("No config at {}, using defaults", path.display());
        return Ok(BootstrapConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: BootstrapConfig = toml::from_str(&content)
        .map_err(|e| BootstrapError::Config(format!("Failed to parse config: {e}")))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = BootstrapConfig::default();
        assert_eq!(config.update_wait_secs, 3);
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.read_timeout_secs, 10);
        assert_eq!(config.resources.len(), 1);
        assert_eq!(config.resources[0].kind, ArchiveKind::PrimaryExecutable);
        assert_eq!(config.launch.program, "java");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_with_bundles() {
        let content = r#"
            base_url = "https://cdn.test/files"
            update_wait_secs = 5

            [[resources]]
            name = "launcher"
            file_name = "launcher.pack.gz"
            kind = "primary_executable"

            [[resources]]
            name = "assets"
            url = "https://mirror.test/assets.zip"
            kind = "flat_bundle"

            [launch]
            program = "/usr/bin/java"
            args = ["-Xmx1G", "-jar", "{artifact}"]
        "#;

        let config: BootstrapConfig = toml::from_str(content).unwrap();
        assert_eq!(config.base_url, "https://cdn.test/files");
        assert_eq!(config.update_wait_secs, 5);
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.resources.len(), 2);
        assert_eq!(config.resources[1].kind, ArchiveKind::FlatBundle);
        assert_eq!(config.launch.args.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut config = BootstrapConfig::default();
        config.resources.push(config.resources[0].clone());
        assert!(matches!(
            config.validate(),
            Err(BootstrapError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_retries_and_empty() {
        let config = BootstrapConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BootstrapConfig {
            resources: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_path_like_names() {
        let mut config = BootstrapConfig::default();
        config.resources[0].name = "../escape".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_rejects_shared_slot() {
        let mut config = BootstrapConfig::default();
        config.resources.push(ResourceSpec {
            name: "other".to_owned(),
            url: None,
            file_name: Some("launcher.pack.lzma".to_owned()),
            kind: ArchiveKind::FlatBundle,
            unpack_to: None,
        });
        let temp = TempDir::new().unwrap();
        assert!(config.resolve_resources(temp.path()).is_err());
    }

    #[test]
    fn test_resolve_rejects_intermediate_on_unpack_path() {
        let mut config = BootstrapConfig::default();
        config.resources[0].file_name = Some("launcher.jar.gz".to_owned());
        config.resources[0].unpack_to = Some("launcher.jar".to_owned());
        let temp = TempDir::new().unwrap();

        let err = config.resolve_resources(temp.path()).unwrap_err();
        assert!(err.to_string().contains("launcher.jar"));
    }

    #[test]
    fn test_resolve_default_layout() {
        let temp = TempDir::new().unwrap();
        let resources = BootstrapConfig::default()
            .resolve_resources(temp.path())
            .unwrap();
        assert_eq!(resources.len(), 1);
    }

    #[test]
    fn test_load_config_missing_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_config(&temp.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config.max_retries, 10);
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "resources = 12").unwrap();
        assert!(matches!(load_config(&path), Err(BootstrapError::Config(_))));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = BootstrapConfig {
            update_wait_secs: 7,
            max_retries: 4,
            ..Default::default()
        };

        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.update_wait_secs, 7);
        assert_eq!(loaded.max_retries, 4);
        assert_eq!(loaded.resources, config.resources);
        assert_eq!(loaded.launch, config.launch);
    }

    #[test]
    fn test_default_work_dir_ends_with_application_dir() {
        assert!(default_work_dir().ends_with(APPLICATION_DIR));
    }
}
