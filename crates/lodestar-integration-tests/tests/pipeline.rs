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

//! End-to-end runs against a mock download server

use lodestar_bootstrap::handoff::{LaunchContext, LaunchHandoff};
use lodestar_bootstrap::replace::CommitOutcome;
use lodestar_bootstrap::{Bootstrap, BootstrapError, SyncOutcome};
use lodestar_integration_tests::{
    bundle_spec, bundle_zip, config, digest, packed_launcher, primary_spec,
};
use mockito::{Mock, Server, ServerGuard};
use std::fs;
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

const MANIFEST: &[u8] = b"Manifest-Version: 1.0\nMain-Class: net.lodestar.Launcher\n";

async fn serve(server: &mut ServerGuard, path: &str, sidecar: &str, body: &[u8]) -> (Mock, Mock) {
    let sidecar = server
        .mock("GET", format!("{path}.hash").as_str())
        .with_body(sidecar)
        .create_async()
        .await;
    let body = server
        .mock("GET", path)
        .with_body(body)
        .create_async()
        .await;
    (sidecar, body)
}

fn read_manifest(jar: &Path) -> String {
    let mut archive = zip::ZipArchive::new(fs::File::open(jar).unwrap()).unwrap();
    let mut manifest = String::new();
    archive
        .by_name("META-INF/MANIFEST.MF")
        .unwrap()
        .read_to_string(&mut manifest)
        .unwrap();
    manifest
}

#[tokio::test]
async fn first_install_downloads_commits_and_unpacks() {
    let launcher = packed_launcher(&[("META-INF/MANIFEST.MF", MANIFEST)]).unwrap();
    let assets = bundle_zip(&[("lang/en.json", b"{}"), ("icons/app.png", b"png")]).unwrap();

    let mut server = Server::new_async().await;
    let (_launcher_sidecar, launcher_body) =
        serve(&mut server, "/launcher.pack.lzma", &digest(&launcher), &launcher).await;
    let (_assets_sidecar, assets_body) = serve(&mut server, "/assets.zip", &digest(&assets), &assets).await;

    let temp = TempDir::new().unwrap();
    let bootstrap = Bootstrap::new(
        config(&server.url(), vec![primary_spec(), bundle_spec("assets")]),
        temp.path(),
    )
    .unwrap();
    let summary = bootstrap.execute(false).await.unwrap();

    let work = temp.path();
    assert_eq!(fs::read(work.join("launcher.pack.lzma")).unwrap(), launcher);
    assert!(!work.join("launcher.pack.lzma.new").exists());
    assert!(!work.join("launcher.pack").exists());
    assert_eq!(
        read_manifest(&work.join("launcher.jar")),
        String::from_utf8_lossy(MANIFEST)
    );
    assert_eq!(fs::read(work.join("assets/icons/app.png")).unwrap(), b"png");

    let primary = summary.resource("launcher").unwrap();
    assert!(matches!(
        primary.sync,
        SyncOutcome::Updated {
            commit: CommitOutcome::Renamed,
            ..
        }
    ));
    assert_eq!(summary.primary_artifact(), Some(work.join("launcher.jar").as_path()));

    launcher_body.assert_async().await;
    assets_body.assert_async().await;
}

#[tokio::test]
async fn matching_digest_skips_the_body() {
    let launcher = packed_launcher(&[("META-INF/MANIFEST.MF", MANIFEST)]).unwrap();

    let mut server = Server::new_async().await;
    let _sidecar = server
        .mock("GET", "/launcher.pack.lzma.hash")
        .with_body(format!("{}\n", digest(&launcher)))
        .create_async()
        .await;
    let body = server
        .mock("GET", "/launcher.pack.lzma")
        .expect(0)
        .create_async()
        .await;

    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("launcher.pack.lzma"), &launcher).unwrap();

    let bootstrap = Bootstrap::new(config(&server.url(), vec![primary_spec()]), temp.path()).unwrap();
    let summary = bootstrap.execute(false).await.unwrap();

    assert_eq!(
        summary.resource("launcher").unwrap().sync,
        SyncOutcome::UpToDate
    );
    assert!(temp.path().join("launcher.jar").is_file());
    body.assert_async().await;
}

#[tokio::test]
async fn sentinel_sidecar_always_fetches() {
    let old = packed_launcher(&[("META-INF/MANIFEST.MF", b"old")]).unwrap();
    let new = packed_launcher(&[("META-INF/MANIFEST.MF", MANIFEST)]).unwrap();

    let mut server = Server::new_async().await;
    let (_sidecar, body) = serve(&mut server, "/launcher.pack.lzma", "-", &new).await;

    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("launcher.pack.lzma"), &old).unwrap();

    let bootstrap = Bootstrap::new(config(&server.url(), vec![primary_spec()]), temp.path()).unwrap();
    let summary = bootstrap.execute(false).await.unwrap();

    assert!(matches!(
        summary.resource("launcher").unwrap().sync,
        SyncOutcome::Updated { .. }
    ));
    assert_eq!(fs::read(temp.path().join("launcher.pack.lzma")).unwrap(), new);
    assert_eq!(
        read_manifest(&temp.path().join("launcher.jar")),
        String::from_utf8_lossy(MANIFEST)
    );
    body.assert_async().await;
}

#[tokio::test]
async fn exhausted_retries_keep_the_cached_copy() {
    let cached = packed_launcher(&[("META-INF/MANIFEST.MF", MANIFEST)]).unwrap();
    let corrupt = b"truncated body".to_vec();

    let mut server = Server::new_async().await;
    let _sidecar = server
        .mock("GET", "/launcher.pack.lzma.hash")
        .with_body("0123456789abcdef0123456789abcdef")
        .create_async()
        .await;
    let body = server
        .mock("GET", "/launcher.pack.lzma")
        .with_body(&corrupt)
        .expect(3)
        .create_async()
        .await;

    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("launcher.pack.lzma"), &cached).unwrap();

    let bootstrap = Bootstrap::new(config(&server.url(), vec![primary_spec()]), temp.path()).unwrap();
    let summary = bootstrap.execute(false).await.unwrap();

    assert!(matches!(
        summary.resource("launcher").unwrap().sync,
        SyncOutcome::Stale { .. }
    ));
    assert_eq!(fs::read(temp.path().join("launcher.pack.lzma")).unwrap(), cached);
    assert!(!temp.path().join("launcher.pack.lzma.new").exists());
    assert!(temp.path().join("launcher.jar").is_file());
    body.assert_async().await;
}

#[tokio::test]
async fn forced_download_failure_is_fatal() {
    let mut server = Server::new_async().await;
    let _sidecar = server
        .mock("GET", "/launcher.pack.lzma.hash")
        .with_status(404)
        .create_async()
        .await;

    let temp = TempDir::new().unwrap();
    let bootstrap = Bootstrap::new(config(&server.url(), vec![primary_spec()]), temp.path()).unwrap();
    let err = bootstrap.execute(true).await.unwrap_err();

    assert!(matches!(err, BootstrapError::ForcedDownload { .. }));
}

#[tokio::test]
async fn unpacking_is_idempotent() {
    let launcher = packed_launcher(&[
        ("META-INF/MANIFEST.MF", MANIFEST),
        ("net/lodestar/Launcher.class", b"\xca\xfe\xba\xbe"),
    ])
    .unwrap();

    let mut server = Server::new_async().await;
    let _mocks = serve(&mut server, "/launcher.pack.lzma", &digest(&launcher), &launcher).await;

    let temp = TempDir::new().unwrap();
    let bootstrap = Bootstrap::new(config(&server.url(), vec![primary_spec()]), temp.path()).unwrap();

    bootstrap.execute(false).await.unwrap();
    let first = fs::read(temp.path().join("launcher.jar")).unwrap();

    let summary = bootstrap.execute(false).await.unwrap();
    assert_eq!(
        summary.resource("launcher").unwrap().sync,
        SyncOutcome::UpToDate
    );
    assert_eq!(fs::read(temp.path().join("launcher.jar")).unwrap(), first);
    assert!(!temp.path().join("launcher.pack").exists());
}

#[tokio::test]
async fn staged_update_from_last_run_is_committed() {
    let old = packed_launcher(&[("META-INF/MANIFEST.MF", b"old")]).unwrap();
    let staged = packed_launcher(&[("META-INF/MANIFEST.MF", MANIFEST)]).unwrap();

    let mut server = Server::new_async().await;
    let _sidecar = server
        .mock("GET", "/launcher.pack.lzma.hash")
        .with_body(digest(&staged))
        .create_async()
        .await;
    let body = server
        .mock("GET", "/launcher.pack.lzma")
        .expect(0)
        .create_async()
        .await;

    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("launcher.pack.lzma"), &old).unwrap();
    fs::write(temp.path().join("launcher.pack.lzma.new"), &staged).unwrap();

    let bootstrap = Bootstrap::new(config(&server.url(), vec![primary_spec()]), temp.path()).unwrap();
    let summary = bootstrap.execute(false).await.unwrap();

    let launcher = summary.resource("launcher").unwrap();
    assert_eq!(launcher.cached_commit, Some(CommitOutcome::Renamed));
    assert_eq!(launcher.sync, SyncOutcome::UpToDate);
    assert_eq!(
        read_manifest(&temp.path().join("launcher.jar")),
        String::from_utf8_lossy(MANIFEST)
    );
    body.assert_async().await;
}

#[tokio::test]
async fn handoff_receives_installed_paths() -> anyhow::Result<()> {
    let launcher = packed_launcher(&[("META-INF/MANIFEST.MF", MANIFEST)])?;
    let assets = bundle_zip(&[("readme.txt", b"hi")])?;

    let mut server = Server::new_async().await;
    let _launcher = serve(&mut server, "/launcher.pack.lzma", &digest(&launcher), &launcher).await;
    let _assets = serve(&mut server, "/assets.zip", &digest(&assets), &assets).await;

    let temp = TempDir::new()?;
    let bootstrap = Bootstrap::new(
        config(&server.url(), vec![primary_spec(), bundle_spec("assets")]),
        temp.path(),
    )?;
    let summary = bootstrap.execute(false).await?;

    let ctx = LaunchContext::from_summary(&summary, vec!["--offline".to_owned()])?;
    let handoff = |ctx: &LaunchContext| -> lodestar_bootstrap::Result<()> {
        assert!(ctx.artifact.is_file());
        assert!(ctx.bundles.iter().all(|dir| dir.is_dir()));
        assert_eq!(ctx.args, vec!["--offline".to_owned()]);
        Ok(())
    };
    handoff.launch(&ctx)?;
    Ok(())
}
