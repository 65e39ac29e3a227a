//! Asset (image and sound) reconciliation.
//!
//! Local files under the asset directories are hashed into a manifest of
//! relative path to MD5 hex digest, which is what the file server compares.
//! Files the server lacks are uploaded; files the server has in a different
//! version are downloaded.
//! Each file is handled on its own: a failing transfer is logged and the
//! pass moves on.

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use schoolsync_protocol::FileManifestRequest;
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File extensions treated as assets.
pub const ASSET_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "wav", "mp3", "ogg"];

/// Relative path to hex digest.
pub type Manifest = BTreeMap<String, String>;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetReport {
    /// Local files hashed.
    pub local_files: usize,
    /// Files uploaded.
    pub uploaded: usize,
    /// Uploads that failed.
    pub upload_failures: usize,
    /// Files downloaded.
    pub downloaded: usize,
    /// Downloads that failed or were refused.
    pub download_failures: usize,
}

/// Returns true if `path` has an asset extension.
pub fn is_asset(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ASSET_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Hashes a file with MD5, returning lowercase hex.
pub fn file_digest(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn rel_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = rel
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    Some(parts?.join("/"))
}

/// Builds the manifest of asset files under `root/<dir>` for each directory.
///
/// Missing directories contribute nothing. Unreadable files are skipped.
pub fn build_manifest(root: &Path, directories: &[String]) -> Manifest {
    let mut manifest = Manifest::new();
    for dir in directories {
        let base = root.join(dir);
        if !base.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&base).follow_links(false).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() || !is_asset(entry.path()) {
                continue;
            }
            let Some(rel) = rel_path(root, entry.path()) else {
                continue;
            };
            match file_digest(entry.path()) {
                Ok(digest) => {
                    manifest.insert(rel, digest);
                }
                Err(e) => warn!(path = %entry.path().display(), error = %e, "cannot hash asset"),
            }
        }
    }
    manifest
}

/// Validates a server-supplied relative path.
///
/// Accepts only forward-slash paths of plain components whose first
/// component is one of the asset directories.
pub fn safe_destination(root: &Path, rel: &str, directories: &[String]) -> Option<PathBuf> {
    if rel.is_empty() || rel.starts_with('/') || rel.contains('\\') || rel.contains(':') {
        return None;
    }
    let parts: Vec<&str> = rel.split('/').collect();
    if parts.iter().any(|p| p.is_empty() || *p == "." || *p == "..") {
        return None;
    }
    if !directories.iter().any(|d| d == parts[0]) || parts.len() < 2 {
        return None;
    }
    let mut dest = root.to_path_buf();
    for part in parts {
        dest.push(part);
    }
    Some(dest)
}

/// Writes `contents` next to `dest` and renames it into place.
fn write_atomic(dest: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent"))?;
    fs::create_dir_all(parent)?;
    let name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("asset");
    let temp = parent.join(format!(".{name}.part"));
    fs::write(&temp, contents)?;
    fs::rename(&temp, dest).inspect_err(|_| {
        let _ = fs::remove_file(&temp);
    })
}

/// Runs one upload-then-download reconciliation pass.
///
/// Fails only when the manifest exchange itself fails.
pub fn reconcile_assets<T: SyncTransport + ?Sized>(
    transport: &T,
    root: &Path,
    directories: &[String],
) -> SyncResult<AssetReport> {
    let local = build_manifest(root, directories);
    let mut report = AssetReport {
        local_files: local.len(),
        ..Default::default()
    };

    let diff = transport.files_diff(&FileManifestRequest {
        manifest: local.clone(),
    })?;
    for rel in &diff.missing {
        if !local.contains_key(rel) {
            debug!(path = %rel, "server asked for a file we do not have");
            continue;
        }
        let Some(path) = safe_destination(root, rel, directories) else {
            continue;
        };
        let result = fs::read(&path)
            .map_err(SyncError::from)
            .and_then(|contents| transport.upload_file(rel, contents));
        match result {
            Ok(()) => report.uploaded += 1,
            Err(e) => {
                warn!(path = %rel, error = %e, "asset upload failed");
                report.upload_failures += 1;
            }
        }
    }

    let remote = transport.files_list()?;
    for (rel, digest) in &remote.manifest {
        if local.get(rel) == Some(digest) {
            continue;
        }
        let Some(dest) = safe_destination(root, rel, directories) else {
            warn!(path = %rel, "refusing unsafe asset path");
            report.download_failures += 1;
            continue;
        };
        let result = transport
            .download_file(rel)
            .and_then(|contents| write_atomic(&dest, &contents).map_err(SyncError::from));
        match result {
            Ok(()) => report.downloaded += 1,
            Err(e) => {
                warn!(path = %rel, error = %e, "asset download failed");
                report.download_failures += 1;
            }
        }
    }

    if report.uploaded + report.downloaded + report.upload_failures + report.download_failures > 0 {
        info!(
            uploaded = report.uploaded,
            downloaded = report.downloaded,
            upload_failures = report.upload_failures,
            download_failures = report.download_failures,
            "assets reconciled"
        );
    }
    Ok(report)
}
