// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-session workspace directory — uploads land here, transformer outputs
// are written alongside them.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use blattwerk_core::error::{BlattwerkError, Result};

/// A file saved into a workspace, with its recorded integrity data.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Absolute path inside the workspace.
    pub path: PathBuf,
    /// The name the user uploaded it under (no directory components).
    pub original_name: String,
    /// SHA-256 of the stored bytes, hex-encoded.
    pub sha256: String,
    pub size_bytes: u64,
}

/// The filesystem directory scoped to one session.
///
/// All paths handed out by a `Workspace` stay inside its directory; upload
/// names are reduced to their final component before use.
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
    /// Advisory ceiling — oversized uploads are logged, not rejected.
    max_upload_bytes: u64,
}

impl Workspace {
    /// Open (creating if needed) the workspace at `dir`.
    pub fn create(dir: impl Into<PathBuf>, max_upload_bytes: u64) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_upload_bytes,
        })
    }

    /// The workspace directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save uploaded bytes under the original filename and return the stored
    /// record.
    #[instrument(skip(self, bytes), fields(name, bytes_len = bytes.len()))]
    pub fn save_upload(&self, name: &str, bytes: &[u8]) -> Result<UploadedFile> {
        let original_name = sanitize_name(name);
        let path = self.dir.join(&original_name);

        if bytes.len() as u64 > self.max_upload_bytes {
            warn!(
                size = bytes.len(),
                limit = self.max_upload_bytes,
                "upload exceeds the advisory size limit"
            );
        }

        std::fs::write(&path, bytes)?;

        let sha256 = hex::encode(Sha256::digest(bytes));
        info!(path = %path.display(), %sha256, "upload stored");

        Ok(UploadedFile {
            path,
            original_name,
            sha256,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Copy an existing file into the workspace (the CLI's stand-in for a
    /// browser upload).
    pub fn ingest(&self, source: impl AsRef<Path>) -> Result<UploadedFile> {
        let source = source.as_ref();
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                BlattwerkError::Session(format!("no usable filename in {}", source.display()))
            })?;
        let bytes = std::fs::read(source)?;
        self.save_upload(name, &bytes)
    }

    /// Read a produced output back for download.
    ///
    /// The path must resolve inside this workspace; outputs can disappear
    /// between production and download if the cleanup sweep runs in between,
    /// which surfaces here as an I/O error.
    pub fn read_download(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        if !path.starts_with(&self.dir) {
            return Err(BlattwerkError::Session(format!(
                "{} is outside the session workspace",
                path.display()
            )));
        }
        debug!(path = %path.display(), "reading download");
        Ok(std::fs::read(path)?)
    }
}

/// Reduce an upload name to its final path component.
fn sanitize_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("upload.bin")
        .to_string()
}
