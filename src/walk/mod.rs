//! Model directory walker
//!
//! Enumerates every regular file under a directory and describes it with a
//! path rooted at the directory's own base name, so the platform can rebuild
//! the original folder layout.
//!
//! Symbolic links are not followed and are skipped, as are sockets, FIFOs and
//! device files. Descriptor order is traversal order.

use crate::error::{ClientError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Metadata for one local file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// File name without directories
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub mime_type: String,
    /// `<root base name>/<path below root>`, always `/`-separated
    pub relative_path: String,
    #[serde(rename = "localAbsolutePath")]
    pub local_path: PathBuf,
}

/// Walk `root` and describe every regular file beneath it
#[tracing::instrument(name = "walk.directory", skip(root), fields(walk.root = %root.display()), err)]
pub fn walk_directory(root: &Path) -> Result<Vec<FileDescriptor>> {
    let metadata = std::fs::metadata(root)?;
    if !metadata.is_dir() {
        return Err(ClientError::Validation(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    // The base name comes from the path as given, so a symlinked root keeps
    // its own name; the canonical path is only consulted for `.` and `..`.
    let canonical = root.canonicalize()?;
    let base_name = root
        .file_name()
        .or_else(|| canonical.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ClientError::Validation(format!("{} has no base name", root.display()))
        })?;
    let root = canonical;

    let mut descriptors = Vec::new();

    for entry in WalkDir::new(&root).follow_links(false) {
        let entry = entry.map_err(walk_error)?;
        let file_type = entry.file_type();

        if !file_type.is_file() {
            if file_type.is_symlink() {
                tracing::debug!(path = %entry.path().display(), "Skipping symbolic link");
            }
            continue;
        }

        let below_root = entry
            .path()
            .strip_prefix(&root)
            .map_err(|e| ClientError::Validation(e.to_string()))?;

        let mut relative_path = base_name.clone();
        for component in below_root.components() {
            relative_path.push('/');
            relative_path.push_str(&component.as_os_str().to_string_lossy());
        }

        let size = entry.metadata().map_err(walk_error)?.len();

        descriptors.push(FileDescriptor {
            name: entry.file_name().to_string_lossy().into_owned(),
            size,
            mime_type: mime_guess::from_path(entry.path())
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
            relative_path,
            local_path: entry.path().to_path_buf(),
        });
    }

    tracing::debug!(files = descriptors.len(), "Directory walk complete");

    Ok(descriptors)
}

fn walk_error(err: walkdir::Error) -> ClientError {
    let message = err.to_string();
    match err.into_io_error() {
        Some(io) => ClientError::Io(io),
        None => ClientError::Validation(message),
    }
}
