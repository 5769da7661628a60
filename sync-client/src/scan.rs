//! Directory scanning for the resource index.

use std::io;
use std::path::{Path, PathBuf};
use tablesync_core::{IndexRules, ResourceIndex};
use thiserror::Error;

/// Index errors.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The directory does not exist or is not a directory.
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Reading the directory failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Directory being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Build a [`ResourceIndex`] from the regular files directly inside `dir`.
///
/// Symlinks are followed; subdirectories are not descended into.
pub async fn index_directory(dir: &Path, rules: &IndexRules) -> Result<ResourceIndex, IndexError> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(IndexError::DirectoryNotFound(dir.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(IndexError::DirectoryNotFound(dir.to_path_buf()))
        }
        Err(source) => {
            return Err(IndexError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    }

    let io_err = |source: io::Error| IndexError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => paths.push(path),
            Ok(_) => {}
            // Dangling symlink.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Skipping broken link {}", path.display());
            }
            Err(source) => return Err(io_err(source)),
        }
    }

    let index = ResourceIndex::from_paths(paths, rules);
    tracing::info!(
        "Indexed {} files under {} keys in {}",
        index.file_count(),
        index.len(),
        dir.display()
    );
    Ok(index)
}
