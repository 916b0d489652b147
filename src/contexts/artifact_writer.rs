use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("refusing to write: no file path given")]
    EmptyPath,
    #[error("refusing to write empty content to {0}")]
    EmptyContent(PathBuf),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes artifacts to disk, creating missing parent directories.
///
/// Empty paths and empty content are hard errors. Upstream "nothing parsed"
/// cases are expected to be caught before reaching the writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactWriter {
    dry_run: bool,
}

impl ArtifactWriter {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn write(&self, path: &Path, content: &str) -> Result<PathBuf, WriteError> {
        if path.as_os_str().is_empty() {
            return Err(WriteError::EmptyPath);
        }
        if content.is_empty() {
            return Err(WriteError::EmptyContent(path.to_path_buf()));
        }

        if self.dry_run {
            log::info!("[dry-run] would write {} ({} bytes)", path.display(), content.len());
            return Ok(path.to_path_buf());
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| WriteError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Wrote {} ({} bytes)", path.display(), content.len());
        Ok(path.to_path_buf())
    }
}
