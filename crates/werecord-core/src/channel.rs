use std::{fs, io, path::Path};

use async_trait::async_trait;
use thiserror::Error;

/// Failures of the privileged file channel. Distinct from "file absent".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShellFailure {
    /// No privileged shell could be obtained.
    #[error("privileged shell unavailable: {reason}")]
    Unavailable { reason: String },
    /// The shell ran but the command failed.
    #[error("`{command}` failed with status {status:?}: {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("file not found: {path}")]
    NotFound { path: String },
    #[error("io failure: {reason}")]
    Io { reason: String },
}

/// Access to files owned by another application.
#[async_trait]
pub trait FileChannel: Send + Sync {
    /// Whether the file exists. Channel errors read as "absent".
    async fn exists(&self, path: &Path) -> bool;

    /// Full contents of a text file.
    async fn read_text(&self, path: &Path) -> Result<String, ShellFailure>;

    /// Copy `src` to `dst`. Without `overwrite` an existing `dst` is kept.
    async fn copy(&self, src: &Path, dst: &Path, overwrite: bool) -> Result<(), ShellFailure>;
}

/// Channel over plain filesystem calls, for hosts where the process can
/// already read the target's files, and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileChannel;

impl LocalFileChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileChannel for LocalFileChannel {
    async fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    async fn read_text(&self, path: &Path) -> Result<String, ShellFailure> {
        let bytes = fs::read(path).map_err(|err| io_failure(path, err))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn copy(&self, src: &Path, dst: &Path, overwrite: bool) -> Result<(), ShellFailure> {
        if !overwrite && dst.exists() {
            return Ok(());
        }
        fs::copy(src, dst).map_err(|err| io_failure(src, err))?;
        Ok(())
    }
}

fn io_failure(path: &Path, err: io::Error) -> ShellFailure {
    if err.kind() == io::ErrorKind::NotFound {
        ShellFailure::NotFound {
            path: path.to_string_lossy().to_string(),
        }
    } else {
        ShellFailure::Io {
            reason: err.to_string(),
        }
    }
}
