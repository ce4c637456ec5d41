//! Scratch-file allocation and cleanup for one session.
//!
//! Paths are `<dir>/clirunner-temp<N>.php` with `N` advanced before every
//! attempt. Files are created exclusively, so managers sharing a directory
//! never hand out the same path. Every allocated path is tracked until
//! [`ScratchFiles::release_all`] removes it.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::RunnerError;

const SCRATCH_PREFIX: &str = "clirunner-temp";
const SCRATCH_SUFFIX: &str = ".php";

#[derive(Debug)]
pub struct ScratchFiles {
    dir: PathBuf,
    index: u64,
    files: Vec<PathBuf>,
}

impl ScratchFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            index: 0,
            files: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths currently owned by this manager, in allocation order.
    pub fn tracked(&self) -> &[PathBuf] {
        &self.files
    }

    /// Create a fresh scratch file, optionally filled with `contents`.
    pub fn allocate(&mut self, contents: Option<&[u8]>) -> Result<PathBuf, RunnerError> {
        let (path, mut file) = loop {
            self.index += 1;
            let path = self
                .dir
                .join(format!("{SCRATCH_PREFIX}{}{SCRATCH_SUFFIX}", self.index));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(RunnerError::TempFile { path, source }),
            }
        };
        // Tracked before writing so a failed write is still cleaned up.
        self.files.push(path.clone());

        if let Some(contents) = contents {
            file.write_all(contents)
                .and_then(|()| file.flush())
                .map_err(|source| RunnerError::TempFile {
                    path: path.clone(),
                    source,
                })?;
        }
        drop(file);

        let is_file = fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false);
        if !is_file {
            return Err(RunnerError::TempFile {
                path,
                source: io::Error::other("path is not a regular file after creation"),
            });
        }

        tracing::debug!(
            path = %path.display(),
            bytes = contents.map_or(0, <[u8]>::len),
            "Allocated scratch file",
        );
        Ok(path)
    }

    /// Remove every tracked file. Failures are logged and swallowed.
    pub fn release_all(&mut self) {
        while let Some(path) = self.files.pop() {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
            }
        }
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        self.release_all();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
