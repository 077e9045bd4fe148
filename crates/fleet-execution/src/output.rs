use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{ExecutionError, ExecutionResult};

/// The directory the workers write their result files into.
#[derive(Debug, Clone)]
pub struct ResultDirectory {
    path: PathBuf,
}

impl ResultDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory with everything beneath it, and creates it again empty.
    /// This must not run while result files are being read from the same directory.
    pub fn reset(&self) -> ExecutionResult<()> {
        let error = |source| ExecutionError::OutputDirectory {
            path: self.path.clone(),
            source,
        };
        match fs::symlink_metadata(&self.path) {
            Ok(metadata) if metadata.is_dir() => {
                debug!("removing output directory {}", self.path.display());
                fs::remove_dir_all(&self.path).map_err(error)?;
            }
            Ok(_) => return Err(error(io::Error::other("not a directory"))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(error(e)),
        }
        fs::create_dir_all(&self.path).map_err(error)?;
        debug!("created output directory {}", self.path.display());
        Ok(())
    }
}
