use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::app_dirs::AppDirs;
use crate::progress::UserProgress;

/// Where progress snapshots live between sessions
pub trait ProgressStore {
    /// `None` when nothing has been saved yet
    fn load(&self) -> crate::Result<Option<UserProgress>>;
    fn save(&self, progress: &UserProgress) -> crate::Result<()>;
    fn clear(&self) -> crate::Result<()>;
}

/// JSON snapshot on disk
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    path: PathBuf,
}

impl FileProgressStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::progress_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressStore for FileProgressStore {
    fn load(&self) -> crate::Result<Option<UserProgress>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        let progress = serde_json::from_slice(&bytes)?;
        Ok(Some(progress))
    }

    fn save(&self, progress: &UserProgress) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(progress)?;
        fs::write(&self.path, data)?;
        debug!(path = %self.path.display(), tests = progress.total_tests, "progress saved");
        Ok(())
    }

    fn clear(&self) -> crate::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
