use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Environment variable overriding the default working directory root.
pub const WORKDIR_ENV: &str = "VECSPACE_WORKDIR";

const TRAINING_FILE: &str = "train.svm";
const MODEL_FILE: &str = "model.svm";
const STAGING_SUFFIX: &str = ".partial";

static NEXT_WORKSPACE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Not a directory: {0:?}")]
    NotADirectory(PathBuf),
}

/// The per-model directory holding the transient backend files: the training
/// file, the model artifact, and per-call query and results files.
///
/// A directory created by [`WorkingDirectory::unique_in`] (and so by
/// [`WorkingDirectory::new_default`]) is deleted on drop. One passed to
/// [`WorkingDirectory::new`] belongs to the caller and is left in place.
#[derive(Debug)]
pub struct WorkingDirectory {
    root: PathBuf,
    next_call: AtomicU64,
    owned: bool,
}

/// Query and results paths reserved for one classification call.
///
/// Both files are removed when this is dropped.
#[derive(Debug)]
pub struct CallFiles {
    pub query: PathBuf,
    pub results: PathBuf,
}

impl Drop for CallFiles {
    fn drop(&mut self) {
        for path in [&self.query, &self.results] {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    log::warn!("Failed to remove {:?}: {}", path, e);
                }
            }
        }
    }
}

impl WorkingDirectory {
    /// Creates a fresh, uniquely named working directory under the default root
    pub fn new_default() -> Result<Self, WorkspaceError> {
        Self::unique_in(Self::get_default_root())
    }

    /// Returns the default root under which model working directories are created
    pub fn get_default_root() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var(WORKDIR_ENV) {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("vecspace").join("work");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("vecspace").join("work");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("vecspace").join("work")
    }

    /// Uses `root` itself as the working directory, creating it if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, WorkspaceError> {
        let root = root.as_ref().to_path_buf();
        if root.exists() && !root.is_dir() {
            return Err(WorkspaceError::NotADirectory(root));
        }
        fs::create_dir_all(&root)?;
        log::debug!("Using working directory {:?}", root);
        Ok(Self {
            root,
            next_call: AtomicU64::new(0),
            owned: false,
        })
    }

    /// Creates a new uniquely named subdirectory of `parent`.
    pub fn unique_in<P: AsRef<Path>>(parent: P) -> Result<Self, WorkspaceError> {
        let seq = NEXT_WORKSPACE.fetch_add(1, Ordering::Relaxed);
        let name = format!("model-{}-{}", std::process::id(), seq);
        let mut dir = Self::new(parent.as_ref().join(name))?;
        dir.owned = true;
        Ok(dir)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn training_file(&self) -> PathBuf {
        self.root.join(TRAINING_FILE)
    }

    pub fn model_file(&self) -> PathBuf {
        self.root.join(MODEL_FILE)
    }

    /// Where the trainer writes before the artifact replaces `model_file`
    pub fn staging_model_file(&self) -> PathBuf {
        self.root.join(format!("{}{}", MODEL_FILE, STAGING_SUFFIX))
    }

    /// Reserves a query/results file pair no other call in this process uses.
    pub fn call_files(&self) -> CallFiles {
        let n = self.next_call.fetch_add(1, Ordering::Relaxed);
        CallFiles {
            query: self.root.join(format!("query-{}.svm", n)),
            results: self.root.join(format!("results-{}.txt", n)),
        }
    }

    /// Moves the staged artifact over the live one.
    pub(crate) fn promote_staged_model(&self) -> Result<PathBuf, WorkspaceError> {
        let live = self.model_file();
        fs::rename(self.staging_model_file(), &live)?;
        Ok(live)
    }

    /// Deletes the working directory and everything in it
    pub fn remove(&self) -> Result<(), WorkspaceError> {
        if self.root.exists() {
            log::info!("Removing working directory {:?}", self.root);
            fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        if self.owned {
            if let Err(e) = self.remove() {
                log::warn!("Failed to remove working directory {:?}: {}", self.root, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        env::temp_dir()
            .join("vecspace-workspace-tests")
            .join(format!("{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_layout() -> Result<(), WorkspaceError> {
        let dir = WorkingDirectory::new(scratch("layout"))?;
        assert!(dir.path().is_dir());
        assert_eq!(dir.training_file(), dir.path().join("train.svm"));
        assert_eq!(dir.model_file(), dir.path().join("model.svm"));
        assert_eq!(dir.staging_model_file(), dir.path().join("model.svm.partial"));
        dir.remove()?;
        assert!(!dir.path().exists());
        Ok(())
    }

    #[test]
    fn test_call_files_are_unique_and_cleaned_up() -> Result<(), Box<dyn std::error::Error>> {
        let dir = WorkingDirectory::new(scratch("calls"))?;
        let first = dir.call_files();
        let second = dir.call_files();
        assert_ne!(first.query, second.query);
        assert_ne!(first.results, second.results);

        fs::write(&first.query, "0 1:1\n")?;
        fs::write(&first.results, "1\n")?;
        let (query, results) = (first.query.clone(), first.results.clone());
        drop(first);
        assert!(!query.exists());
        assert!(!results.exists());

        dir.remove()?;
        Ok(())
    }

    #[test]
    fn test_unique_in_creates_distinct_directories() -> Result<(), WorkspaceError> {
        let parent = scratch("unique");
        let a = WorkingDirectory::unique_in(&parent)?;
        let b = WorkingDirectory::unique_in(&parent)?;
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(&parent));
        a.remove()?;
        b.remove()?;
        Ok(())
    }

    #[test]
    fn test_unique_directory_removed_on_drop() -> Result<(), Box<dyn std::error::Error>> {
        let parent = scratch("drop-unique");
        let dir = WorkingDirectory::unique_in(&parent)?;
        fs::write(dir.training_file(), "1 1:1\n")?;
        fs::write(dir.model_file(), "weights")?;
        let path = dir.path().to_path_buf();
        drop(dir);
        assert!(!path.exists());

        // Caller-provided directories survive
        let kept = WorkingDirectory::new(parent.join("kept"))?;
        fs::write(kept.training_file(), "1 1:1\n")?;
        let kept_path = kept.path().to_path_buf();
        drop(kept);
        assert!(kept_path.join("train.svm").exists());

        fs::remove_dir_all(&parent)?;
        Ok(())
    }

    #[test]
    fn test_rejects_file_as_root() -> Result<(), Box<dyn std::error::Error>> {
        let parent = scratch("not-a-dir");
        fs::create_dir_all(&parent)?;
        let file = parent.join("plain-file");
        fs::write(&file, "x")?;
        assert!(matches!(
            WorkingDirectory::new(&file),
            Err(WorkspaceError::NotADirectory(_))
        ));
        fs::remove_dir_all(&parent)?;
        Ok(())
    }

    #[test]
    fn test_promote_staged_model() -> Result<(), Box<dyn std::error::Error>> {
        let dir = WorkingDirectory::new(scratch("promote"))?;
        fs::write(dir.staging_model_file(), "weights")?;
        let live = dir.promote_staged_model()?;
        assert_eq!(fs::read_to_string(&live)?, "weights");
        assert!(!dir.staging_model_file().exists());
        dir.remove()?;
        Ok(())
    }
}
