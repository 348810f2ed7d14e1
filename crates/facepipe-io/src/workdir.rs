//! Per-invocation scratch directory, removed when dropped.

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A private working directory `<root>/facepipe-<uuid>`.
///
/// Concurrent invocations sharing one filesystem never collide, and the
/// directory with everything in it is deleted on every exit path.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    pub fn create(root: &Path) -> std::io::Result<Self> {
        let path = root.join(format!("facepipe-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;
        tracing::debug!(path = %path.display(), "created working directory");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a working file. Only the final component of `name` is used,
    /// so object keys with prefixes map to flat local names.
    pub fn file(&self, name: &str) -> PathBuf {
        let base = Path::new(name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "file".into());
        self.path.join(base)
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed working directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove working directory"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_under_root_and_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let work = WorkDir::create(root.path()).unwrap();
            std::fs::write(work.file("video.mp4"), b"data").unwrap();
            std::fs::write(work.file("video.jpg"), b"data").unwrap();
            assert!(work.path().starts_with(root.path()));
            work.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_each_workdir_is_unique() {
        let root = tempfile::tempdir().unwrap();
        let a = WorkDir::create(root.path()).unwrap();
        let b = WorkDir::create(root.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_file_flattens_key_prefixes() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkDir::create(root.path()).unwrap();
        assert_eq!(work.file("clips/2024/test_00.mp4"), work.path().join("test_00.mp4"));
        assert_eq!(work.file(".."), work.path().join("file"));
    }

    #[test]
    fn test_drop_tolerates_external_removal() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkDir::create(root.path()).unwrap();
        std::fs::remove_dir_all(work.path()).unwrap();
        drop(work);
    }
}
