use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Result, StructuraError};

/// Exclusive advisory lock on one target directory, released on drop.
#[derive(Debug)]
pub struct TargetLock {
    _file: File,
    path: PathBuf,
}

impl TargetLock {
    /// The lock file backing this lock.
    pub fn lock_file(&self) -> &Path {
        &self.path
    }
}

/// Lock file location for `target`, keyed by its canonical path.
pub fn lock_file_for(target: &Path) -> PathBuf {
    let canonical = target
        .canonicalize()
        .unwrap_or_else(|_| target.to_path_buf());
    let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
    let key: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    std::env::temp_dir().join(format!("structura-{key}.lock"))
}

/// Take the lock for `target`, waiting for any other holder to release it.
pub fn lock_target(target: &Path) -> Result<TargetLock> {
    let path = lock_file_for(target);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(|e| StructuraError::Io {
            context: format!("opening lock file {}", path.display()),
            source: e,
        })?;
    FileExt::lock_exclusive(&file).map_err(|e| StructuraError::Io {
        context: format!("locking {}", target.display()),
        source: e,
    })?;
    debug!(target = %target.display(), lock = %path.display(), "target locked");
    Ok(TargetLock { _file: file, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_target_same_lock_file() {
        let tmp = tempfile::tempdir().unwrap();
        let a = lock_file_for(tmp.path());
        let b = lock_file_for(&tmp.path().join("."));
        assert_eq!(a, b);
        assert_ne!(a, lock_file_for(&tmp.path().join("other")));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let first = lock_target(tmp.path()).unwrap();
        assert!(first.lock_file().exists());
        drop(first);
        let again = lock_target(tmp.path()).unwrap();
        assert_eq!(again.lock_file(), lock_file_for(tmp.path()));
    }
}
