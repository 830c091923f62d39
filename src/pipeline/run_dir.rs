use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DecompError;

/// Prefix of every per-run directory name.
pub const RUN_DIR_PREFIX: &str = "convex-decomp-";

/// Scratch directory owned by one run; deleted with everything in it on drop.
#[derive(Debug)]
pub struct RunDir {
    path: PathBuf,
}

impl RunDir {
    /// Creates `<root>/convex-decomp-<run_id>`.
    ///
    /// The directory must not exist yet, so two runs never share one.
    ///
    /// # Errors
    ///
    /// Returns [`DecompError::RunDirectory`] if the directory cannot be created.
    pub fn create(root: &Path, run_id: Uuid) -> Result<Self, DecompError> {
        let path = root.join(format!("{RUN_DIR_PREFIX}{run_id}"));
        let created = std::fs::create_dir_all(root).and_then(|()| std::fs::create_dir(&path));
        if let Err(source) = created {
            return Err(DecompError::RunDirectory { path, source });
        }
        debug!(path = %path.display(), "created run directory");
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed run directory"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove run directory"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn directory_is_removed_with_contents() {
        let root = std::env::temp_dir().join(format!("convex-decomp-rundir-{}", Uuid::new_v4()));
        let path = {
            let dir = RunDir::create(&root, Uuid::new_v4()).unwrap();
            std::fs::write(dir.path().join("src.obj"), "v 0 0 0\n").unwrap();
            assert!(dir.path().is_dir());
            dir.path().to_path_buf()
        };
        assert!(!path.exists());
        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn same_id_cannot_be_reused() {
        let root = std::env::temp_dir().join(format!("convex-decomp-rundir-{}", Uuid::new_v4()));
        let id = Uuid::new_v4();
        let first = RunDir::create(&root, id).unwrap();
        assert!(matches!(
            RunDir::create(&root, id),
            Err(DecompError::RunDirectory { .. })
        ));
        drop(first);
        std::fs::remove_dir_all(root).unwrap();
    }
}
