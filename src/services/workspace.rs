use rand::distributions::Alphanumeric;
use rand::Rng;
use std::io;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

const TOKEN_LEN: usize = 24;
const WORKSPACE_PREFIX: &str = "req-";

/// Random alphanumeric token used in every generated file name.
pub fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// A per-request scratch directory. Removed with everything in it on drop.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create(root: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix(WORKSPACE_PREFIX).tempdir_in(root)?;
        debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        debug!("Removing workspace {}", self.dir.path().display());
    }
}

/// Removes workspaces left behind by a previous process. Run once at startup.
pub fn purge_stale_workspaces(root: &Path) -> io::Result<usize> {
    if !root.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let is_workspace = entry.file_type()?.is_dir()
            && entry.file_name().to_string_lossy().starts_with(WORKSPACE_PREFIX);
        if is_workspace {
            std::fs::remove_dir_all(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_token_shape() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(&root.path().join("nested")).unwrap();
        let path = workspace.path().to_path_buf();
        std::fs::write(path.join("audio_x.mp3"), b"data").unwrap();
        assert!(path.exists());

        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn test_purge_stale_workspaces() {
        let root = tempfile::tempdir().unwrap();
        let stale = Workspace::create(root.path()).unwrap();
        let stale_path = stale.path().to_path_buf();
        // Simulate a crash: the guard never runs.
        std::mem::forget(stale);
        std::fs::create_dir(root.path().join("keep-me")).unwrap();

        assert_eq!(purge_stale_workspaces(root.path()).unwrap(), 1);
        assert!(!stale_path.exists());
        assert!(root.path().join("keep-me").exists());
        assert_eq!(purge_stale_workspaces(&root.path().join("absent")).unwrap(), 0);
    }

    #[test]
    fn test_workspaces_are_distinct() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::create(root.path()).unwrap();
        let b = Workspace::create(root.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }
}
