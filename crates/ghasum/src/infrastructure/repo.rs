use std::env;
use std::path::PathBuf;

use log::debug;
use thiserror::Error;

/// Errors encountered while locating the repository to operate on.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(".github folder not found")]
    GithubFolder,

    #[error("repository has no work tree")]
    BareRepository,

    #[error("current directory doesn't exist or there are insufficient permissions to access it")]
    CurrentDirectory(#[source] std::io::Error),

    #[error("no valid git repository could be found")]
    GitRepository(#[source] gix_discover::upwards::Error),
}

/// Find the root of the git repository containing the current directory.
///
/// # Errors
///
/// Returns an error if no git repository is found, the repository is bare,
/// or the repository has no `.github` directory (nothing for this tool to
/// act on).
pub fn find_root() -> Result<PathBuf, RepoError> {
    let cwd = env::current_dir().map_err(RepoError::CurrentDirectory)?;
    find_root_from(&cwd)
}

/// As [`find_root`], but starting the upward search from an explicit
/// directory rather than the process's current directory. Exists mainly so
/// tests don't need to change the process-wide working directory.
///
/// # Errors
///
/// See [`find_root`].
pub fn find_root_from(start: &std::path::Path) -> Result<PathBuf, RepoError> {
    let (repo_path, _trust) = gix_discover::upwards(start).map_err(RepoError::GitRepository)?;
    let (_git_dir, work_tree) = repo_path.into_repository_and_work_tree_directories();
    let root = work_tree.ok_or(RepoError::BareRepository)?;

    if root.join(".github").is_dir() {
        debug!("repository root at {}", root.display());
        Ok(root)
    } else {
        Err(RepoError::GithubFolder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn rejects_repository_without_github_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::process::Command::new("git")
            .arg("init")
            .arg("--quiet")
            .arg(dir.path())
            .status()
            .ok();
        if !dir.path().join(".git").is_dir() {
            // git not available in this environment; nothing to assert.
            return;
        }
        let err = find_root_from(dir.path()).unwrap_err();
        assert!(matches!(err, RepoError::GithubFolder));
    }

    #[test]
    fn accepts_repository_with_github_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::process::Command::new("git")
            .arg("init")
            .arg("--quiet")
            .arg(dir.path())
            .status()
            .ok();
        if !dir.path().join(".git").is_dir() {
            return;
        }
        fs::create_dir_all(dir.path().join(".github/workflows")).unwrap();
        let root = find_root_from(dir.path()).unwrap();
        assert_eq!(root, dir.path().canonicalize().unwrap());
    }
}
