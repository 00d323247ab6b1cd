//! A directory on disk that materialised action sources are stored under,
//! keyed by `<owner>/<project>/<ref>`. Supports eviction of stale entries and
//! an ephemeral single-run mode for offline/CI use.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, info};
use thiserror::Error;

const EVICTION_AGE: Duration = Duration::from_secs(5 * 24 * 60 * 60);
const DEFAULT_DIR_NAME: &str = ".ghasum";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("could not determine home directory")]
    NoHomeDirectory,
    #[error("could not create cache at {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not create temporary cache: {0}")]
    CreateTemp(#[source] std::io::Error),
    #[error("cache eviction failed: {0}")]
    Evict(#[source] std::io::Error),
    #[error("could not clear cache at {path}: {source}")]
    Clear {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

enum Storage {
    Persistent(PathBuf),
    Ephemeral(tempfile::TempDir),
}

/// A materialised-source cache. Persistent caches live at a fixed location
/// on disk across runs; ephemeral caches live in a process-local temporary
/// directory that is removed when the `Cache` is dropped.
pub struct Cache {
    storage: Storage,
}

impl Cache {
    #[must_use]
    pub fn path(&self) -> &Path {
        match &self.storage {
            Storage::Persistent(path) => path,
            Storage::Ephemeral(dir) => dir.path(),
        }
    }

    /// Remove every entry from the cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Clear`] if the directory cannot be removed.
    pub fn clear(&self) -> Result<(), CacheError> {
        let path = self.path();
        if path.is_dir() {
            std::fs::remove_dir_all(path).map_err(|source| CacheError::Clear {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Remove cache entries whose contents haven't been touched in over five
    /// days. Entries are the directories two levels below the cache root
    /// (`<owner>/<project>/<ref>`); shallower levels are never candidates for
    /// removal themselves, only descended into. Returns the number of
    /// entries removed. A missing cache directory is not an error: there is
    /// simply nothing to evict.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Evict`] on I/O failure walking the cache.
    pub fn evict(&self) -> Result<u32, CacheError> {
        let root = self.path();
        if !root.is_dir() {
            return Ok(0);
        }

        let deadline = SystemTime::now() - EVICTION_AGE;
        let mut count = 0;
        evict_walk(root, root, deadline, &mut count).map_err(CacheError::Evict)?;
        if count > 0 {
            info!("evicted {count} stale cache entr{}", if count == 1 { "y" } else { "ies" });
        }
        Ok(count)
    }
}

fn evict_walk(
    root: &Path,
    dir: &Path,
    deadline: SystemTime,
    count: &mut u32,
) -> std::io::Result<()> {
    let depth = dir
        .strip_prefix(root)
        .map(|rel| rel.components().count())
        .unwrap_or(0);

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_dir() {
            continue;
        }

        if is_eviction_candidate_depth(depth + 1) {
            let modified = entry.metadata()?.modified()?;
            if is_stale(modified, deadline) {
                debug!("evicting stale cache entry {}", path.display());
                std::fs::remove_dir_all(&path)?;
                *count += 1;
                continue;
            }
        }
        evict_walk(root, &path, deadline, count)?;
    }
    Ok(())
}

/// Only directories at least three levels below the cache root
/// (`<owner>/<project>/<ref>` and deeper) are candidates for eviction;
/// `<owner>` and `<owner>/<project>` are structural and only ever descended
/// into, never removed directly.
fn is_eviction_candidate_depth(depth: usize) -> bool {
    depth >= 3
}

fn is_stale(modified: SystemTime, deadline: SystemTime) -> bool {
    modified < deadline
}

/// Builds a [`Cache`], mirroring the defaults and options a caller would
/// otherwise pass positionally: ephemeral-or-not, an explicit location, and
/// whether to evict stale entries immediately on construction.
pub struct CacheBuilder {
    location: Option<PathBuf>,
    ephemeral: bool,
    evict: bool,
}

impl CacheBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            location: None,
            ephemeral: false,
            evict: true,
        }
    }

    #[must_use]
    pub fn location(mut self, path: PathBuf) -> Self {
        self.location = Some(path);
        self
    }

    #[must_use]
    pub fn ephemeral(mut self, value: bool) -> Self {
        self.ephemeral = value;
        self
    }

    #[must_use]
    pub fn evict(mut self, value: bool) -> Self {
        self.evict = value;
        self
    }

    /// Build the cache, creating its backing directory.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the directory cannot be created, or if
    /// eviction was requested and failed.
    pub fn build(self) -> Result<Cache, CacheError> {
        let storage = if self.ephemeral {
            let dir = tempfile::Builder::new()
                .prefix("ghasum-clone-")
                .tempdir()
                .map_err(CacheError::CreateTemp)?;
            Storage::Ephemeral(dir)
        } else {
            let path = match self.location {
                Some(path) => path,
                None => {
                    let home = dirs_home().ok_or(CacheError::NoHomeDirectory)?;
                    home.join(DEFAULT_DIR_NAME)
                }
            };
            std::fs::create_dir_all(&path).map_err(|source| CacheError::Create {
                path: path.clone(),
                source,
            })?;
            Storage::Persistent(path)
        };

        let cache = Cache { storage };
        if self.evict {
            cache.evict()?;
        }
        Ok(cache)
    }
}

impl Default for CacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn ephemeral_cache_is_removed_on_drop() {
        let path;
        {
            let cache = CacheBuilder::new().ephemeral(true).evict(false).build().unwrap();
            path = cache.path().to_path_buf();
            assert!(path.is_dir());
        }
        assert!(!path.is_dir());
    }

    #[test]
    fn persistent_cache_creates_its_directory() {
        let parent = tempfile::tempdir().unwrap();
        let location = parent.path().join("cache-root");
        let cache = CacheBuilder::new()
            .location(location.clone())
            .evict(false)
            .build()
            .unwrap();
        assert_eq!(cache.path(), location);
        assert!(location.is_dir());
    }

    #[test]
    fn clear_removes_everything() {
        let parent = tempfile::tempdir().unwrap();
        let location = parent.path().join("cache-root");
        let cache = CacheBuilder::new()
            .location(location.clone())
            .evict(false)
            .build()
            .unwrap();
        fs::write(location.join("marker"), b"x").unwrap();
        cache.clear().unwrap();
        assert!(!location.is_dir());
    }

    #[test]
    fn evict_does_not_remove_freshly_created_entries() {
        let parent = tempfile::tempdir().unwrap();
        let location = parent.path().join("cache-root");
        let cache = CacheBuilder::new()
            .location(location.clone())
            .evict(false)
            .build()
            .unwrap();

        let entry = location.join("owner/project/v1");
        fs::create_dir_all(&entry).unwrap();

        let removed = cache.evict().unwrap();
        assert_eq!(removed, 0);
        assert!(entry.is_dir());
    }

    #[test]
    fn evict_on_missing_cache_dir_is_not_an_error() {
        let parent = tempfile::tempdir().unwrap();
        let location = parent.path().join("does-not-exist");
        let storage = Storage::Persistent(location);
        let cache = Cache { storage };
        assert_eq!(cache.evict().unwrap(), 0);
    }

    #[test]
    fn eviction_candidate_depth_starts_at_owner_project_ref() {
        assert!(!is_eviction_candidate_depth(0));
        assert!(!is_eviction_candidate_depth(1));
        assert!(!is_eviction_candidate_depth(2));
        assert!(is_eviction_candidate_depth(3));
    }

    #[test]
    fn evict_does_not_remove_a_stale_project_directory_wholesale() {
        let parent = tempfile::tempdir().unwrap();
        let location = parent.path().join("cache-root");
        let cache = CacheBuilder::new()
            .location(location.clone())
            .evict(false)
            .build()
            .unwrap();

        let fresh_ref = location.join("owner/project/v1");
        fs::create_dir_all(&fresh_ref).unwrap();

        // Age the project directory itself (not the ref beneath it, which
        // stays freshly created). A depth-2 candidate check would wrongly
        // treat the project directory's own staleness as grounds to remove
        // it, taking the fresh ref down with it.
        let project_dir = location.join("owner/project");
        let touched = std::process::Command::new("touch")
            .arg("-d")
            .arg("10 days ago")
            .arg(&project_dir)
            .status();
        if !matches!(touched, Ok(status) if status.success()) {
            return;
        }

        let removed = cache.evict().unwrap();
        assert_eq!(removed, 0);
        assert!(project_dir.is_dir());
        assert!(fresh_ref.is_dir());
    }

    #[test]
    fn staleness_uses_the_five_day_deadline() {
        let now = SystemTime::now();
        let deadline = now - EVICTION_AGE;
        let just_old_enough = deadline - Duration::from_secs(1);
        let not_old_enough = deadline + Duration::from_secs(1);
        assert!(is_stale(just_old_enough, deadline));
        assert!(!is_stale(not_old_enough, deadline));
    }
}
