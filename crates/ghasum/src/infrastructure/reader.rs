//! File-system discovery and YAML parsing of workflows and action manifests.
//! Pairs with [`crate::domain::workflow`] for the pure extraction logic:
//! everything here is "read bytes off disk", everything there is "what do
//! these bytes mean".

use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::domain::workflow::{Manifest, Workflow};

pub const WORKFLOWS_DIR: &str = ".github/workflows";

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<serde_saphyr::Error>,
    },
    #[error("no action manifest found in {0}")]
    NoManifest(PathBuf),
}

/// A discovered action manifest, or the classifier that there isn't a YAML
/// one to parse because the action is a plain Dockerfile action.
pub enum ManifestSource {
    Manifest(Manifest),
    Dockerfile,
}

/// List every `.yml`/`.yaml` file directly inside `<repo_root>/.github/workflows`,
/// parsed, paired with their path relative to `repo_root`. Subdirectories are
/// not descended into. Returns an empty list if the workflows directory does
/// not exist.
///
/// # Errors
///
/// Propagates I/O errors and YAML parse failures, each annotated with path.
pub fn discover_workflows(repo_root: &Path) -> Result<Vec<(String, Workflow)>, ReaderError> {
    let dir = repo_root.join(WORKFLOWS_DIR);
    if !dir.is_dir() {
        debug!("no workflows directory at {}", dir.display());
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    for ext in ["yml", "yaml"] {
        let pattern = format!("{}/*.{}", dir.display(), ext);
        if let Ok(matches) = glob::glob(&pattern) {
            for entry in matches.flatten() {
                if entry.is_file() {
                    paths.push(entry);
                }
            }
        }
    }
    paths.sort();
    debug!("discovered {} workflow file(s) in {}", paths.len(), dir.display());

    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        debug!("scanning {}", path.display());
        let workflow = parse_workflow(&path)?;
        let rel = path
            .strip_prefix(repo_root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        out.push((rel, workflow));
    }
    Ok(out)
}

fn parse_workflow(path: &Path) -> Result<Workflow, ReaderError> {
    read_workflow_file(path)
}

/// Read and parse a single workflow file at an arbitrary path, used by the
/// resolver to follow a reusable-workflow reference into another repository's
/// materialised source rather than the scanned repository's own
/// `.github/workflows`.
///
/// # Errors
///
/// Propagates I/O and YAML parse failures, annotated with `path`.
pub fn read_workflow_file(path: &Path) -> Result<Workflow, ReaderError> {
    let text = std::fs::read_to_string(path).map_err(|source| ReaderError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_saphyr::from_str(&text).map_err(|source| ReaderError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

/// Find and parse the manifest for the action at `action_dir`: tries
/// `action.yml`, then `action.yaml`, then `Dockerfile`, in that order.
///
/// # Errors
///
/// Returns [`ReaderError::NoManifest`] if none of the three exist, or an I/O
/// or parse error for whichever candidate was found.
pub fn discover_manifest(action_dir: &Path) -> Result<ManifestSource, ReaderError> {
    for name in ["action.yml", "action.yaml"] {
        let path = action_dir.join(name);
        if path.is_file() {
            return parse_workflow_as_manifest(&path).map(ManifestSource::Manifest);
        }
    }
    if action_dir.join("Dockerfile").is_file() {
        return Ok(ManifestSource::Dockerfile);
    }
    Err(ReaderError::NoManifest(action_dir.to_path_buf()))
}

fn parse_workflow_as_manifest(path: &Path) -> Result<Manifest, ReaderError> {
    let text = std::fs::read_to_string(path).map_err(|source| ReaderError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_saphyr::from_str(&text).map_err(|source| ReaderError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}
