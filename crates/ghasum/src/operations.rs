//! Orchestration of the four top-level operations (`init`, `update`,
//! `verify`, `list`) against a target repository: wiring the domain layer's
//! pure logic to the infrastructure layer's file system and network access.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use log::{debug, info};
use thiserror::Error;

use crate::domain::{
    self, resolve, ActionIdentity, ActionKind, ActionTree, Entry, Problem, SumFile, SumFileError,
    TransitiveReader, UpdateReport, UsesError, VerifyReport, WorkflowUsesError,
};
use crate::infrastructure::checksum::{self, Algo, ChecksumError};
use crate::infrastructure::github::{GithubClient, GithubError, Repository};
use crate::infrastructure::reader::{self, ManifestSource, ReaderError};
use crate::infrastructure::sumfile_store::{self, StoreError};
use crate::infrastructure::Cache;

/// Everything an operation needs to know about its target and how to reach
/// the network, resolved ahead of time by [`crate::config`].
pub struct Config {
    /// Repository root; the record file and `.github/workflows` are found
    /// relative to this.
    pub base: PathBuf,
    /// Restrict scope to one workflow file, named relative to
    /// `.github/workflows/` (e.g. `"ci.yml"`). `None` means every workflow.
    pub workflow: Option<String>,
    /// Restrict scope further to one job within `workflow`. Ignored unless
    /// `workflow` is set.
    pub job: Option<String>,
    pub cache: Cache,
    pub github: GithubClient,
    /// Verification only: fail rather than fetch on a cache miss.
    pub offline: bool,
    pub transitive: bool,
}

#[derive(Debug, Error)]
pub enum OperationsError {
    #[error("ghasum is already initialized for this repository")]
    Initialized,
    #[error("ghasum is not initialized for this repository")]
    NotInitialized,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    SumFile(#[from] SumFileError),
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error(transparent)]
    Uses(#[from] UsesError),
    #[error("{0}")]
    WorkflowUses(#[from] WorkflowUsesError),
    #[error(transparent)]
    Checksum(#[from] ChecksumError),
    #[error(transparent)]
    Github(#[from] GithubError),
    #[error("workflow {0:?} not found")]
    WorkflowNotFound(String),
    #[error("job {job:?} not found in workflow {workflow:?}")]
    JobNotFound { workflow: String, job: String },
    #[error("missing {owner}/{project}@{git_ref} from cache")]
    OfflineMiss {
        owner: String,
        project: String,
        git_ref: String,
    },
}

/// Initialize ghasum for the repository in `cfg`: create the record file,
/// resolve and checksum every action the repository's workflows use, and
/// write the result.
///
/// # Errors
///
/// Returns [`OperationsError`] if the record file already exists, discovery
/// or resolution fails, or the file cannot be written. On any failure after
/// the file was created, it is removed again.
pub fn initialize(cfg: &Config) -> Result<(), OperationsError> {
    let mut file = sumfile_store::create(&cfg.base)?;

    let result = (|| {
        let roots = root_actions(cfg)?;
        let tree = resolve_tree(cfg, roots)?;
        let entries = compute_entries(cfg, &tree, Algo::BestAlgo)?;
        info!("computed {} checksum(s)", entries.len());
        let sum_file = SumFile::latest(entries);
        let encoded = domain::encode(&sum_file)?;
        sumfile_store::write(&mut file, &encoded)?;
        Ok(())
    })();

    if result.is_err() {
        drop(file);
        let _ = sumfile_store::remove(&cfg.base);
        return result;
    }

    sumfile_store::unlock(&cfg.base)?;
    info!("record file written");
    Ok(())
}

/// Update the stored checksums for the repository in `cfg`, keeping old
/// checksums for references that haven't changed unless `force` is set.
///
/// # Errors
///
/// Returns [`OperationsError`] if the record file is missing or unreadable
/// (and not `force`), or if resolution/computation fails.
pub fn update(cfg: &Config, force: bool) -> Result<UpdateReport, OperationsError> {
    let mut file = sumfile_store::open(&cfg.base)?;
    let raw = sumfile_store::read(&cfg.base)?;

    let old = match domain::decode(&raw) {
        Ok(sum_file) => sum_file,
        Err(err) if force && matches!(err, SumFileError::MissingHeader | SumFileError::MalformedHeader { .. } | SumFileError::UnsupportedVersion(_)) => {
            SumFile::latest(Vec::new())
        }
        Err(err) => {
            let _ = sumfile_store::unlock(&cfg.base);
            return Err(err.into());
        }
    };

    let result = (|| {
        let roots = root_actions(cfg)?;
        let tree = resolve_tree(cfg, roots)?;
        let fresh = compute_entries(cfg, &tree, Algo::BestAlgo)?;
        let (merged, report) = merge_entries(&old.entries, fresh, force);

        let sum_file = SumFile::new(old.version, merged);
        let encoded = domain::encode(&sum_file)?;
        sumfile_store::clear(&mut file)?;
        sumfile_store::write(&mut file, &encoded)?;
        Ok(report)
    })();

    sumfile_store::unlock(&cfg.base)?;
    if let Ok(report) = &result {
        info!(
            "record file updated: {} added, {} overridden, {} removed, {} kept",
            report.added, report.overridden, report.removed, report.kept
        );
    }
    result
}

/// Compare the stored checksums against freshly computed ones for the
/// repository in `cfg`.
///
/// # Errors
///
/// Returns [`OperationsError`] if the record file is missing, unreadable, or
/// resolution/computation fails. A non-empty [`VerifyReport::problems`] is a
/// verification failure, not a function error.
pub fn verify(cfg: &Config) -> Result<VerifyReport, OperationsError> {
    let raw = sumfile_store::read(&cfg.base)?;
    let stored = domain::decode(&raw)?;

    let roots = root_actions(cfg)?;
    let tree = resolve_tree(cfg, roots)?;
    let fresh = compute_entries(cfg, &tree, Algo::Sha256)?;

    let whole_repository = cfg.workflow.is_none();
    let problems = compare_entries(&fresh, &stored.entries, whole_repository);
    info!("verified {} action(s), {} problem(s) found", fresh.len(), problems.len());

    Ok(VerifyReport {
        total: fresh.len(),
        problems,
    })
}

/// Render the resolved dependency tree for the repository in `cfg` as an
/// indented, human-readable listing.
///
/// # Errors
///
/// Returns [`OperationsError`] if discovery or resolution fails.
pub fn list(cfg: &Config) -> Result<String, OperationsError> {
    let roots = root_actions(cfg)?;
    let tree = resolve_tree(cfg, roots)?;
    Ok(render_tree(cfg, &tree, tree.root(), 0))
}

fn root_actions(cfg: &Config) -> Result<Vec<ActionIdentity>, OperationsError> {
    let workflows = reader::discover_workflows(&cfg.base)?;

    match (&cfg.workflow, &cfg.job) {
        (Some(workflow_name), Some(job_id)) => {
            let workflow = find_workflow(&workflows, workflow_name)?;
            let job = workflow
                .jobs
                .get(job_id)
                .ok_or_else(|| OperationsError::JobNotFound {
                    workflow: workflow_name.clone(),
                    job: job_id.clone(),
                })?;
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            domain::actions_in_job(job, &mut seen, &mut out)?;
            Ok(out)
        }
        (Some(workflow_name), None) => {
            let workflow = find_workflow(&workflows, workflow_name)?;
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            domain::actions_in_one_workflow(workflow, &mut seen, &mut out)?;
            Ok(out)
        }
        (None, _) => domain::actions_in_workflows(&workflows).map_err(OperationsError::from),
    }
}

fn find_workflow<'a>(
    workflows: &'a [(String, domain::Workflow)],
    name: &str,
) -> Result<&'a domain::Workflow, OperationsError> {
    workflows
        .iter()
        .find(|(path, _)| path == name || path.ends_with(&format!("/{name}")))
        .map(|(_, workflow)| workflow)
        .ok_or_else(|| OperationsError::WorkflowNotFound(name.to_string()))
}

fn resolve_tree(
    cfg: &Config,
    roots: Vec<ActionIdentity>,
) -> Result<ActionTree, OperationsError> {
    let mut materializer = Materializer { cfg };
    resolve(roots, cfg.transitive, &mut materializer)
}

struct Materializer<'a> {
    cfg: &'a Config,
}

impl Materializer<'_> {
    fn materialize(&self, identity: &ActionIdentity) -> Result<PathBuf, OperationsError> {
        let dir = self
            .cfg
            .cache
            .path()
            .join(&identity.owner)
            .join(&identity.project)
            .join(&identity.git_ref);

        if dir.is_dir() {
            debug!("cache hit for {identity}");
            return Ok(dir);
        }
        if self.cfg.offline {
            return Err(OperationsError::OfflineMiss {
                owner: identity.owner.clone(),
                project: identity.project.clone(),
                git_ref: identity.git_ref.clone(),
            });
        }

        debug!("cache miss for {identity}, fetching");
        let repo = Repository {
            owner: identity.owner.clone(),
            project: identity.project.clone(),
            git_ref: identity.git_ref.clone(),
        };
        self.cfg.github.fetch(&repo, &dir)?;
        Ok(dir)
    }
}

impl TransitiveReader for Materializer<'_> {
    type Error = OperationsError;

    fn children(&mut self, identity: &ActionIdentity) -> Result<Vec<ActionIdentity>, Self::Error> {
        let source_dir = self.materialize(identity)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        match identity.kind {
            ActionKind::Action => {
                let action_dir = source_dir.join(&identity.path);
                match reader::discover_manifest(&action_dir)? {
                    ManifestSource::Dockerfile => {}
                    ManifestSource::Manifest(manifest) => {
                        domain::actions_in_manifest(&manifest, &mut seen, &mut out)?;
                    }
                }
            }
            ActionKind::ReusableWorkflow => {
                let workflow_path = source_dir.join(&identity.path);
                let workflow = reader::read_workflow_file(&workflow_path)?;
                domain::actions_in_one_workflow(&workflow, &mut seen, &mut out)?;
            }
            ActionKind::LocalAction | ActionKind::LocalReusableWorkflow => {}
        }

        Ok(out)
    }
}

/// One entry per unique `(owner, project, ref)` triple in the tree, computed
/// with `algo`. Matches [`ActionIdentity::sum_id`]: path is not part of the
/// key, so multiple sub-paths under one upstream ref collapse to one digest.
fn compute_entries(
    cfg: &Config,
    tree: &ActionTree,
    algo: Algo,
) -> Result<Vec<Entry>, OperationsError> {
    let mut by_key: HashMap<(String, String, String), Entry> = HashMap::new();

    for identity in tree.iter() {
        if identity.kind.is_local() {
            continue;
        }
        let key = (
            identity.owner.clone(),
            identity.project.clone(),
            identity.git_ref.clone(),
        );
        if by_key.contains_key(&key) {
            continue;
        }

        let materializer = Materializer { cfg };
        let dir = materializer.materialize(identity)?;
        let digest = checksum::compute(&dir, algo)?;
        let entry = Entry::new(identity.sum_id(), checksum::strip_scheme(&digest));
        by_key.insert(key, entry);
    }

    Ok(by_key.into_values().collect())
}

/// Merge freshly computed entries with the previously stored ones.
///
/// When `force` is false, an old checksum is kept verbatim for any id that
/// still appears among the fresh entries (the reference is unchanged from
/// the computation's point of view, so there is nothing to override); ids
/// that no longer appear are dropped, and ids that are new are added as-is.
/// When `force` is true, every fresh checksum wins regardless of history.
fn merge_entries(old: &[Entry], fresh: Vec<Entry>, force: bool) -> (Vec<Entry>, UpdateReport) {
    let mut report = UpdateReport::default();
    let old_by_id: HashMap<&Vec<String>, &Entry> =
        old.iter().map(|entry| (&entry.id, entry)).collect();
    let fresh_ids: HashSet<&Vec<String>> = fresh.iter().map(|entry| &entry.id).collect();

    let mut merged = Vec::with_capacity(fresh.len());
    for entry in fresh {
        match old_by_id.get(&entry.id) {
            None => {
                report.added += 1;
                merged.push(entry);
            }
            Some(old_entry) if old_entry.checksum == entry.checksum => {
                report.kept += 1;
                merged.push(entry);
            }
            Some(old_entry) => {
                if force {
                    report.overridden += 1;
                    merged.push(entry);
                } else {
                    report.kept += 1;
                    merged.push((*old_entry).clone());
                }
            }
        }
    }

    report.removed = old
        .iter()
        .filter(|entry| !fresh_ids.contains(&entry.id))
        .count() as u32;

    (merged, report)
}

fn compare_entries(fresh: &[Entry], stored: &[Entry], report_redundant: bool) -> Vec<Problem> {
    let stored_by_id: HashMap<&Vec<String>, &Entry> =
        stored.iter().map(|entry| (&entry.id, entry)).collect();
    let fresh_ids: HashSet<&Vec<String>> = fresh.iter().map(|entry| &entry.id).collect();

    let mut problems = Vec::new();
    for entry in fresh {
        match stored_by_id.get(&entry.id) {
            None => problems.push(Problem(format!(
                "no checksum found for {:?}",
                entry.id.join("@")
            ))),
            Some(stored_entry) if stored_entry.checksum != entry.checksum => {
                problems.push(Problem(format!(
                    "checksum mismatch for {:?}",
                    entry.id.join("@")
                )));
            }
            Some(_) => {}
        }
    }

    if report_redundant {
        for entry in stored {
            if !fresh_ids.contains(&entry.id) {
                problems.push(Problem(format!(
                    "redundant checksum for {:?}",
                    entry.id.join("@")
                )));
            }
        }
    }

    problems
}

fn render_tree(cfg: &Config, tree: &ActionTree, node: usize, depth: usize) -> String {
    let mut out = String::new();
    let indent = "  ".repeat(depth);

    let mut children = tree.children(node).to_vec();
    children.sort_by_key(|&child| tree.identity(child).map(ToString::to_string));

    for child in children {
        let Some(identity) = tree.identity(child) else {
            continue;
        };
        out.push_str(&indent);
        out.push_str(&identity.to_string());
        out.push_str(" (");
        out.push_str(identity.kind.as_str());
        if !cfg.offline && !identity.kind.is_local() && cfg.github.archived(&identity.owner, &identity.project) {
            out.push_str(", archived");
        }
        out.push_str(")\n");
        out.push_str(&render_tree(cfg, tree, child, depth + 1));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActionKind;

    fn id(owner: &str, git_ref: &str) -> ActionIdentity {
        ActionIdentity {
            owner: owner.to_string(),
            project: "project".to_string(),
            path: String::new(),
            git_ref: git_ref.to_string(),
            kind: ActionKind::Action,
        }
    }

    #[test]
    fn merge_keeps_old_checksum_without_force() {
        let old = vec![Entry::new(id("a", "v1").sum_id(), "old".to_string())];
        let fresh = vec![Entry::new(id("a", "v1").sum_id(), "new".to_string())];
        let (merged, report) = merge_entries(&old, fresh, false);
        assert_eq!(merged[0].checksum, "old");
        assert_eq!(report.kept, 1);
        assert_eq!(report.overridden, 0);
    }

    #[test]
    fn merge_overrides_with_force() {
        let old = vec![Entry::new(id("a", "v1").sum_id(), "old".to_string())];
        let fresh = vec![Entry::new(id("a", "v1").sum_id(), "new".to_string())];
        let (merged, report) = merge_entries(&old, fresh, true);
        assert_eq!(merged[0].checksum, "new");
        assert_eq!(report.overridden, 1);
    }

    #[test]
    fn merge_counts_added_and_removed() {
        let old = vec![Entry::new(id("a", "v1").sum_id(), "old".to_string())];
        let fresh = vec![Entry::new(id("b", "v1").sum_id(), "new".to_string())];
        let (merged, report) = merge_entries(&old, fresh, false);
        assert_eq!(merged.len(), 1);
        assert_eq!(report.added, 1);
        assert_eq!(report.removed, 1);
    }

    #[test]
    fn compare_reports_missing_and_mismatched() {
        let fresh = vec![
            Entry::new(id("a", "v1").sum_id(), "x".to_string()),
            Entry::new(id("b", "v1").sum_id(), "y".to_string()),
        ];
        let stored = vec![Entry::new(id("a", "v1").sum_id(), "different".to_string())];
        let problems = compare_entries(&fresh, &stored, false);
        assert_eq!(problems.len(), 2);
    }

    #[test]
    fn compare_reports_redundant_only_when_requested() {
        let fresh = vec![Entry::new(id("a", "v1").sum_id(), "x".to_string())];
        let stored = vec![
            Entry::new(id("a", "v1").sum_id(), "x".to_string()),
            Entry::new(id("b", "v1").sum_id(), "y".to_string()),
        ];
        assert!(compare_entries(&fresh, &stored, false).is_empty());
        assert_eq!(compare_entries(&fresh, &stored, true).len(), 1);
    }
}
