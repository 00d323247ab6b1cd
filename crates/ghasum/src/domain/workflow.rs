//! Pure structural extraction of action references from parsed workflow and
//! manifest documents. No I/O: callers in `infrastructure` read the bytes and
//! hand them here already deserialised.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use super::identity::{ActionIdentity, ActionKind};
use super::parse::{parse_uses, UsesError};

/// A step within a job or a composite action's `runs.steps`.
#[derive(Debug, Default, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub uses: Option<String>,
}

/// A single job within a workflow.
#[derive(Debug, Default, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub uses: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A `.github/workflows/*.yml` document.
#[derive(Debug, Default, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub jobs: HashMap<String, Job>,
}

/// The `runs` block of an `action.yml`/`action.yaml` manifest. Only
/// composite actions (`using: "composite"`) carry steps with further `uses`
/// references; other `using` values (`node20`, `docker`, ...) have none.
#[derive(Debug, Default, Deserialize)]
pub struct Runs {
    #[serde(default)]
    pub using: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// An `action.yml`/`action.yaml` manifest document.
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub runs: Runs,
}

/// Extract every action reference from a set of workflow documents, keyed by
/// their source path (used only for error context).
///
/// # Errors
///
/// Returns the first non-classifier [`UsesError`] encountered, annotated with
/// the workflow path it came from.
pub fn actions_in_workflows(
    workflows: &[(String, Workflow)],
) -> Result<Vec<ActionIdentity>, WorkflowUsesError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (path, workflow) in workflows {
        actions_in_one_workflow(workflow, &mut seen, &mut out)
            .map_err(|source| WorkflowUsesError {
                path: path.clone(),
                source,
            })?;
    }
    Ok(out)
}

/// Extract action references from a single workflow, deduplicating against
/// `seen` and appending newly-seen identities to `out`.
///
/// # Errors
///
/// Returns the first non-classifier [`UsesError`] encountered.
pub fn actions_in_one_workflow(
    workflow: &Workflow,
    seen: &mut HashSet<ActionIdentity>,
    out: &mut Vec<ActionIdentity>,
) -> Result<(), UsesError> {
    let mut job_ids: Vec<&String> = workflow.jobs.keys().collect();
    job_ids.sort();
    for job_id in job_ids {
        let job = &workflow.jobs[job_id];
        actions_in_job(job, seen, out)?;
    }
    Ok(())
}

/// Extract action references from a single job: its own `uses:` (a reusable
/// workflow call) plus every step's `uses:` (an action call).
///
/// # Errors
///
/// Returns the first non-classifier [`UsesError`] encountered.
pub fn actions_in_job(
    job: &Job,
    seen: &mut HashSet<ActionIdentity>,
    out: &mut Vec<ActionIdentity>,
) -> Result<(), UsesError> {
    if let Some(uses) = &job.uses {
        push_uses(
            uses,
            ActionKind::ReusableWorkflow,
            ActionKind::LocalReusableWorkflow,
            seen,
            out,
        )?;
    }
    for step in &job.steps {
        actions_in_step(step, seen, out)?;
    }
    Ok(())
}

/// Extract the action reference from a single step, if it has one.
///
/// # Errors
///
/// Returns the first non-classifier [`UsesError`] encountered.
pub fn actions_in_step(
    step: &Step,
    seen: &mut HashSet<ActionIdentity>,
    out: &mut Vec<ActionIdentity>,
) -> Result<(), UsesError> {
    let Some(uses) = &step.uses else {
        return Ok(());
    };
    push_uses(uses, ActionKind::Action, ActionKind::LocalAction, seen, out)
}

/// Extract every action reference from a manifest's `runs.steps`. Manifests
/// whose `using` isn't `composite` simply carry no steps, so this naturally
/// yields nothing for them without needing to check `using` itself.
///
/// # Errors
///
/// Returns the first non-classifier [`UsesError`] encountered.
pub fn actions_in_manifest(
    manifest: &Manifest,
    seen: &mut HashSet<ActionIdentity>,
    out: &mut Vec<ActionIdentity>,
) -> Result<(), UsesError> {
    for step in &manifest.runs.steps {
        actions_in_step(step, seen, out)?;
    }
    Ok(())
}

/// Parse `uses`, classify it, and push a new identity onto `out` if it is not
/// already in `seen`. `DockerUses` is silently skipped (not an error, not an
/// identity); `LocalAction` produces a local-kind identity carrying the
/// dot-relative path verbatim, with no upstream owner/project/ref since none
/// exists for a same-repository reference.
fn push_uses(
    uses: &str,
    remote_kind: ActionKind,
    local_kind: ActionKind,
    seen: &mut HashSet<ActionIdentity>,
    out: &mut Vec<ActionIdentity>,
) -> Result<(), UsesError> {
    let identity = match parse_uses(uses) {
        Ok(parsed) => ActionIdentity {
            owner: parsed.owner,
            project: parsed.project,
            path: parsed.path,
            git_ref: parsed.git_ref,
            kind: remote_kind,
        },
        Err(UsesError::LocalAction) => ActionIdentity {
            owner: String::new(),
            project: String::new(),
            path: uses.trim_start_matches("./").to_string(),
            git_ref: String::new(),
            kind: local_kind,
        },
        Err(UsesError::DockerUses) => return Ok(()),
        Err(other) => return Err(other),
    };
    if seen.insert(identity.clone()) {
        out.push(identity);
    }
    Ok(())
}

/// A [`UsesError`] annotated with the workflow path it was found in.
#[derive(Debug, thiserror::Error)]
#[error("{path}: {source}")]
pub struct WorkflowUsesError {
    pub path: String,
    #[source]
    pub source: UsesError,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow_with_step(uses: &str) -> Workflow {
        let mut jobs = HashMap::new();
        jobs.insert(
            "build".to_string(),
            Job {
                uses: None,
                steps: vec![Step {
                    uses: Some(uses.to_string()),
                }],
            },
        );
        Workflow { jobs }
    }

    #[test]
    fn extracts_step_action() {
        let workflow = workflow_with_step("actions/checkout@v4");
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        actions_in_one_workflow(&workflow, &mut seen, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ActionKind::Action);
        assert_eq!(out[0].owner, "actions");
    }

    #[test]
    fn extracts_job_level_reusable_workflow() {
        let mut jobs = HashMap::new();
        jobs.insert(
            "call".to_string(),
            Job {
                uses: Some("owner/project/.github/workflows/reusable.yml@main".to_string()),
                steps: vec![],
            },
        );
        let workflow = Workflow { jobs };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        actions_in_one_workflow(&workflow, &mut seen, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ActionKind::ReusableWorkflow);
    }

    #[test]
    fn skips_docker_uses_without_error() {
        let workflow = workflow_with_step("docker://alpine:3.18");
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        actions_in_one_workflow(&workflow, &mut seen, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn classifies_local_action_without_error() {
        let workflow = workflow_with_step("./local/action");
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        actions_in_one_workflow(&workflow, &mut seen, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ActionKind::LocalAction);
        assert_eq!(out[0].path, "local/action");
        assert_eq!(out[0].owner, "");
    }

    #[test]
    fn propagates_invalid_uses_with_path_context() {
        let workflow = workflow_with_step("not-a-valid-uses-value");
        let workflows = vec![("build.yml".to_string(), workflow)];
        let err = actions_in_workflows(&workflows).unwrap_err();
        assert_eq!(err.path, "build.yml");
        assert_eq!(err.source, UsesError::InvalidUses);
    }

    #[test]
    fn deduplicates_identical_references_across_steps_and_jobs() {
        let mut jobs = HashMap::new();
        jobs.insert(
            "a".to_string(),
            Job {
                uses: None,
                steps: vec![Step {
                    uses: Some("actions/checkout@v4".to_string()),
                }],
            },
        );
        jobs.insert(
            "b".to_string(),
            Job {
                uses: None,
                steps: vec![Step {
                    uses: Some("actions/checkout@v4".to_string()),
                }],
            },
        );
        let workflow = Workflow { jobs };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        actions_in_one_workflow(&workflow, &mut seen, &mut out).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn composite_manifest_yields_step_actions() {
        let manifest = Manifest {
            runs: Runs {
                using: "composite".to_string(),
                steps: vec![Step {
                    uses: Some("actions/setup-node@v4".to_string()),
                }],
            },
        };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        actions_in_manifest(&manifest, &mut seen, &mut out).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn non_composite_manifest_yields_nothing() {
        let manifest = Manifest {
            runs: Runs {
                using: "node20".to_string(),
                steps: vec![],
            },
        };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        actions_in_manifest(&manifest, &mut seen, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
