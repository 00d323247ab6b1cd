use std::fmt;

/// The kind of reusable CI component an [`ActionIdentity`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// A path in a repository with an `action.yml`/`action.yaml`/`Dockerfile` manifest.
    Action,
    /// A workflow file referenced from another workflow's job `uses:`.
    ReusableWorkflow,
    /// A `./`-prefixed action local to the scanned repository.
    LocalAction,
    /// A `./`-prefixed reusable workflow local to the scanned repository.
    LocalReusableWorkflow,
}

impl ActionKind {
    #[must_use]
    pub fn is_local(self) -> bool {
        matches!(self, Self::LocalAction | Self::LocalReusableWorkflow)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::ReusableWorkflow => "reusable workflow",
            Self::LocalAction => "local action",
            Self::LocalReusableWorkflow => "local reusable workflow",
        }
    }
}

/// An immutable identity for a specific version of a GitHub Action or
/// reusable workflow: `(owner, project, path, git_ref, kind)`.
///
/// `owner` and `project` are normalised to lower case; `path` and `git_ref`
/// preserve the case of the original `uses` value. Two identities are equal
/// iff all five fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionIdentity {
    pub owner: String,
    pub project: String,
    pub path: String,
    pub git_ref: String,
    pub kind: ActionKind,
}

impl ActionIdentity {
    /// The id this identity is stored under in a sum file: always exactly
    /// `owner/project` followed by `git_ref`, regardless of `path`. Multiple
    /// sub-paths under the same `(owner, project, git_ref)` collapse to one
    /// checksum entry, since the digest covers the whole upstream repository
    /// at that ref, not any one sub-path.
    #[must_use]
    pub fn sum_id(&self) -> Vec<String> {
        vec![format!("{}/{}", self.owner, self.project), self.git_ref.clone()]
    }

    /// The `(owner, project, git_ref)` triple that a cache entry and a
    /// checksum entry are both keyed by.
    #[must_use]
    pub fn cache_key(&self) -> (&str, &str, &str) {
        (&self.owner, &self.project, &self.git_ref)
    }
}

impl fmt::Display for ActionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}/{}@{}", self.owner, self.project, self.git_ref)
        } else {
            write!(
                f,
                "{}/{}/{}@{}",
                self.owner, self.project, self.path, self.git_ref
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_path() {
        let id = ActionIdentity {
            owner: "actions".to_string(),
            project: "checkout".to_string(),
            path: String::new(),
            git_ref: "v4".to_string(),
            kind: ActionKind::Action,
        };
        assert_eq!(id.to_string(), "actions/checkout@v4");
    }

    #[test]
    fn display_with_path() {
        let id = ActionIdentity {
            owner: "actions".to_string(),
            project: "checkout".to_string(),
            path: "sub/dir".to_string(),
            git_ref: "v4".to_string(),
            kind: ActionKind::Action,
        };
        assert_eq!(id.to_string(), "actions/checkout/sub/dir@v4");
    }

    #[test]
    fn sum_id_ignores_path() {
        let with_path = ActionIdentity {
            owner: "actions".to_string(),
            project: "checkout".to_string(),
            path: "sub".to_string(),
            git_ref: "v4".to_string(),
            kind: ActionKind::Action,
        };
        let without_path = ActionIdentity {
            path: String::new(),
            ..with_path.clone()
        };
        assert_eq!(with_path.sum_id(), without_path.sum_id());
        assert_eq!(with_path.sum_id(), vec!["actions/checkout", "v4"]);
    }

    #[test]
    fn equality_requires_all_five_fields() {
        let base = ActionIdentity {
            owner: "a".to_string(),
            project: "b".to_string(),
            path: String::new(),
            git_ref: "v1".to_string(),
            kind: ActionKind::Action,
        };
        let different_kind = ActionIdentity {
            kind: ActionKind::ReusableWorkflow,
            ..base.clone()
        };
        assert_ne!(base, different_kind);
    }
}
