use thiserror::Error;

/// Errors and classifiers produced while parsing a `uses` value.
///
/// [`Self::LocalAction`] and [`Self::DockerUses`] are not failures: callers
/// match on them to decide control flow (assign a local kind, or skip the
/// reference entirely) rather than propagating them up.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UsesError {
    #[error("uses is a Docker Hub/Container Registry action")]
    DockerUses,

    #[error("invalid uses value")]
    InvalidUses,

    #[error("invalid repository in uses")]
    InvalidUsesRepo,

    #[error("invalid repository path in uses")]
    InvalidUsesPath,

    #[error("uses is a local action")]
    LocalAction,
}

/// A `uses` value parsed into its constituent parts, without a [`super::ActionKind`]:
/// the same syntactic shape can be an action or a reusable workflow depending
/// on where it appears, so the caller assigns the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUses {
    pub owner: String,
    pub project: String,
    pub path: String,
    pub git_ref: String,
}

/// Parse a `uses:` value into its owner/project/path/ref parts.
///
/// Classification order:
/// 1. `./`-prefixed → [`UsesError::LocalAction`].
/// 2. `docker://`-prefixed → [`UsesError::DockerUses`].
/// 3. Must contain exactly one `@`, otherwise [`UsesError::InvalidUses`].
/// 4. `owner`/`rest` split on the first `/`; both non-empty, otherwise
///    [`UsesError::InvalidUsesRepo`].
/// 5. If `rest` contains a `/`, split into `project`/`path` (both non-empty,
///    otherwise [`UsesError::InvalidUsesPath`]); otherwise `path` is empty.
/// 6. `owner` and `project` are lower-cased; `path` and `git_ref` are kept
///    verbatim.
///
/// # Errors
///
/// Returns the classifier/error matching the rule that rejected the input.
pub fn parse_uses(uses: &str) -> Result<ParsedUses, UsesError> {
    if uses.starts_with("./") {
        return Err(UsesError::LocalAction);
    }
    if uses.starts_with("docker://") {
        return Err(UsesError::DockerUses);
    }

    if uses.matches('@').count() != 1 {
        return Err(UsesError::InvalidUses);
    }
    let Some((repo, git_ref)) = uses.split_once('@') else {
        return Err(UsesError::InvalidUses);
    };
    if repo.is_empty() || git_ref.is_empty() {
        return Err(UsesError::InvalidUses);
    }

    let (owner, rest) = match repo.split_once('/') {
        Some((owner, rest)) if !owner.is_empty() && !rest.is_empty() => (owner, rest),
        _ => return Err(UsesError::InvalidUsesRepo),
    };

    let (project, path) = match rest.split_once('/') {
        Some((project, path)) if !project.is_empty() && !path.is_empty() => (project, path),
        Some(_) => return Err(UsesError::InvalidUsesPath),
        None => (rest, ""),
    };

    Ok(ParsedUses {
        owner: owner.to_lowercase(),
        project: project.to_lowercase(),
        path: path.to_string(),
        git_ref: git_ref.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_project_ref() {
        let parsed = parse_uses("actions/checkout@v4").unwrap();
        assert_eq!(parsed.owner, "actions");
        assert_eq!(parsed.project, "checkout");
        assert_eq!(parsed.path, "");
        assert_eq!(parsed.git_ref, "v4");
    }

    #[test]
    fn parses_with_sub_path() {
        let parsed = parse_uses("owner/project/sub/path@v1").unwrap();
        assert_eq!(parsed.owner, "owner");
        assert_eq!(parsed.project, "project");
        assert_eq!(parsed.path, "sub/path");
        assert_eq!(parsed.git_ref, "v1");
    }

    #[test]
    fn lower_cases_owner_and_project_only() {
        let parsed = parse_uses("Owner/Project/Sub@RefName").unwrap();
        assert_eq!(parsed.owner, "owner");
        assert_eq!(parsed.project, "project");
        assert_eq!(parsed.path, "Sub");
        assert_eq!(parsed.git_ref, "RefName");
    }

    #[test]
    fn rejects_local_action() {
        assert_eq!(parse_uses("./local/action"), Err(UsesError::LocalAction));
    }

    #[test]
    fn rejects_docker_uses() {
        assert_eq!(
            parse_uses("docker://alpine:3.18"),
            Err(UsesError::DockerUses)
        );
    }

    #[test]
    fn rejects_missing_at() {
        assert_eq!(
            parse_uses("actions/checkout"),
            Err(UsesError::InvalidUses)
        );
    }

    #[test]
    fn rejects_multiple_at() {
        assert_eq!(
            parse_uses("actions/checkout@v4@extra"),
            Err(UsesError::InvalidUses)
        );
    }

    #[test]
    fn rejects_missing_repo_slash() {
        assert_eq!(parse_uses("actions@v4"), Err(UsesError::InvalidUsesRepo));
    }

    #[test]
    fn rejects_empty_owner() {
        assert_eq!(parse_uses("/checkout@v4"), Err(UsesError::InvalidUsesRepo));
    }

    #[test]
    fn rejects_trailing_slash_path() {
        assert_eq!(
            parse_uses("owner/project/@v1"),
            Err(UsesError::InvalidUsesPath)
        );
    }

    #[test]
    fn never_panics_on_arbitrary_input() {
        let inputs = [
            "", "@", "//@@", "a/b/c/d/e@f", "./", "docker://", "a@", "@b", "a/@b",
        ];
        for input in inputs {
            let _ = parse_uses(input);
        }
    }
}
