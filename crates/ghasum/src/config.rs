//! Runtime settings: defaults, layered under the environment, layered under
//! whatever a CLI frontend's flags provide. This module only builds an
//! [`OperationsConfig`]; it never runs an operation itself.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::infrastructure::{Cache, CacheBuilder, CacheError, GithubClient, GithubError};
use crate::operations::Config as OperationsConfig;

/// Flags a CLI frontend collects from its own argument parser, named after
/// the long flag each comes from.
#[derive(Debug, Clone, Default)]
pub struct CliFlags {
    /// `-cache <dir>`: use a persistent cache at this location instead of
    /// the default `~/.ghasum`. Ignored if `no_cache` is set.
    pub cache: Option<PathBuf>,
    /// `-no-cache`: use a single-run ephemeral cache instead of a persistent one.
    pub no_cache: bool,
    /// `-no-evict`: skip evicting stale cache entries on startup.
    pub no_evict: bool,
    /// `-no-transitive`: only resolve the actions a workflow uses directly.
    pub no_transitive: bool,
    /// `-offline`: fail instead of fetching on a cache miss.
    pub offline: bool,
    pub workflow: Option<String>,
    pub job: Option<String>,
}

/// Settings resolved from the environment, independent of any one
/// invocation's flags.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub github_token: Option<String>,
}

impl Settings {
    /// Load settings from the environment. `GH_TOKEN` takes priority over
    /// `GITHUB_TOKEN` when both are set, matching the order most GitHub CLI
    /// tooling checks them in.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            github_token: env::var("GH_TOKEN").or_else(|_| env::var("GITHUB_TOKEN")).ok(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Github(#[from] GithubError),
}

/// Build an [`OperationsConfig`] for the repository at `base`, from
/// environment settings layered under `flags`.
///
/// # Errors
///
/// Returns [`ConfigError`] if the cache directory cannot be created/located
/// or the HTTP client cannot be built.
pub fn resolve(base: PathBuf, flags: CliFlags) -> Result<OperationsConfig, ConfigError> {
    let settings = Settings::from_env();

    let mut builder = CacheBuilder::new()
        .ephemeral(flags.no_cache)
        .evict(!flags.no_evict);
    if let Some(location) = flags.cache {
        builder = builder.location(location);
    }
    let cache: Cache = builder.build()?;

    let github = GithubClient::new(settings.github_token.clone())?;

    Ok(OperationsConfig {
        base,
        workflow: flags.workflow,
        job: flags.job,
        cache,
        github,
        offline: flags.offline,
        transitive: !flags.no_transitive,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_has_no_token() {
        let settings = Settings::default();
        assert!(settings.github_token.is_none());
    }

    #[test]
    fn settings_prefers_gh_token_over_github_token() {
        unsafe {
            env::set_var("GH_TOKEN", "gh-value");
            env::set_var("GITHUB_TOKEN", "github-value");
        }
        let settings = Settings::from_env();
        assert_eq!(settings.github_token.as_deref(), Some("gh-value"));
        unsafe {
            env::remove_var("GH_TOKEN");
            env::remove_var("GITHUB_TOKEN");
        }
    }

    #[test]
    fn settings_falls_back_to_github_token() {
        unsafe {
            env::remove_var("GH_TOKEN");
            env::set_var("GITHUB_TOKEN", "github-value");
        }
        let settings = Settings::from_env();
        assert_eq!(settings.github_token.as_deref(), Some("github-value"));
        unsafe {
            env::remove_var("GITHUB_TOKEN");
        }
    }

    #[test]
    fn resolve_builds_an_ephemeral_config_without_touching_persistent_cache() {
        let dir = tempfile::tempdir().unwrap();
        let flags = CliFlags {
            no_cache: true,
            ..Default::default()
        };
        let config = resolve(dir.path().to_path_buf(), flags).unwrap();
        assert_eq!(config.base, dir.path());
        assert!(!config.offline);
        assert!(config.transitive);
    }

    #[test]
    fn resolve_honors_explicit_cache_location() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let flags = CliFlags {
            cache: Some(cache_dir.clone()),
            no_evict: true,
            ..Default::default()
        };
        let config = resolve(dir.path().to_path_buf(), flags).unwrap();
        assert_eq!(config.cache.path(), cache_dir);
    }
}
