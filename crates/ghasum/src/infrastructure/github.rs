//! GitHub-facing I/O: materialising a repository at a ref into a local
//! directory (C6), and checking whether a repository is archived (C7).

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use flate2::read::GzDecoder;
use log::debug;
use serde::Deserialize;
use thiserror::Error;

const API_BASE: &str = "https://api.github.com";
const CODELOAD_BASE: &str = "https://codeload.github.com";
const USER_AGENT: &str = "ghasum";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// A repository and, for fetching, the ref to materialise.
#[derive(Debug, Clone)]
pub struct Repository {
    pub owner: String,
    pub project: String,
    pub git_ref: String,
}

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("GET {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("GET {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error("GET {url} response malformed: {source}")]
    Malformed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("extracting archive for {owner}/{project}@{git_ref}: {source}")]
    Extract {
        owner: String,
        project: String,
        git_ref: String,
        #[source]
        source: std::io::Error,
    },
}

/// A thin, timeout-bound `reqwest::blocking` client carrying an optional
/// bearer token, shared by the fetcher and the metadata probe.
pub struct GithubClient {
    client: reqwest::blocking::Client,
    token: Option<String>,
}

impl GithubClient {
    /// Build a client, optionally authenticated with a bearer token (read by
    /// the caller from `GH_TOKEN`/`GITHUB_TOKEN`).
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::Client`] if the underlying HTTP client cannot
    /// be built (TLS backend failure, broken resolver configuration).
    pub fn new(token: Option<String>) -> Result<Self, GithubError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(GithubError::Client)?;
        Ok(Self { client, token })
    }

    /// Download and extract the repository's source at `repo.git_ref` into
    /// `dest`, which must not already exist.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError`] if the download fails, the server responds
    /// with a non-success status, or the archive cannot be extracted.
    pub fn fetch(&self, repo: &Repository, dest: &Path) -> Result<(), GithubError> {
        let url = format!(
            "{CODELOAD_BASE}/{}/{}/tar.gz/{}",
            repo.owner, repo.project, repo.git_ref
        );
        debug!("fetching {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().map_err(|source| GithubError::Request {
            url: url.clone(),
            source,
        })?;
        if !response.status().is_success() {
            return Err(GithubError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|source| GithubError::Malformed {
            url: url.clone(),
            source,
        })?;

        extract_tarball(&bytes, dest).map_err(|source| GithubError::Extract {
            owner: repo.owner.clone(),
            project: repo.project.clone(),
            git_ref: repo.git_ref.clone(),
            source,
        })
    }

    /// Whether `owner/project` is archived on GitHub. Any failure to reach
    /// the API or parse its response is treated as "unknown", not an error:
    /// archival status is advisory metadata for `list`, never load-bearing
    /// for checksum computation or verification.
    #[must_use]
    pub fn archived(&self, owner: &str, project: &str) -> bool {
        self.try_archived(owner, project).unwrap_or(false)
    }

    fn try_archived(&self, owner: &str, project: &str) -> Result<bool, GithubError> {
        let url = format!("{API_BASE}/repos/{owner}/{project}");
        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().map_err(|source| GithubError::Request {
            url: url.clone(),
            source,
        })?;
        if !response.status().is_success() {
            return Err(GithubError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let metadata: RepoMetadata = response.json().map_err(|source| GithubError::Malformed {
            url,
            source,
        })?;
        Ok(metadata.archived)
    }
}

#[derive(Debug, Deserialize)]
struct RepoMetadata {
    archived: bool,
}

/// GitHub's codeload tarballs wrap their contents in a single top-level
/// `<project>-<ref>/` directory; that wrapper is stripped so `dest` holds the
/// repository contents directly.
fn extract_tarball(bytes: &[u8], dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;

    let decoder = GzDecoder::new(Cursor::new(bytes));
    let mut archive = tar::Archive::new(decoder);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let mut components = path.components();
        components.next();
        let relative: std::path::PathBuf = components.collect();
        if relative.as_os_str().is_empty() {
            continue;
        }
        entry.unpack(dest.join(relative))?;
    }

    Ok(())
}
