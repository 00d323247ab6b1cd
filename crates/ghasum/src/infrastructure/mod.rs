//! File system, network, and process-boundary I/O. Every module here
//! implements a domain trait or provides concrete data for the domain layer
//! to act on; none of the decision logic lives here.

pub mod cache;
pub mod checksum;
pub mod github;
pub mod reader;
pub mod repo;
pub mod sumfile_store;

pub use cache::{Cache, CacheBuilder, CacheError};
pub use checksum::{Algo, ChecksumError};
pub use github::{GithubClient, GithubError, Repository};
pub use reader::{discover_manifest, discover_workflows, read_workflow_file, ManifestSource, ReaderError, WORKFLOWS_DIR};
pub use repo::{find_root, RepoError};
pub use sumfile_store::{StoreError, RECORD_FILE_PATH};
