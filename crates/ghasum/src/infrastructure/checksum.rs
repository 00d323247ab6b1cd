//! Content-addressed directory checksums ("C4"). Computing a digest for a
//! directory walks every regular file, hashes each one individually, then
//! hashes a canonical manifest of `(mode, hash, path)` triples so that
//! renames, permission changes, and content changes are all detected.

use std::fs;
use std::io::Read;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// The scheme tag prefixed to every digest string, naming the hash algorithm
/// the manifest hash itself (not the per-file hashes) was computed with.
const SCHEME_TAG: &str = "h1:";

/// A supported checksum algorithm. `BestAlgo` is an alias for whichever
/// algorithm this crate considers strongest today; it may point at a
/// different variant in a future release while `Sha256` never will, which is
/// why verification always pins `Sha256` explicitly rather than `BestAlgo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algo {
    Sha256,
    BestAlgo,
}

#[derive(Debug, Error)]
pub enum ChecksumError {
    #[error("reading directory {path}: {source}")]
    ReadDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("reading file {path}: {source}")]
    ReadFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Compute the digest of every regular file under `dir`, and of `dir` itself
/// as a whole, using `algo`.
///
/// # Errors
///
/// Returns [`ChecksumError`] if any file or directory under `dir` cannot be
/// read.
pub fn compute(dir: &Path, algo: Algo) -> Result<String, ChecksumError> {
    let _ = algo; // both variants currently resolve to the same hash function.

    let mut paths = Vec::new();
    collect_files(dir, dir, &mut paths)?;
    paths.sort();

    let mut manifest = String::new();
    for relative in &paths {
        let absolute = dir.join(relative);
        let mode = file_mode(&absolute);
        let digest = hash_file(&absolute)?;
        manifest.push_str(&format!("{mode:o}  {digest}  {relative}\n"));
    }

    let mut hasher = Sha256::new();
    hasher.update(manifest.as_bytes());
    let digest = hasher.finalize();

    Ok(format!("{SCHEME_TAG}{}", BASE64_STANDARD.encode(digest)))
}

/// Strip the `h1:` scheme tag from a digest string before storing it, since
/// the sum file's own format does not repeat the tag per entry (every entry
/// in a given file version uses the same scheme).
#[must_use]
pub fn strip_scheme(digest: &str) -> String {
    digest
        .strip_prefix(SCHEME_TAG)
        .unwrap_or(digest)
        .to_string()
}

/// Re-attach the `h1:` scheme tag to a stored digest for comparison against
/// a freshly computed one.
#[must_use]
pub fn with_scheme(stored: &str) -> String {
    format!("{SCHEME_TAG}{stored}")
}

fn collect_files(
    root: &Path,
    dir: &Path,
    out: &mut Vec<String>,
) -> Result<(), ChecksumError> {
    let entries = fs::read_dir(dir).map_err(|source| ChecksumError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| ChecksumError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| ChecksumError::ReadDir {
            path: path.clone(),
            source,
        })?;

        if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if file_type.is_file() {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            out.push(relative);
        }
    }
    Ok(())
}

fn hash_file(path: &Path) -> Result<String, ChecksumError> {
    let mut file = fs::File::open(path).map_err(|source| ChecksumError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|source| ChecksumError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(BASE64_STANDARD.encode(hasher.finalize()))
}

#[cfg(unix)]
fn file_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode())
        .unwrap_or(0o644)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> u32 {
    0o644
}
