//! The record file on disk: `.github/workflows/gha.sum`, relative to a
//! repository root. Left read-only between operations as a soft lock
//! against accidental edits; flipped writable only for the duration of a
//! mutation.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const RECORD_FILE_PATH: &str = ".github/workflows/gha.sum";

#[cfg(unix)]
const LOCKED_MODE: u32 = 0o444;
#[cfg(unix)]
const UNLOCKED_MODE: u32 = 0o644;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ghasum is already initialized for this repository")]
    Initialized,
    #[error("ghasum is not initialized for this repository")]
    NotInitialized,
    #[error("could not create the record file: {0}")]
    Create(#[source] std::io::Error),
    #[error("could not open the record file: {0}")]
    Open(#[source] std::io::Error),
    #[error("could not read the record file: {0}")]
    Read(#[source] std::io::Error),
    #[error("could not write the record file: {0}")]
    Write(#[source] std::io::Error),
    #[error("could not remove the record file: {0}")]
    Remove(#[source] std::io::Error),
    #[error("could not change the record file's permissions: {0}")]
    Unlock(#[source] std::io::Error),
}

fn record_path(base: &Path) -> PathBuf {
    base.join(RECORD_FILE_PATH)
}

/// Create the record file exclusively, failing if it already exists.
///
/// # Errors
///
/// Returns [`StoreError::Initialized`] if the file is already present, or
/// [`StoreError::Create`] for any other I/O failure (including a missing
/// parent directory).
pub fn create(base: &Path) -> Result<File, StoreError> {
    let path = record_path(base);
    if path.exists() {
        return Err(StoreError::Initialized);
    }

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(StoreError::Create)
}

/// Open the record file for read-write access and lock it (mark read-only)
/// for the duration of the caller's mutation.
///
/// # Errors
///
/// Returns [`StoreError::NotInitialized`] if the file does not exist, or
/// [`StoreError::Open`]/[`StoreError::Unlock`] for other I/O failures. The
/// naming of the latter mirrors `unlock`: both functions only ever change
/// this one mode bit.
pub fn open(base: &Path) -> Result<File, StoreError> {
    let path = record_path(base);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotInitialized
            } else {
                StoreError::Open(source)
            }
        })?;

    set_mode(&path, LOCKED_MODE)?;
    Ok(file)
}

/// Read the full contents of the record file without opening it for
/// mutation.
///
/// # Errors
///
/// Returns [`StoreError::NotInitialized`] if the file does not exist, or
/// [`StoreError::Read`] for other I/O failures.
pub fn read(base: &Path) -> Result<String, StoreError> {
    let path = record_path(base);
    fs::read_to_string(&path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotInitialized
        } else {
            StoreError::Read(source)
        }
    })
}

/// Truncate the record file back to empty, ready for a fresh write. Assumes
/// `file` is already open for writing.
///
/// # Errors
///
/// Returns [`StoreError::Write`] if the seek or truncate fails.
pub fn clear(file: &mut File) -> Result<(), StoreError> {
    file.seek(SeekFrom::Start(0)).map_err(StoreError::Write)?;
    file.set_len(0).map_err(StoreError::Write)?;
    Ok(())
}

/// Write `content` to `file` at its current position.
///
/// # Errors
///
/// Returns [`StoreError::Write`] on I/O failure.
pub fn write(file: &mut File, content: &str) -> Result<(), StoreError> {
    file.write_all(content.as_bytes()).map_err(StoreError::Write)
}

/// Restore the record file's mode bits to writable after a mutation.
///
/// # Errors
///
/// Returns [`StoreError::Unlock`] on I/O failure.
pub fn unlock(base: &Path) -> Result<(), StoreError> {
    set_mode(&record_path(base), UNLOCKED_MODE)
}

/// Remove the record file entirely (used to roll back a failed `init`).
///
/// # Errors
///
/// Returns [`StoreError::Remove`] on I/O failure.
pub fn remove(base: &Path) -> Result<(), StoreError> {
    fs::remove_file(record_path(base)).map_err(StoreError::Remove)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(StoreError::Unlock)
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(test)]
fn read_all(mut file: File) -> std::io::Result<String> {
    let mut buf = String::new();
    file.read_to_string(&mut buf)?;
    Ok(buf)
}
