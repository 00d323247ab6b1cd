//! Codec for the versioned, line-oriented sum file format. Pure domain logic:
//! no file handles here, only `&str`/`String` in and out. See
//! [`crate::infrastructure::sumfile_store`] for the file on disk.

use std::collections::HashSet;

use thiserror::Error;

/// The sum file format version this crate writes. Decoding any other version
/// fails with [`SumFileError::UnsupportedVersion`]; this crate currently only
/// understands version 1.
pub const VERSION_LATEST: u32 = 1;

const ID_SEPARATOR: char = '@';

/// One checksum record: an id (one or more parts, joined with `@` on the
/// wire) and its checksum string. Neither may contain whitespace; id parts
/// may not contain `@`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Entry {
    pub id: Vec<String>,
    pub checksum: String,
}

impl Entry {
    #[must_use]
    pub fn new(id: Vec<String>, checksum: String) -> Self {
        Self { id, checksum }
    }

    fn joined_id(&self) -> String {
        self.id.join(&ID_SEPARATOR.to_string())
    }
}

/// A decoded sum file: its version and entries, sorted by joined id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SumFile {
    pub version: u32,
    pub entries: Vec<Entry>,
}

impl SumFile {
    #[must_use]
    pub fn new(version: u32, mut entries: Vec<Entry>) -> Self {
        entries.sort_by(|a, b| a.joined_id().cmp(&b.joined_id()));
        Self { version, entries }
    }

    #[must_use]
    pub fn latest(entries: Vec<Entry>) -> Self {
        Self::new(VERSION_LATEST, entries)
    }

    /// Look up an entry by its id parts.
    #[must_use]
    pub fn find(&self, id: &[String]) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SumFileError {
    #[error("missing version header")]
    MissingHeader,
    #[error("duplicate version header on line {line}")]
    DuplicateHeader { line: usize },
    #[error("malformed version header on line {line}: {text:?}")]
    MalformedHeader { line: usize, text: String },
    #[error("unsupported sum file version {0}")]
    UnsupportedVersion(u32),
    #[error("malformed entry on line {line}: {text:?}")]
    Syntax { line: usize, text: String },
    #[error("duplicate checksum entry for {id:?} on line {line}")]
    Duplicate { line: usize, id: Vec<String> },
    #[error("entry id {0:?} contains the reserved separator '@'")]
    IdContainsSeparator(Vec<String>),
    #[error("entry has a missing or empty id or checksum: {0:?}")]
    EmptyField(Vec<String>),
    #[error("duplicate checksum entry for {0:?}")]
    DuplicateId(Vec<String>),
}

/// Decode a sum file, auto-detecting its version from the header line.
///
/// # Errors
///
/// See [`SumFileError`]. CRLF line endings are tolerated: a trailing `\r` is
/// stripped from every line before parsing. A missing terminating newline is
/// a decode error, not a lenient no-op: `str::lines` can't tell the two
/// apart, so that case is checked explicitly before it ever reaches a line
/// iterator.
pub fn decode(text: &str) -> Result<SumFile, SumFileError> {
    if !text.is_empty() && !text.ends_with('\n') {
        return Err(SumFileError::Syntax {
            line: text.lines().count(),
            text: text.lines().last().unwrap_or_default().to_string(),
        });
    }

    let mut lines = text.lines().map(|line| line.strip_suffix('\r').unwrap_or(line));

    let Some(header) = lines.next() else {
        return Err(SumFileError::MissingHeader);
    };
    let version = parse_header(header, 1)?;

    match lines.next() {
        Some("") | None => {}
        Some(other) => {
            return Err(SumFileError::Syntax {
                line: 2,
                text: other.to_string(),
            })
        }
    }

    decode_entries(version, lines, 3)
}

/// Read just the version header from a sum file's text, without decoding its
/// entries. Lets a caller dispatch on version before committing to a full
/// decode.
///
/// # Errors
///
/// Returns [`SumFileError::MissingHeader`] or [`SumFileError::MalformedHeader`].
pub fn decode_version(text: &str) -> Result<u32, SumFileError> {
    let mut lines = text.lines().map(|line| line.strip_suffix('\r').unwrap_or(line));
    let Some(header) = lines.next() else {
        return Err(SumFileError::MissingHeader);
    };
    parse_header(header, 1)
}

/// Check that `entries` are fit to encode: no duplicate ids, no empty id
/// parts or checksums, and no id part containing the reserved `@` separator.
///
/// # Errors
///
/// See [`SumFileError`].
pub fn validate(entries: &[Entry]) -> Result<(), SumFileError> {
    let mut seen_ids: HashSet<&Vec<String>> = HashSet::new();
    for entry in entries {
        if entry.id.is_empty() || entry.id.iter().any(String::is_empty) || entry.checksum.is_empty() {
            return Err(SumFileError::EmptyField(entry.id.clone()));
        }
        if entry.id.iter().any(|part| part.contains(ID_SEPARATOR)) {
            return Err(SumFileError::IdContainsSeparator(entry.id.clone()));
        }
        if !seen_ids.insert(&entry.id) {
            return Err(SumFileError::DuplicateId(entry.id.clone()));
        }
    }
    Ok(())
}

fn parse_header(line: &str, line_no: usize) -> Result<u32, SumFileError> {
    let Some(rest) = line.strip_prefix("version ") else {
        return Err(SumFileError::MalformedHeader {
            line: line_no,
            text: line.to_string(),
        });
    };
    rest.trim()
        .parse::<u32>()
        .map_err(|_| SumFileError::MalformedHeader {
            line: line_no,
            text: line.to_string(),
        })
}

fn decode_entries<'a>(
    version: u32,
    lines: impl Iterator<Item = &'a str>,
    first_line_no: usize,
) -> Result<SumFile, SumFileError> {
    if version != VERSION_LATEST {
        return Err(SumFileError::UnsupportedVersion(version));
    }

    let mut entries = Vec::new();
    let mut seen_ids: HashSet<Vec<String>> = HashSet::new();

    for (offset, line) in lines.enumerate() {
        let line_no = first_line_no + offset;
        if line.is_empty() {
            continue;
        }
        if line.starts_with("version ") {
            return Err(SumFileError::DuplicateHeader { line: line_no });
        }

        let mut parts = line.split(' ');
        let id_field = parts.next().unwrap_or("");
        let checksum = parts.next();
        if checksum.is_none() || parts.next().is_some() || id_field.is_empty() {
            return Err(SumFileError::Syntax {
                line: line_no,
                text: line.to_string(),
            });
        }
        let checksum = checksum.unwrap_or_default();
        if checksum.is_empty() {
            return Err(SumFileError::Syntax {
                line: line_no,
                text: line.to_string(),
            });
        }

        let id: Vec<String> = id_field.split(ID_SEPARATOR).map(str::to_string).collect();
        if id.iter().any(String::is_empty) {
            return Err(SumFileError::Syntax {
                line: line_no,
                text: line.to_string(),
            });
        }
        if !seen_ids.insert(id.clone()) {
            return Err(SumFileError::Duplicate { line: line_no, id });
        }

        entries.push(Entry::new(id, checksum.to_string()));
    }

    Ok(SumFile::new(version, entries))
}

/// Encode a sum file back to its on-disk text form: a `version N` header
/// line, a blank line, then one `id checksum` line per entry sorted by
/// joined id, each ending in `\n` including the last.
///
/// # Errors
///
/// Returns [`SumFileError::UnsupportedVersion`] if `sum_file.version` isn't
/// one this crate writes, or whatever [`validate`] rejects the entries for.
pub fn encode(sum_file: &SumFile) -> Result<String, SumFileError> {
    if sum_file.version != VERSION_LATEST {
        return Err(SumFileError::UnsupportedVersion(sum_file.version));
    }

    let mut entries = sum_file.entries.clone();
    entries.sort_by(|a, b| a.joined_id().cmp(&b.joined_id()));
    validate(&entries)?;

    let mut out = format!("version {}\n\n", sum_file.version);
    for entry in &entries {
        out.push_str(&entry.joined_id());
        out.push(' ');
        out.push_str(&entry.checksum);
        out.push('\n');
    }
    Ok(out)
}
