//! Result types returned by the operations layer (C9) to describe what an
//! update changed or what a verification found, independent of how the
//! caller renders them.

use std::fmt;

/// Tally of changes an `update` made to a record file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub added: u32,
    pub kept: u32,
    pub overridden: u32,
    pub removed: u32,
}

impl UpdateReport {
    #[must_use]
    pub fn updated(self) -> u32 {
        self.added + self.overridden + self.removed
    }

    #[must_use]
    pub fn is_empty_change(self) -> bool {
        self.updated() == 0
    }
}

impl fmt::Display for UpdateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} overridden, {} removed, {} kept",
            self.added, self.overridden, self.removed, self.kept
        )
    }
}

/// A single verification mismatch: an action whose checksum on record does
/// not match what was freshly computed, or whose record has no match at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem(pub String);

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The outcome of a `verify` run: every mismatch found, plus how many actions
/// were checked in total (problems and all).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub problems: Vec<Problem>,
    pub total: usize,
}

impl VerifyReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}
