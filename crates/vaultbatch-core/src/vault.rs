//! Data types exchanged with the external versioned-file vault.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a vault document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Document is editable (subject to locking).
    InWork,
    /// Document is in a review workflow; still lockable.
    UnderReview,
    /// Document is released; read-only.
    Released,
    /// Document is obsolete; read-only.
    Obsolete,
}

impl LifecycleState {
    /// Whether this state forbids edits regardless of locking.
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Released | Self::Obsolete)
    }
}

/// Lock and lifecycle status of a vault document, as reported by the vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStatus {
    /// Lifecycle state of the document.
    pub state: LifecycleState,
    /// Actor currently holding the exclusive lock, if any.
    pub holder: Option<String>,
    /// Current vault version of the document.
    pub version: u32,
}

/// Availability of one file for batch editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Unlocked (or locked by the acting user) and editable.
    Available,
    /// Exclusively locked by another actor.
    LockedByOther {
        /// The actor holding the lock.
        holder: String,
    },
    /// In a released or obsolete lifecycle state; read-only.
    ReleasedReadOnly,
    /// Unknown to the vault, or the status query failed.
    NotFound,
}

impl Availability {
    /// Whether the file can be locked and edited by this run.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => formatter.write_str("available"),
            Self::LockedByOther { holder } => write!(formatter, "locked by {holder}"),
            Self::ReleasedReadOnly => formatter.write_str("released (read-only)"),
            Self::NotFound => formatter.write_str("not found"),
        }
    }
}

/// Result of transitive impact analysis over a set of target files.
///
/// Computed fresh per run; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// The files whose edits were analyzed.
    pub targets: Vec<PathBuf>,
    /// Every distinct document that directly or transitively references a
    /// target. Excludes the targets themselves.
    pub referencing: BTreeSet<PathBuf>,
    /// Number of referencing documents.
    pub total: usize,
}

impl ImpactReport {
    /// Builds a report from the discovered referencing set.
    pub fn new(targets: Vec<PathBuf>, referencing: BTreeSet<PathBuf>) -> Self {
        let total = referencing.len();
        Self {
            targets,
            referencing,
            total,
        }
    }
}
