//! Run summary types returned by the orchestrator.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::batch::BatchId;
use crate::vault::{Availability, ImpactReport};

/// Why a file was excluded from a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Exclusively locked by another actor at classification time.
    LockedByOther {
        /// The actor holding the lock.
        holder: String,
    },
    /// Released or obsolete; read-only.
    ReleasedReadOnly,
    /// Unknown to the vault, or the status query failed.
    NotFound,
    /// Classified available but the lock attempt failed.
    LockAcquireFailed,
}

impl SkipReason {
    /// Maps a non-available classification onto its skip reason.
    ///
    /// Returns `None` for [`Availability::Available`], which is not a skip.
    pub fn from_availability(availability: &Availability) -> Option<Self> {
        match availability {
            Availability::Available => None,
            Availability::LockedByOther { holder } => Some(Self::LockedByOther {
                holder: holder.clone(),
            }),
            Availability::ReleasedReadOnly => Some(Self::ReleasedReadOnly),
            Availability::NotFound => Some(Self::NotFound),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockedByOther { holder } => write!(formatter, "locked by {holder}"),
            Self::ReleasedReadOnly => formatter.write_str("released (read-only)"),
            Self::NotFound => formatter.write_str("not found"),
            Self::LockAcquireFailed => formatter.write_str("lock acquire failed"),
        }
    }
}

/// A file excluded from the run, with its reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    /// The excluded file.
    pub file: PathBuf,
    /// Why it was excluded.
    pub reason: SkipReason,
}

/// Final report for one batch run.
///
/// Always explains partial success: every skipped file appears with its
/// reason alongside per-job failure counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// The processed batch.
    pub batch_id: BatchId,
    /// Batch name, as given by the caller.
    pub name: String,
    /// Jobs whose executor reported success.
    pub completed: usize,
    /// Jobs whose executor reported an error.
    pub failed: usize,
    /// Jobs never attempted.
    pub skipped_jobs: usize,
    /// Files excluded before the batch was created, with reasons.
    pub skipped_files: Vec<SkippedFile>,
    /// Impact analysis over the available files (informational).
    pub impact: ImpactReport,
    /// Files locked for this run.
    pub locked: usize,
    /// Locked files whose release reported success.
    pub released: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_from_availability() {
        assert_eq!(
            SkipReason::from_availability(&Availability::Available),
            None
        );
        assert_eq!(
            SkipReason::from_availability(&Availability::LockedByOther {
                holder: "jdoe".to_owned()
            }),
            Some(SkipReason::LockedByOther {
                holder: "jdoe".to_owned()
            })
        );
        assert_eq!(
            SkipReason::from_availability(&Availability::NotFound),
            Some(SkipReason::NotFound)
        );
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(
            SkipReason::LockedByOther {
                holder: "jdoe".to_owned()
            }
            .to_string(),
            "locked by jdoe"
        );
        assert_eq!(
            SkipReason::LockAcquireFailed.to_string(),
            "lock acquire failed"
        );
    }
}
