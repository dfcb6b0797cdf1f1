//! Error type for the B+-tree index.

use common::BpmError;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Raised by `attach` when the metadata page disagrees with the supplied
    /// relation name / attribute offset.
    #[error("index metadata mismatch for this relation/attribute")]
    BadIndexInfo,

    /// `start_scan` called with operators outside `{Gt, Gte}` x `{Lt, Lte}`.
    #[error("low_op must be Gt/Gte and high_op must be Lt/Lte")]
    BadOpcodes,

    /// `start_scan` called with `low_val > high_val`.
    #[error("scan low bound is greater than its high bound")]
    BadScanRange,

    /// `start_scan` could not find any key satisfying the low predicate.
    #[error("no key satisfying the scan's low bound exists in this index")]
    NoSuchKeyFound,

    /// `scan_next`/`end_scan` called with no active scan.
    #[error("no scan is currently active")]
    ScanNotInitialized,

    /// `scan_next` called after the scan has already exhausted its range.
    #[error("the active scan has already reached the end of its range")]
    IndexScanCompleted,

    #[error(transparent)]
    Bpm(#[from] BpmError),
}
