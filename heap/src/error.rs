//! Error type for heap-file operations.

use common::BpmError;

#[derive(Debug, thiserror::Error)]
pub enum HeapError {
    /// Raised by a [`crate::HeapFileScanner`] once every record has been
    /// yielded.
    #[error("end of heap file reached")]
    EndOfFile,

    /// A tuple did not fit in a single page.
    #[error("tuple of {0} bytes exceeds page capacity")]
    RecordTooLarge(usize),

    #[error(transparent)]
    Bpm(#[from] BpmError),
}
