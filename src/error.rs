use std::collections::TryReserveError;

use thiserror::Error;

/// Faults that can stop an indexing pass before it reaches end of file.
///
/// These never cross the worker thread boundary as `Err` values; the worker
/// folds them into the terminal event it emits for the command.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Reading or seeking the indexed file failed mid-pass.
    #[error("failed to read indexed file: {0}")]
    Io(#[from] std::io::Error),

    /// The line index or a block buffer could not grow.
    #[error("failed to allocate indexing memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
}
