//! Background indexing worker.
//!
//! Owns one named thread that runs at most one operation at a time.
//! Commands queue on an mpsc channel and are processed in order; progress
//! and finish events cross back on a second channel, so the owner observes
//! per-worker FIFO ordering with exactly one terminal event per operation.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};

use super::data::IndexingData;
use super::encoding::TextCodec;
use super::operations::{IndexOperation, OperationContext};
use super::{LoadingStatus, MonitoredFileStatus, OperationResult};
use crate::config::IndexConfig;
use crate::error::IndexError;

/// Commands processed one at a time by the worker thread.
enum WorkerCommand {
    AttachFile(PathBuf),
    IndexAll(Option<TextCodec>),
    IndexAdditionalLines,
    CheckFileChanges,
    Shutdown,
}

/// Notifications delivered to the owner, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexEvent {
    /// Integer percentage of the running indexing operation; emitted only
    /// when the value changes.
    IndexingProgressed(u32),
    /// Terminal event of `index_all` and `index_additional_lines`.
    IndexingFinished(LoadingStatus),
    /// Terminal event of `check_file_changes`, and of a partial pass that
    /// resolved to a file status instead of indexing.
    CheckFileChangesFinished(MonitoredFileStatus),
}

/// Drives indexing operations on a background thread.
///
/// The worker holds a reference to an [`IndexingData`] it does not own;
/// the store outlives the worker and stays readable after it is gone.
/// Callers must wait for the terminal event of one operation before
/// issuing the next.
pub struct LogDataWorker {
    command_tx: Sender<WorkerCommand>,
    event_rx: Receiver<IndexEvent>,
    interrupt: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LogDataWorker {
    #[must_use]
    pub fn new(indexing_data: Arc<IndexingData>) -> Self {
        Self::with_config(indexing_data, IndexConfig::default())
    }

    #[must_use]
    pub fn with_config(indexing_data: Arc<IndexingData>, config: IndexConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let interrupt = Arc::new(AtomicBool::new(false));
        let thread_interrupt = Arc::clone(&interrupt);

        let handle = thread::Builder::new()
            .name("logdex-indexer".into())
            .spawn(move || {
                worker_loop(indexing_data, config, command_rx, event_tx, thread_interrupt);
            })
            .expect("failed to spawn indexing worker thread");

        Self {
            command_tx,
            event_rx,
            interrupt,
            handle: Some(handle),
        }
    }

    /// Rebind the worker to a file on disk. Attaching to a missing file
    /// works; it indexes as an empty file.
    pub fn attach_file(&self, path: impl Into<PathBuf>) {
        self.send(WorkerCommand::AttachFile(path.into()));
    }

    /// Start a full indexing pass of the attached file.
    pub fn index_all(&self) {
        self.interrupt.store(false, Ordering::Relaxed);
        self.send(WorkerCommand::IndexAll(None));
    }

    /// Start a full indexing pass measuring with `codec` instead of
    /// consulting the encoding detector.
    pub fn index_all_with_encoding(&self, codec: TextCodec) {
        self.interrupt.store(false, Ordering::Relaxed);
        self.send(WorkerCommand::IndexAll(Some(codec)));
    }

    /// Start a partial pass from the end of the data indexed so far.
    pub fn index_additional_lines(&self) {
        self.interrupt.store(false, Ordering::Relaxed);
        self.send(WorkerCommand::IndexAdditionalLines);
    }

    /// Probe the attached file for changes without mutating the index.
    pub fn check_file_changes(&self) {
        self.interrupt.store(false, Ordering::Relaxed);
        self.send(WorkerCommand::CheckFileChanges);
    }

    /// Request cancellation of the operation in flight. Idempotent and
    /// non-blocking; the operation observes the flag at the next block
    /// boundary.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    /// Non-blocking poll for the next event.
    pub fn try_recv_event(&self) -> Result<IndexEvent, TryRecvError> {
        self.event_rx.try_recv()
    }

    /// Wait for the next event; `None` once the worker is gone.
    pub fn recv_event(&self) -> Option<IndexEvent> {
        self.event_rx.recv().ok()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Result<IndexEvent, RecvTimeoutError> {
        self.event_rx.recv_timeout(timeout)
    }

    fn send(&self, command: WorkerCommand) {
        let _ = self.command_tx.send(command);
    }
}

impl Drop for LogDataWorker {
    fn drop(&mut self) {
        self.interrupt.store(true, Ordering::Relaxed);
        let _ = self.command_tx.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    indexing_data: Arc<IndexingData>,
    config: IndexConfig,
    command_rx: Receiver<WorkerCommand>,
    event_tx: Sender<IndexEvent>,
    interrupt: Arc<AtomicBool>,
) {
    let mut path = PathBuf::new();

    while let Ok(command) = command_rx.recv() {
        let operation = match command {
            WorkerCommand::AttachFile(new_path) => {
                debug!("attaching {new_path:?}");
                path = new_path;
                continue;
            }
            WorkerCommand::IndexAll(forced_encoding) => {
                IndexOperation::FullIndex { forced_encoding }
            }
            WorkerCommand::IndexAdditionalLines => IndexOperation::PartialIndex,
            WorkerCommand::CheckFileChanges => IndexOperation::CheckFileChanges,
            WorkerCommand::Shutdown => break,
        };

        let ctx = OperationContext {
            path: path.clone(),
            indexing_data: Arc::clone(&indexing_data),
            interrupt: Arc::clone(&interrupt),
            config: config.clone(),
        };
        let result = operation.run(&ctx, &mut |percent| {
            let _ = event_tx.send(IndexEvent::IndexingProgressed(percent));
        });

        let event = match result {
            Ok(OperationResult::Indexed(true)) => {
                IndexEvent::IndexingFinished(LoadingStatus::Successful)
            }
            Ok(OperationResult::Indexed(false)) => {
                IndexEvent::IndexingFinished(LoadingStatus::Interrupted)
            }
            Ok(OperationResult::Checked(status)) => {
                IndexEvent::CheckFileChangesFinished(status)
            }
            Err(IndexError::OutOfMemory(err)) => {
                warn!("indexing of {path:?} ran out of memory: {err}");
                IndexEvent::IndexingFinished(LoadingStatus::NoMemory)
            }
            Err(IndexError::Io(err)) => {
                // Never propagated across the thread boundary; the caller
                // treats the partial index as non-authoritative.
                warn!("indexing of {path:?} failed: {err}");
                IndexEvent::IndexingFinished(LoadingStatus::Interrupted)
            }
        };
        if event_tx.send(event).is_err() {
            break;
        }
    }
}
