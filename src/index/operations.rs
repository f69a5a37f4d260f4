//! The three indexing operations and their shared block loop.
//!
//! Operations run on the worker thread, own the file handle for the
//! duration of the pass, and fold results into the shared store one block
//! at a time. The store mutex is never held across file I/O.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use md5::{Digest, Md5};

use super::data::IndexingData;
use super::encoding::{TextCodec, detect_encoding};
use super::parser::{IndexingState, parse_data_block};
use super::{MonitoredFileStatus, OperationResult};
use crate::config::IndexConfig;
use crate::error::IndexError;

/// Everything an operation needs: the file, the shared store, the
/// cooperative interrupt flag and the tuning knobs.
pub(crate) struct OperationContext {
    pub path: PathBuf,
    pub indexing_data: Arc<IndexingData>,
    pub interrupt: Arc<AtomicBool>,
    pub config: IndexConfig,
}

/// The operations the worker runs, at most one at a time.
pub(crate) enum IndexOperation {
    /// Re-index the whole file from scratch.
    FullIndex { forced_encoding: Option<TextCodec> },
    /// Index onward from the end of the data indexed so far.
    PartialIndex,
    /// Probe the file for changes without touching the store.
    CheckFileChanges,
}

impl IndexOperation {
    pub(crate) fn run(
        &self,
        ctx: &OperationContext,
        progress: &mut dyn FnMut(u32),
    ) -> Result<OperationResult, IndexError> {
        match self {
            IndexOperation::FullIndex { forced_encoding } => {
                run_full(ctx, *forced_encoding, progress)
            }
            IndexOperation::PartialIndex => run_partial(ctx, progress),
            IndexOperation::CheckFileChanges => Ok(OperationResult::Checked(run_check(ctx))),
        }
    }
}

fn run_full(
    ctx: &OperationContext,
    forced_encoding: Option<TextCodec>,
    progress: &mut dyn FnMut(u32),
) -> Result<OperationResult, IndexError> {
    let data = &ctx.indexing_data;
    data.clear();
    data.force_encoding(forced_encoding);

    let Some(file_size) = file_size_of(&ctx.path) else {
        // A missing file indexes as an empty one.
        data.set_encoding_guess(forced_encoding.unwrap_or(TextCodec::UTF_8));
        return Ok(OperationResult::Indexed(true));
    };

    let completed = do_index(ctx, 0, file_size, progress)?;
    if data.get_encoding_guess().is_none() {
        // Nothing was read; fall back to the default codec.
        data.set_encoding_guess(forced_encoding.unwrap_or(TextCodec::UTF_8));
    }
    Ok(OperationResult::Indexed(completed))
}

fn run_partial(
    ctx: &OperationContext,
    progress: &mut dyn FnMut(u32),
) -> Result<OperationResult, IndexError> {
    let indexed_size = ctx.indexing_data.get_size();
    let Some(file_size) = file_size_of(&ctx.path) else {
        return Ok(OperationResult::Checked(MonitoredFileStatus::Truncated));
    };

    if file_size < indexed_size {
        return Ok(OperationResult::Checked(MonitoredFileStatus::Truncated));
    }
    if file_size == indexed_size {
        return Ok(OperationResult::Checked(MonitoredFileStatus::Unchanged));
    }
    do_index(ctx, indexed_size, file_size, progress).map(OperationResult::Indexed)
}

fn run_check(ctx: &OperationContext) -> MonitoredFileStatus {
    let stored_size = ctx.indexing_data.get_size();
    let stored_hash = ctx.indexing_data.get_hash();

    let Some(file_size) = file_size_of(&ctx.path) else {
        return MonitoredFileStatus::Truncated;
    };
    if file_size < stored_size || file_size < stored_hash.size {
        return MonitoredFileStatus::Truncated;
    }

    match hash_prefix(ctx, stored_hash.size) {
        Ok(Some(digest)) if digest == stored_hash.digest => {
            if file_size > stored_size {
                MonitoredFileStatus::DataAdded
            } else {
                MonitoredFileStatus::Unchanged
            }
        }
        Ok(Some(_)) => MonitoredFileStatus::Truncated,
        // Interrupted mid-probe; report the least committal status.
        Ok(None) => MonitoredFileStatus::Unchanged,
        Err(err) => {
            warn!("change probe failed for {:?}: {err}", ctx.path);
            MonitoredFileStatus::Truncated
        }
    }
}

/// Shared block loop: read, parse, fold into the store, report progress,
/// poll the interrupt flag between blocks.
///
/// Returns `true` when the pass reached end of file, `false` when it was
/// interrupted.
fn do_index(
    ctx: &OperationContext,
    initial_position: u64,
    file_size: u64,
    progress: &mut dyn FnMut(u32),
) -> Result<bool, IndexError> {
    let data = &ctx.indexing_data;
    let mut codec = data.get_forced_encoding().or_else(|| data.get_encoding_guess());

    let mut file = File::open(&ctx.path)?;
    if initial_position != 0 {
        file.seek(SeekFrom::Start(initial_position))?;
    }

    let block_size = ctx.config.block_size.max(4);
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(block_size)?;
    buffer.resize(block_size, 0);

    let mut state = IndexingState::new(
        codec.unwrap_or(TextCodec::UTF_8),
        file_size,
        initial_position,
        ctx.config.tab_stop,
    );
    let mut last_percent = None;

    loop {
        if ctx.interrupt.load(Ordering::Relaxed) {
            debug!("indexing of {:?} interrupted at byte {}", ctx.path, state.pos);
            return Ok(false);
        }

        let aligned = aligned_len(buffer.len(), state.params.code_unit_width);
        let read = read_block(&mut file, &mut buffer[..aligned])?;
        if read == 0 {
            break;
        }

        if codec.is_none() && state.pos == 0 {
            // The first block of a fresh pass fixes the guess for good;
            // re-guessing later would invalidate earlier measurements.
            let guessed = detect_encoding(&buffer[..read]);
            state = IndexingState::new(guessed, file_size, 0, ctx.config.tab_stop);
            codec = Some(guessed);
        }

        // A ragged read that cuts a code unit leaves the tail for the next
        // read rather than parsing half a unit.
        let usable = aligned_len(read, state.params.code_unit_width);
        if usable == 0 {
            break;
        }
        if usable < read {
            file.seek(SeekFrom::Start(state.pos + usable as u64))?;
        }

        let block_start = state.pos;
        let block = &buffer[..usable];
        let positions = parse_data_block(block_start, block, &mut state)?;
        data.add_all(block, block_start, state.max_length, &positions, Some(state.codec))?;

        let percent = if state.file_size == 0 {
            100
        } else {
            (state.pos.min(state.file_size) * 100 / state.file_size) as u32
        };
        if last_percent != Some(percent) {
            progress(percent);
            last_percent = Some(percent);
        }
    }

    debug!("indexed {:?} up to byte {}", ctx.path, state.end);
    Ok(true)
}

/// MD5 of the file's first `len` bytes, or `None` on interrupt.
fn hash_prefix(ctx: &OperationContext, len: u64) -> Result<Option<[u8; 16]>, IndexError> {
    let mut file = File::open(&ctx.path)?;
    let mut hasher = Md5::new();

    let block_size = ctx.config.block_size.max(1);
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(block_size)?;
    buffer.resize(block_size, 0);

    let mut remaining = len;
    while remaining > 0 {
        if ctx.interrupt.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let want = remaining.min(buffer.len() as u64) as usize;
        let read = read_block(&mut file, &mut buffer[..want])?;
        if read == 0 {
            // The file shrank under us; the digest mismatch reports it.
            break;
        }
        hasher.update(&buffer[..read]);
        remaining -= read as u64;
    }
    Ok(Some(hasher.finalize().into()))
}

/// Fill the buffer from the file, tolerating short reads.
fn read_block(file: &mut File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

fn aligned_len(len: usize, width: usize) -> usize {
    len - len % width
}

fn file_size_of(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|metadata| metadata.len())
}
