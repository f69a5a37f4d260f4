//! Thread-safe aggregate of everything an indexing pass produces.
//!
//! One mutex guards the line index, the longest-line measurement, the
//! identity hash and the encoding fields, so a reader that observes one
//! block's contribution observes all of it. Shared as `Arc<IndexingData>`
//! between the worker (writer) and the owner (reader); the data must
//! outlive the worker.

use md5::{Digest, Md5};
use parking_lot::Mutex;

use super::encoding::TextCodec;
use super::line_position::{FastLinePositionArray, LinePositionArray};
use crate::error::IndexError;

/// How many leading bytes of the file feed the identity hash by default.
const DEFAULT_HASH_PREFIX_LEN: u64 = 256 * 1024;

/// Identity fingerprint of the indexed file: an MD5 over its first
/// `size` bytes, where `size` never exceeds the configured prefix bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedHash {
    /// How many leading bytes of the file the digest covers.
    pub size: u64,
    pub digest: [u8; 16],
}

#[derive(Debug)]
struct Inner {
    line_positions: LinePositionArray,
    max_length: usize,
    hasher: Md5,
    hashed_size: u64,
    encoding_guess: Option<TextCodec>,
    encoding_forced: Option<TextCodec>,
}

impl Inner {
    fn new() -> Self {
        Self {
            line_positions: LinePositionArray::new(),
            max_length: 0,
            hasher: Md5::new(),
            hashed_size: 0,
            encoding_guess: None,
            encoding_forced: None,
        }
    }
}

/// The shared indexing results for one monitored file.
#[derive(Debug)]
pub struct IndexingData {
    hash_prefix_len: u64,
    inner: Mutex<Inner>,
}

impl IndexingData {
    #[must_use]
    pub fn new() -> Self {
        Self::with_hash_prefix(DEFAULT_HASH_PREFIX_LEN)
    }

    /// Create a store whose identity hash covers at most `len` leading
    /// bytes of the file.
    #[must_use]
    pub fn with_hash_prefix(len: u64) -> Self {
        Self {
            hash_prefix_len: len,
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Total indexed size: the end offset of the last indexed line.
    #[must_use]
    pub fn get_size(&self) -> u64 {
        self.inner.lock().line_positions.last_or_zero()
    }

    /// Number of indexed lines.
    #[must_use]
    pub fn get_nb_lines(&self) -> usize {
        self.inner.lock().line_positions.len()
    }

    /// Length of the longest line seen so far, in code points with tabs
    /// expanded.
    #[must_use]
    pub fn get_max_length(&self) -> usize {
        self.inner.lock().max_length
    }

    /// End offset of the given line, or `None` past the indexed range.
    #[must_use]
    pub fn get_pos_for_line(&self, line: usize) -> Option<u64> {
        self.inner.lock().line_positions.at(line)
    }

    #[must_use]
    pub fn get_hash(&self) -> IndexedHash {
        let inner = self.inner.lock();
        IndexedHash {
            size: inner.hashed_size,
            digest: inner.hasher.clone().finalize().into(),
        }
    }

    #[must_use]
    pub fn get_encoding_guess(&self) -> Option<TextCodec> {
        self.inner.lock().encoding_guess
    }

    pub fn set_encoding_guess(&self, codec: TextCodec) {
        self.inner.lock().encoding_guess = Some(codec);
    }

    #[must_use]
    pub fn get_forced_encoding(&self) -> Option<TextCodec> {
        self.inner.lock().encoding_forced
    }

    /// Store a codec that overrides the guess for presentation. Does not
    /// touch the index itself.
    pub fn force_encoding(&self, codec: Option<TextCodec>) {
        self.inner.lock().encoding_forced = codec;
    }

    /// Atomically fold one parsed block into the store.
    ///
    /// Appends the line ends, extends the identity hash over the block's
    /// not-yet-hashed bytes while the prefix bound allows, folds the
    /// max-length delta and adopts the codec when one is passed.
    /// `block_start` is the absolute offset of the block's first byte;
    /// an incremental pass may re-feed bytes the hash already covered.
    pub fn add_all(
        &self,
        block: &[u8],
        block_start: u64,
        max_length: usize,
        positions: &FastLinePositionArray,
        encoding: Option<TextCodec>,
    ) -> Result<(), IndexError> {
        let mut inner = self.inner.lock();
        inner.line_positions.append_batch(positions)?;

        if inner.hashed_size < self.hash_prefix_len && block_start <= inner.hashed_size {
            let skip = (inner.hashed_size - block_start) as usize;
            if skip < block.len() {
                let available = &block[skip..];
                let room = self.hash_prefix_len - inner.hashed_size;
                let take = available.len().min(room as usize);
                inner.hasher.update(&available[..take]);
                inner.hashed_size += take as u64;
            }
        }

        inner.max_length = inner.max_length.max(max_length);
        if encoding.is_some() {
            inner.encoding_guess = encoding;
        }
        Ok(())
    }

    /// Reset every field and re-initialize the hash.
    pub fn clear(&self) {
        *self.inner.lock() = Inner::new();
    }
}

impl Default for IndexingData {
    fn default() -> Self {
        Self::new()
    }
}
