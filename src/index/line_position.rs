//! Compact storage for line-end byte offsets.
//!
//! Offsets only ever grow, so most entries fit in a `u32` delta against a
//! periodic `u64` anchor, halving memory on large files. The array spills to
//! plain `u64` storage if a single anchor block ever spans more than
//! `u32::MAX` bytes; lookups stay O(1) either way.

use crate::error::IndexError;

/// Number of consecutive entries sharing one absolute anchor.
const ANCHOR_INTERVAL: usize = 256;

#[derive(Debug, Clone)]
enum Storage {
    Delta { anchors: Vec<u64>, deltas: Vec<u32> },
    Plain(Vec<u64>),
}

/// Append-only sequence of line-end byte offsets with O(1) lookup.
///
/// Entry `i` holds the offset one past the newline terminating line `i`;
/// line `i` starts at entry `i - 1` (or zero for the first line).
#[derive(Debug, Clone)]
pub struct LinePositionArray {
    storage: Storage,
}

impl LinePositionArray {
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Storage::Delta {
                anchors: Vec::new(),
                deltas: Vec::new(),
            },
        }
    }

    /// Number of indexed lines.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Delta { deltas, .. } => deltas.len(),
            Storage::Plain(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// End offset of the given line, or `None` past the indexed range.
    #[must_use]
    pub fn at(&self, line: usize) -> Option<u64> {
        match &self.storage {
            Storage::Delta { anchors, deltas } => {
                let delta = deltas.get(line)?;
                let anchor = anchors.get(line / ANCHOR_INTERVAL)?;
                Some(anchor + u64::from(*delta))
            }
            Storage::Plain(values) => values.get(line).copied(),
        }
    }

    /// End offset of the last indexed line, or zero when empty.
    ///
    /// This doubles as the total indexed size of the file.
    #[must_use]
    pub fn last_or_zero(&self) -> u64 {
        match self.len() {
            0 => 0,
            len => self.at(len - 1).unwrap_or(0),
        }
    }

    /// Append one line-end offset. Offsets must arrive non-decreasing.
    pub fn append(&mut self, offset: u64) -> Result<(), IndexError> {
        debug_assert!(
            offset >= self.last_or_zero(),
            "line offsets must be appended in order"
        );

        let fits = match &mut self.storage {
            Storage::Delta { anchors, deltas } => {
                if deltas.len() % ANCHOR_INTERVAL == 0 {
                    anchors.try_reserve(1)?;
                    deltas.try_reserve(1)?;
                    anchors.push(offset);
                    deltas.push(0);
                    true
                } else {
                    let anchor = anchors.last().copied().unwrap_or(0);
                    match offset.checked_sub(anchor).and_then(|d| u32::try_from(d).ok()) {
                        Some(delta) => {
                            deltas.try_reserve(1)?;
                            deltas.push(delta);
                            true
                        }
                        None => false,
                    }
                }
            }
            Storage::Plain(values) => {
                values.try_reserve(1)?;
                values.push(offset);
                true
            }
        };

        if !fits {
            // An anchor block outgrew u32 deltas; fall back to flat storage.
            let mut values = Vec::new();
            values.try_reserve_exact(self.len() + 1)?;
            values.extend((0..self.len()).filter_map(|line| self.at(line)));
            values.push(offset);
            self.storage = Storage::Plain(values);
        }
        Ok(())
    }

    /// Append every offset collected from one parsed block.
    pub fn append_batch(&mut self, positions: &FastLinePositionArray) -> Result<(), IndexError> {
        match &mut self.storage {
            Storage::Delta { anchors, deltas } => {
                anchors.try_reserve(positions.len() / ANCHOR_INTERVAL + 1)?;
                deltas.try_reserve(positions.len())?;
            }
            Storage::Plain(values) => values.try_reserve(positions.len())?,
        }
        for offset in positions.iter() {
            self.append(offset)?;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.storage = Storage::Delta {
            anchors: Vec::new(),
            deltas: Vec::new(),
        };
    }
}

impl Default for LinePositionArray {
    fn default() -> Self {
        Self::new()
    }
}

/// Short buffer of line-end offsets produced by parsing one block.
///
/// Built without locking, then merged into the main array under the
/// indexing-data mutex.
#[derive(Debug, Clone, Default)]
pub struct FastLinePositionArray {
    positions: Vec<u64>,
}

impl FastLinePositionArray {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, offset: u64) -> Result<(), IndexError> {
        self.positions.try_reserve(1)?;
        self.positions.push(offset);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<u64> {
        self.positions.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.positions.iter().copied()
    }
}
