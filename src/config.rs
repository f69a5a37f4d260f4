/// Bytes read from the file per parsing block.
pub(crate) const DEFAULT_BLOCK_SIZE: usize = 5 * 1024 * 1024;

/// Column multiple that tab characters expand to when measuring lines.
pub(crate) const DEFAULT_TAB_STOP: usize = 8;

/// Tuning knobs for the indexing pipeline.
///
/// The defaults suit interactive use on multi-gigabyte files. Tests shrink
/// `block_size` to force block-boundary conditions on tiny inputs. The
/// identity-hash prefix bound is not configured here; it belongs to
/// [`IndexingData`](crate::IndexingData), which owns the hash.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Size of the byte window read from the file for each parsing pass.
    pub block_size: usize,
    /// Column multiple that tab characters expand to for line lengths.
    pub tab_stop: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            tab_stop: DEFAULT_TAB_STOP,
        }
    }
}
