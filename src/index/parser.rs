//! Block-wise line parsing.
//!
//! Each indexing pass feeds the file through [`parse_data_block`] one block
//! at a time. Everything that has to survive a block boundary — the
//! unfinished line's code-point count, its tab-expansion surplus, the
//! parsing cursor — lives in [`IndexingState`].

use memchr::{memchr, memchr_iter};

use super::encoding::{EncodingParameters, TextCodec};
use super::line_position::FastLinePositionArray;
use crate::error::IndexError;

/// Per-operation mutable scratch. Not shared; one per indexing pass.
#[derive(Debug)]
pub(crate) struct IndexingState {
    /// Byte-level facts about the measuring codec.
    pub params: EncodingParameters,
    /// Codec line lengths are measured with.
    pub codec: TextCodec,
    /// Absolute byte offset of the next unparsed byte.
    pub pos: u64,
    /// Byte offset one past the last emitted line end.
    pub end: u64,
    /// Code points of the unfinished line seen so far.
    pub partial_chars: usize,
    /// Columns added by tab expansion within the unfinished line.
    pub additional_spaces: usize,
    /// Longest line measured so far, in columns.
    pub max_length: usize,
    /// File size snapshot taken when the pass started.
    pub file_size: u64,
    /// Column multiple tabs expand to.
    pub tab_stop: usize,
}

impl IndexingState {
    pub(crate) fn new(codec: TextCodec, file_size: u64, initial_position: u64, tab_stop: usize) -> Self {
        Self {
            params: codec.parameters(),
            codec,
            pos: initial_position,
            end: initial_position,
            partial_chars: 0,
            additional_spaces: 0,
            max_length: 0,
            file_size,
            tab_stop: tab_stop.max(1),
        }
    }

    fn expand_tab(&mut self) {
        let column = self.partial_chars + self.additional_spaces;
        self.additional_spaces += self.tab_stop - column % self.tab_stop - 1;
        self.partial_chars += 1;
    }
}

/// Scan one block for line terminators.
///
/// Returns the line-end offsets found in the block and folds line lengths
/// into `state`. `block_start` is the absolute offset of the block's first
/// byte; blocks must be fed contiguously and, for wide encodings, sized to
/// a multiple of the code-unit width (ragged only at end of file).
pub(crate) fn parse_data_block(
    block_start: u64,
    block: &[u8],
    state: &mut IndexingState,
) -> Result<FastLinePositionArray, IndexError> {
    debug_assert_eq!(block_start, state.pos, "blocks must be fed in file order");

    let width = state.params.code_unit_width;
    let lf_index = state.params.line_feed_index;
    let mut positions = FastLinePositionArray::new();
    let mut cursor = 0usize;

    for hit in memchr_iter(b'\n', block) {
        // The 0x0A byte must sit on the line-feed lane of a code unit, and
        // the whole unit must encode U+000A.
        if width > 1 && (block_start + hit as u64) % width as u64 != lf_index as u64 {
            continue;
        }
        let Some(unit) = hit.checked_sub(lf_index) else {
            continue;
        };
        if unit + width > block.len() {
            // Incomplete trailing unit; the next pass re-reads it.
            continue;
        }
        if width > 1 && !is_line_feed_unit(&block[unit..unit + width], lf_index) {
            continue;
        }

        measure_segment(&block[cursor..unit], state);
        let length = state.partial_chars + state.additional_spaces;
        state.max_length = state.max_length.max(length);
        state.partial_chars = 0;
        state.additional_spaces = 0;

        let end = block_start + (unit + width) as u64;
        positions.push(end)?;
        state.end = end;
        cursor = unit + width;
    }

    // Carry the unfinished tail into the next block.
    measure_segment(&block[cursor..], state);
    state.pos = block_start + block.len() as u64;
    Ok(positions)
}

fn is_line_feed_unit(unit: &[u8], lf_index: usize) -> bool {
    unit.iter()
        .enumerate()
        .all(|(i, byte)| if i == lf_index { *byte == b'\n' } else { *byte == 0 })
}

/// Advance the unfinished line's measurement over a terminator-free
/// byte range.
fn measure_segment(bytes: &[u8], state: &mut IndexingState) {
    if bytes.is_empty() {
        return;
    }
    let params = state.params;

    if params.code_unit_width == 1 {
        if bytes.is_ascii() && memchr(b'\t', bytes).is_none() {
            state.partial_chars += bytes.len();
            return;
        }
        for byte in bytes {
            if params.is_continuation(*byte) {
                continue;
            }
            if *byte == b'\t' {
                state.expand_tab();
            } else {
                state.partial_chars += 1;
            }
        }
        return;
    }

    let big_endian = params.is_big_endian();
    for unit in bytes.chunks_exact(params.code_unit_width) {
        let value = match unit {
            [a, b] => {
                if big_endian {
                    u32::from(u16::from_be_bytes([*a, *b]))
                } else {
                    u32::from(u16::from_le_bytes([*a, *b]))
                }
            }
            [a, b, c, d] => {
                if big_endian {
                    u32::from_be_bytes([*a, *b, *c, *d])
                } else {
                    u32::from_le_bytes([*a, *b, *c, *d])
                }
            }
            _ => continue,
        };
        if params.code_unit_width == 2 && value & 0xFC00 == 0xDC00 {
            // Low surrogate: second half of one code point.
            continue;
        }
        if value == u32::from(b'\t') {
            state.expand_tab();
        } else {
            state.partial_chars += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_for(codec: TextCodec, file_size: u64) -> IndexingState {
        IndexingState::new(codec, file_size, 0, 8)
    }

    fn ends(positions: &FastLinePositionArray) -> Vec<u64> {
        positions.iter().collect()
    }

    #[test]
    fn finds_line_ends_and_max_length() {
        let block = b"a\nbb\nccc\n";
        let mut state = state_for(TextCodec::UTF_8, block.len() as u64);
        let positions = parse_data_block(0, block, &mut state).unwrap();

        assert_eq!(ends(&positions), vec![2, 5, 9]);
        assert_eq!(state.max_length, 3);
        assert_eq!(state.end, 9);
        assert_eq!(state.pos, 9);
    }

    #[test]
    fn unterminated_tail_is_carried_not_counted() {
        let block = b"x\ny";
        let mut state = state_for(TextCodec::UTF_8, 3);
        let positions = parse_data_block(0, block, &mut state).unwrap();

        assert_eq!(ends(&positions), vec![2]);
        assert_eq!(state.max_length, 1);
        assert_eq!(state.partial_chars, 1);
        assert_eq!(state.end, 2);
    }

    #[test]
    fn line_split_across_blocks_measures_once() {
        let mut state = state_for(TextCodec::UTF_8, 5);

        let first = parse_data_block(0, b"a\nb", &mut state).unwrap();
        assert_eq!(ends(&first), vec![2]);

        let second = parse_data_block(3, b"b\n", &mut state).unwrap();
        assert_eq!(ends(&second), vec![5]);
        assert_eq!(state.max_length, 2);
    }

    #[test]
    fn utf8_sequence_split_at_block_boundary() {
        // "é" is C3 A9; the boundary falls between its two bytes.
        let mut state = state_for(TextCodec::UTF_8, 3);

        parse_data_block(0, b"\xC3", &mut state).unwrap();
        assert_eq!(state.partial_chars, 1);

        let positions = parse_data_block(1, b"\xA9\n", &mut state).unwrap();
        assert_eq!(ends(&positions), vec![3]);
        assert_eq!(state.max_length, 1);
    }

    #[test]
    fn tabs_expand_to_the_next_stop() {
        let block = b"a\tb\n";
        let mut state = state_for(TextCodec::UTF_8, block.len() as u64);
        parse_data_block(0, block, &mut state).unwrap();

        // "a" then a tab out to column 8, then "b".
        assert_eq!(state.max_length, 9);
    }

    #[test]
    fn tab_carry_survives_block_boundaries() {
        let mut state = state_for(TextCodec::UTF_8, 4);
        parse_data_block(0, b"a\t", &mut state).unwrap();
        parse_data_block(2, b"b\n", &mut state).unwrap();

        assert_eq!(state.max_length, 9);
    }

    #[test]
    fn utf16le_terminators_and_lengths() {
        // "ab\ncd\n" in UTF-16LE.
        let block: Vec<u8> = b"ab\ncd\n".iter().flat_map(|b| [*b, 0u8]).collect();
        let mut state = state_for(TextCodec::UTF_16LE, block.len() as u64);
        let positions = parse_data_block(0, &block, &mut state).unwrap();

        assert_eq!(ends(&positions), vec![6, 12]);
        assert_eq!(state.max_length, 2);
    }

    #[test]
    fn utf16be_line_feed_sits_on_the_high_lane() {
        let block = b"\x00a\x00\n\x00b\x00c\x00\n";
        let mut state = state_for(TextCodec::UTF_16BE, block.len() as u64);
        let positions = parse_data_block(0, block, &mut state).unwrap();

        assert_eq!(ends(&positions), vec![4, 10]);
        assert_eq!(state.max_length, 2);
    }

    #[test]
    fn utf16_code_unit_containing_0a_is_not_a_terminator() {
        // U+0A0A ("ਊ") followed by a real line feed, UTF-16LE.
        let block = [0x0A, 0x0A, 0x0A, 0x00];
        let mut state = state_for(TextCodec::UTF_16LE, block.len() as u64);
        let positions = parse_data_block(0, &block, &mut state).unwrap();

        assert_eq!(ends(&positions), vec![4]);
        assert_eq!(state.max_length, 1);
    }

    #[test]
    fn utf16_surrogate_pair_counts_as_one_code_point() {
        // "😀\n" in UTF-16LE: D83D DE00 000A.
        let block = [0x3D, 0xD8, 0x00, 0xDE, 0x0A, 0x00];
        let mut state = state_for(TextCodec::UTF_16LE, block.len() as u64);
        let positions = parse_data_block(0, &block, &mut state).unwrap();

        assert_eq!(ends(&positions), vec![6]);
        assert_eq!(state.max_length, 1);
    }

    #[test]
    fn utf32_terminators_span_four_bytes() {
        let block = [0x61, 0, 0, 0, 0x0A, 0, 0, 0, 0x62, 0, 0, 0];
        let mut state = state_for(TextCodec::Utf32Le, block.len() as u64);
        let positions = parse_data_block(0, &block, &mut state).unwrap();

        assert_eq!(ends(&positions), vec![8]);
        assert_eq!(state.max_length, 1);
        assert_eq!(state.partial_chars, 1);
    }

    #[test]
    fn incomplete_trailing_unit_is_not_a_terminator() {
        // Ragged end-of-file read cuts a UTF-16 line feed in half.
        let block = [0x61, 0x00, 0x0A];
        let mut state = state_for(TextCodec::UTF_16LE, block.len() as u64);
        let positions = parse_data_block(0, &block, &mut state).unwrap();

        assert!(positions.is_empty());
    }
}
