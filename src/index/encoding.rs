//! Text-codec handling and encoding detection.
//!
//! A codec is a copyable handle the parser can interrogate for byte-level
//! facts (code-unit width, line-feed lane). Detection is BOM-first with a
//! statistical fallback and runs once per indexing pass, on the first block:
//! re-guessing mid-file would invalidate earlier length measurements.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

/// Identifies the text encoding used to interpret the indexed file.
///
/// `encoding_rs` does not model UTF-32, but BOM sniffing has to, so the
/// UTF-32 flavors are explicit variants next to the shared registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCodec {
    /// Any encoding modeled by `encoding_rs` (UTF-8, UTF-16, legacy 8-bit).
    Named(&'static Encoding),
    Utf32Le,
    Utf32Be,
}

impl TextCodec {
    pub const UTF_8: TextCodec = TextCodec::Named(&encoding_rs::UTF_8_INIT);
    pub const UTF_16LE: TextCodec = TextCodec::Named(&encoding_rs::UTF_16LE_INIT);
    pub const UTF_16BE: TextCodec = TextCodec::Named(&encoding_rs::UTF_16BE_INIT);

    /// Look up a codec by label, e.g. `"utf-8"` or `"windows-1252"`.
    ///
    /// This is the process-wide encoding registry; it is read-only.
    #[must_use]
    pub fn for_label(label: &str) -> Option<TextCodec> {
        match label.to_ascii_lowercase().as_str() {
            "utf-32" | "utf-32le" | "utf32" | "utf32le" => Some(TextCodec::Utf32Le),
            "utf-32be" | "utf32be" => Some(TextCodec::Utf32Be),
            _ => Encoding::for_label(label.as_bytes()).map(TextCodec::Named),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TextCodec::Named(encoding) => encoding.name(),
            TextCodec::Utf32Le => "UTF-32LE",
            TextCodec::Utf32Be => "UTF-32BE",
        }
    }

    /// Byte-level parameters the block parser scans with.
    #[must_use]
    pub fn parameters(self) -> EncodingParameters {
        match self {
            TextCodec::Named(encoding) => {
                if encoding == UTF_16LE {
                    EncodingParameters::new(2, 0, 0)
                } else if encoding == UTF_16BE {
                    EncodingParameters::new(2, 1, 0)
                } else if encoding == UTF_8 {
                    EncodingParameters::new(1, 0, 0xC0)
                } else {
                    // Legacy single- and multi-byte encodings: 0x0A never
                    // appears inside a multi-byte sequence, so byte-wise
                    // scanning and counting are safe.
                    EncodingParameters::new(1, 0, 0)
                }
            }
            TextCodec::Utf32Le => EncodingParameters::new(4, 0, 0),
            TextCodec::Utf32Be => EncodingParameters::new(4, 3, 0),
        }
    }
}

/// Byte-level facts about a codec, derived once per indexing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingParameters {
    /// Bytes per code unit.
    pub code_unit_width: usize,
    /// Byte lane of `0x0A` within an encoded line feed.
    pub line_feed_index: usize,
    /// Mask extracting the UTF-8 continuation marker, zero for other codecs.
    pub continuation_mask: u8,
}

impl EncodingParameters {
    fn new(code_unit_width: usize, line_feed_index: usize, continuation_mask: u8) -> Self {
        Self {
            code_unit_width,
            line_feed_index,
            continuation_mask,
        }
    }

    /// Whether `byte` continues a multi-byte sequence instead of starting a
    /// code point. Always false for codecs without a continuation marker.
    #[must_use]
    pub fn is_continuation(self, byte: u8) -> bool {
        byte & self.continuation_mask == 0x80
    }

    /// Whether the unit is big-endian; meaningful for widths above one.
    #[must_use]
    pub(crate) fn is_big_endian(self) -> bool {
        self.line_feed_index != 0
    }
}

/// Guess the codec of a file from its first block.
///
/// BOMs win, a byte-lane probe catches BOM-less UTF-16, valid UTF-8 is
/// taken at face value, and everything else goes to the statistical
/// detector. Falls back to UTF-8 for empty input.
#[must_use]
pub fn detect_encoding(block: &[u8]) -> TextCodec {
    if let Some(codec) = bom_codec(block) {
        return codec;
    }
    if let Some(codec) = bomless_utf16(block) {
        return codec;
    }
    if block.is_empty() || looks_utf8(block) {
        return TextCodec::UTF_8;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(block, true);
    TextCodec::Named(detector.guess(None, true))
}

fn bom_codec(block: &[u8]) -> Option<TextCodec> {
    // UTF-32 first: the UTF-16LE BOM is a prefix of the UTF-32LE BOM.
    if block.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        return Some(TextCodec::Utf32Le);
    }
    if block.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
        return Some(TextCodec::Utf32Be);
    }
    Encoding::for_bom(block).map(|(encoding, _)| TextCodec::Named(encoding))
}

/// ASCII-heavy UTF-16 zeroes one byte lane almost completely; no textual
/// 8-bit encoding does.
fn bomless_utf16(block: &[u8]) -> Option<TextCodec> {
    if block.len() < 4 {
        return None;
    }

    let mut even_zeros = 0usize;
    let mut odd_zeros = 0usize;
    for (i, byte) in block.iter().enumerate() {
        if *byte == 0 {
            if i % 2 == 0 {
                even_zeros += 1;
            } else {
                odd_zeros += 1;
            }
        }
    }

    let lane = block.len() / 2;
    if odd_zeros * 2 > lane && even_zeros * 16 < lane {
        return Some(TextCodec::Named(UTF_16LE));
    }
    if even_zeros * 2 > lane && odd_zeros * 16 < lane {
        return Some(TextCodec::Named(UTF_16BE));
    }
    None
}

/// Valid UTF-8, tolerating one truncated sequence at the end of the block.
fn looks_utf8(block: &[u8]) -> bool {
    match std::str::from_utf8(block) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none() && block.len() - err.valid_up_to() < 4,
    }
}
