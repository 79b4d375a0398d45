//! Rune/byte index translation over raw line bytes.
//!
//! Lines are stored as bytes, locations are expressed in runes. Every place
//! where a location touches a line's storage goes through
//! [`rune_to_byte_index`]. Decoding steps one rune at a time; a byte that
//! does not start a valid UTF-8 sequence counts as a one-byte rune, so the
//! translation stays total even for files that are not valid UTF-8.

/// Byte width of the rune starting at `bytes[0]`.
///
/// Returns 0 for an empty slice and 1 for any invalid or truncated sequence.
#[must_use]
pub fn rune_width(bytes: &[u8]) -> usize {
    let Some(&lead) = bytes.first() else {
        return 0;
    };
    let width = match lead {
        0x00..=0x7F => return 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return 1,
    };
    match bytes.get(..width) {
        Some(seq) if std::str::from_utf8(seq).is_ok() => width,
        _ => 1,
    }
}

/// Byte offset of the `n`th rune in `bytes`.
///
/// `n == 0` is always byte 0. If `bytes` holds fewer than `n` runes the
/// result is `bytes.len()`.
#[must_use]
pub fn rune_to_byte_index(n: usize, bytes: &[u8]) -> usize {
    if n == 0 {
        return 0;
    }
    let mut offset = 0;
    let mut runes = 0;
    while offset < bytes.len() {
        offset += rune_width(&bytes[offset..]);
        runes += 1;
        if runes == n {
            break;
        }
    }
    offset
}

/// Like [`rune_to_byte_index`], but `None` when `bytes` holds fewer than
/// `n` runes.
#[must_use]
pub fn checked_rune_to_byte_index(n: usize, bytes: &[u8]) -> Option<usize> {
    let mut offset = 0;
    for _ in 0..n {
        let width = rune_width(&bytes[offset..]);
        if width == 0 {
            return None;
        }
        offset += width;
    }
    Some(offset)
}

/// Rune offset of byte offset `byte` in `bytes`.
///
/// A byte offset in the middle of a multi-byte rune counts the partial
/// rune as consumed.
#[must_use]
pub fn byte_to_rune_index(byte: usize, bytes: &[u8]) -> usize {
    let end = byte.min(bytes.len());
    let mut offset = 0;
    let mut runes = 0;
    while offset < end {
        offset += rune_width(&bytes[offset..]);
        runes += 1;
    }
    runes
}

/// Number of runes in `bytes`.
#[must_use]
pub fn rune_count(bytes: &[u8]) -> usize {
    byte_to_rune_index(bytes.len(), bytes)
}

/// Decode the `n`th rune of `bytes`, if it exists.
///
/// Invalid bytes decode as `U+FFFD`.
#[must_use]
pub fn rune_at(n: usize, bytes: &[u8]) -> Option<char> {
    let start = rune_to_byte_index(n, bytes);
    let width = rune_width(&bytes[start..]);
    if width == 0 {
        return None;
    }
    Some(
        std::str::from_utf8(&bytes[start..start + width])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER),
    )
}

/// Decode every rune of `bytes`, invalid bytes as `U+FFFD`.
///
/// Yields exactly [`rune_count`] items, so indices line up with columns.
pub fn runes(bytes: &[u8]) -> impl Iterator<Item = char> + '_ {
    let mut offset = 0;
    std::iter::from_fn(move || {
        let width = rune_width(&bytes[offset..]);
        if width == 0 {
            return None;
        }
        let seq = &bytes[offset..offset + width];
        offset += width;
        Some(
            std::str::from_utf8(seq)
                .ok()
                .and_then(|s| s.chars().next())
                .unwrap_or(char::REPLACEMENT_CHARACTER),
        )
    })
}
