//! Text location and range types.
//!
//! All coordinates are **0-indexed**. Line 0 is the first line, column 0 is the
//! first rune. Columns count decoded UTF-8 runes, never bytes: whenever a
//! location touches the storage of a specific line it goes through
//! [`rune_to_byte_index`](crate::utf8::rune_to_byte_index) first.
//!
//! A location is only meaningful relative to one snapshot of a
//! [`LineStore`](crate::LineStore). Column 0 is always valid; a column equal
//! to the line's rune length is the valid end-of-line position.
//!
//! Display layers should convert to 1-indexed for the user — that conversion
//! never belongs here.

use std::fmt;

use memchr::{memchr_iter, memrchr};
use serde::{Deserialize, Serialize};

use crate::utf8;

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A location in a line store: (line, column), both 0-indexed.
///
/// `col` is the rune offset from the start of the line, **not** a byte offset.
/// For the line `"héllo"`, column 2 is `'l'` even though it starts at byte 3.
///
/// # Ordering
///
/// Locations are ordered lexicographically: line first, then column. This
/// means `Location { line: 0, col: 5 }` < `Location { line: 1, col: 0 }`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub col: usize,
}

impl Location {
    /// The origin — line 0, column 0.
    pub const ZERO: Self = Self { line: 0, col: 0 };

    /// Create a new location.
    #[inline]
    #[must_use]
    pub const fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }

    /// The location just past `text` if it were inserted here.
    ///
    /// Every `\n` moves to column 0 of the next line; every other rune
    /// advances the column by one. A `\r` is an ordinary rune: the store
    /// only ever splits on line feeds. Runes are counted the way
    /// [`utf8::rune_count`] counts them, so an invalid byte is one column.
    #[must_use]
    pub fn advance(self, text: impl AsRef<[u8]>) -> Self {
        let text = text.as_ref();
        match memrchr(b'\n', text) {
            Some(last) => Self::new(
                self.line + memchr_iter(b'\n', text).count(),
                utf8::rune_count(&text[last + 1..]),
            ),
            None => Self::new(self.line, self.col + utf8::rune_count(text)),
        }
    }

    /// Where this location ends up after `start..end` was inserted.
    ///
    /// Locations before `start` are unaffected. Locations at or after
    /// `start` move with the text that followed them.
    #[must_use]
    pub fn shifted_by_insert(self, start: Self, end: Self) -> Self {
        if self < start {
            return self;
        }
        if self.line == start.line {
            Self::new(end.line, end.col + (self.col - start.col))
        } else {
            Self::new(self.line + (end.line - start.line), self.col)
        }
    }

    /// Where this location ends up after `start..end` was removed.
    ///
    /// Locations inside the removed span collapse onto `start`.
    #[must_use]
    pub fn shifted_by_remove(self, start: Self, end: Self) -> Self {
        if self <= start {
            return self;
        }
        if self < end {
            return start;
        }
        if self.line == end.line {
            Self::new(start.line, start.col + (self.col - end.col))
        } else {
            Self::new(self.line - (end.line - start.line), self.col)
        }
    }
}

// Natural ordering: line first, then column.
impl Ord for Location {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.line
            .cmp(&other.line)
            .then(self.col.cmp(&other.col))
    }
}

impl PartialOrd for Location {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loc({}:{})", self.line, self.col)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 1-indexed for human display.
        write!(f, "{}:{}", self.line + 1, self.col + 1)
    }
}

// ---------------------------------------------------------------------------
// Range
// ---------------------------------------------------------------------------

/// A half-open span between two locations: `[start, end)`.
///
/// `start` is inclusive, `end` is exclusive. An empty range has `start == end`.
/// Use [`Range::ordered`] when the endpoints come from an anchor and a head
/// that may be in either order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Location,
    pub end: Location,
}

impl Range {
    /// Create a range. Panics in debug if `start > end`.
    #[inline]
    #[must_use]
    pub const fn new(start: Location, end: Location) -> Self {
        debug_assert!(
            start.line < end.line || (start.line == end.line && start.col <= end.col),
            "Range::new requires start <= end"
        );
        Self { start, end }
    }

    /// Create a range from two arbitrary locations, swapping if needed so
    /// that `start <= end`.
    #[inline]
    #[must_use]
    pub fn ordered(a: Location, b: Location) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Range({}:{} .. {}:{})",
            self.start.line, self.start.col, self.end.line, self.end.col
        )
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Ordering -----------------------------------------------------------

    #[test]
    fn ordering_same_line() {
        assert!(Location::new(1, 3) < Location::new(1, 7));
    }

    #[test]
    fn ordering_different_lines() {
        assert!(Location::new(0, 100) < Location::new(1, 0));
    }

    #[test]
    fn ord_is_consistent() {
        let locs = [
            Location::ZERO,
            Location::new(0, 1),
            Location::new(0, 100),
            Location::new(1, 0),
            Location::new(10, 0),
        ];
        for window in locs.windows(2) {
            assert!(window[0] <= window[1], "{:?} should be <= {:?}", window[0], window[1]);
        }
    }

    // -- Display ------------------------------------------------------------

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", Location::new(2, 5)), "Loc(2:5)");
    }

    #[test]
    fn display_is_1_indexed() {
        assert_eq!(format!("{}", Location::ZERO), "1:1");
        assert_eq!(format!("{}", Location::new(9, 14)), "10:15");
        let r = Range::new(Location::ZERO, Location::new(2, 5));
        assert_eq!(format!("{r}"), "1:1-3:6");
    }

    // -- advance ------------------------------------------------------------

    #[test]
    fn advance_no_newline() {
        assert_eq!(Location::ZERO.advance("hello"), Location::new(0, 5));
    }

    #[test]
    fn advance_counts_runes_not_bytes() {
        assert_eq!(Location::new(0, 1).advance("é世"), Location::new(0, 3));
    }

    #[test]
    fn advance_with_newlines() {
        assert_eq!(Location::new(3, 5).advance("hi\nthere"), Location::new(4, 5));
        assert_eq!(Location::ZERO.advance("a\nb\n"), Location::new(2, 0));
    }

    #[test]
    fn advance_carriage_return_is_a_rune() {
        assert_eq!(Location::ZERO.advance("a\r\nb"), Location::new(1, 1));
    }

    #[test]
    fn advance_empty() {
        assert_eq!(Location::new(2, 3).advance(""), Location::new(2, 3));
    }

    #[test]
    fn advance_counts_invalid_bytes_one_each() {
        assert_eq!(Location::new(0, 1).advance([0xE4_u8, 0xB8]), Location::new(0, 3));
        assert_eq!(Location::ZERO.advance(b"x\n\xFFy"), Location::new(1, 2));
    }

    // -- Shifting -----------------------------------------------------------

    #[test]
    fn insert_shift_before_is_noop() {
        let loc = Location::new(0, 2);
        assert_eq!(loc.shifted_by_insert(Location::new(0, 3), Location::new(0, 5)), loc);
    }

    #[test]
    fn insert_shift_same_line() {
        let loc = Location::new(0, 6);
        let moved = loc.shifted_by_insert(Location::new(0, 3), Location::new(1, 2));
        assert_eq!(moved, Location::new(1, 5));
    }

    #[test]
    fn insert_shift_later_line() {
        let loc = Location::new(4, 1);
        let moved = loc.shifted_by_insert(Location::new(0, 3), Location::new(2, 0));
        assert_eq!(moved, Location::new(6, 1));
    }

    #[test]
    fn remove_shift_inside_collapses() {
        let start = Location::new(1, 2);
        let end = Location::new(3, 0);
        assert_eq!(Location::new(2, 7).shifted_by_remove(start, end), start);
    }

    #[test]
    fn remove_shift_end_line() {
        let moved = Location::new(3, 4).shifted_by_remove(Location::new(1, 2), Location::new(3, 1));
        assert_eq!(moved, Location::new(1, 5));
    }

    #[test]
    fn remove_shift_later_line() {
        let moved = Location::new(7, 4).shifted_by_remove(Location::new(1, 2), Location::new(3, 1));
        assert_eq!(moved, Location::new(5, 4));
    }

    #[test]
    fn insert_then_remove_shift_is_identity() {
        let start = Location::new(2, 3);
        let end = start.advance("ab\ncd");
        for loc in [Location::new(2, 3), Location::new(2, 9), Location::new(5, 0)] {
            let there = loc.shifted_by_insert(start, end);
            assert_eq!(there.shifted_by_remove(start, end), loc);
        }
    }

    // -- Range --------------------------------------------------------------

    #[test]
    fn range_ordered_needs_swap() {
        let a = Location::new(5, 0);
        let b = Location::new(2, 3);
        let r = Range::ordered(a, b);
        assert_eq!(r.start, b);
        assert_eq!(r.end, a);
    }
}
