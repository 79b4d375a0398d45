//! Regex search and replace over a buffer.
//!
//! Patterns are compiled as byte regexes in multi-line mode and matched one
//! line at a time, so a match never spans a line break. Replacement text is
//! inserted literally; `$1` and friends are not expanded. Empty matches are
//! never reported, and searching stops at the end of the buffer instead of
//! wrapping.
//!
//! [`replace_all`] rewrites every match as a single undo step. A
//! [`ReplaceSession`] walks the matches one at a time for confirm-style
//! replacement: each accepted match is its own undo step, and
//! [`ReplaceSession::accept_all`] finishes the rest as one.

use q_text::{Location, Range, utf8};
use regex::bytes::Regex;
use tracing::debug;

use crate::buffer::Buffer;

/// Compile `pattern` for line-wise matching.
///
/// # Errors
///
/// Returns the regex crate's error for invalid patterns.
pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("(?m){pattern}"))
}

/// First non-empty match in `bytes` starting at or after byte `from`.
fn find_in_line(re: &Regex, bytes: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut at = from;
    while at <= bytes.len() {
        let m = re.find_at(bytes, at)?;
        if !m.is_empty() {
            return Some((m.start(), m.end()));
        }
        at = m.end() + utf8::rune_width(&bytes[m.end()..]).max(1);
    }
    None
}

/// Every non-empty, non-overlapping match on line `y` at or after rune
/// column `col`.
fn line_matches(buf: &Buffer, re: &Regex, y: usize, col: usize) -> Vec<Range> {
    let bytes = buf.line_bytes(y);
    let mut at = utf8::rune_to_byte_index(col, bytes);
    let mut out = Vec::new();
    while let Some((start, end)) = find_in_line(re, bytes, at) {
        out.push(Range::new(
            Location::new(y, utf8::byte_to_rune_index(start, bytes)),
            Location::new(y, utf8::byte_to_rune_index(end, bytes)),
        ));
        at = end;
    }
    out
}

/// The first match at or after `from`, or `None` if there is none before
/// the end of the buffer.
#[must_use]
pub fn find_next(buf: &Buffer, re: &Regex, from: Location) -> Option<Range> {
    let from = buf.store().clamp(from);
    (from.line..buf.line_count()).find_map(|y| {
        let bytes = buf.line_bytes(y);
        let col = if y == from.line { from.col } else { 0 };
        let (start, end) = find_in_line(re, bytes, utf8::rune_to_byte_index(col, bytes))?;
        Some(Range::new(
            Location::new(y, utf8::byte_to_rune_index(start, bytes)),
            Location::new(y, utf8::byte_to_rune_index(end, bytes)),
        ))
    })
}

/// Every match at or after `from`, in buffer order.
#[must_use]
pub fn find_all(buf: &Buffer, re: &Regex, from: Location) -> Vec<Range> {
    let from = buf.store().clamp(from);
    (from.line..buf.line_count())
        .flat_map(|y| line_matches(buf, re, y, if y == from.line { from.col } else { 0 }))
        .collect()
}

/// Replace every match in the buffer with `replacement`, as one undo step.
/// Returns the number of replacements.
pub fn replace_all(buf: &mut Buffer, re: &Regex, replacement: &str) -> usize {
    replace_from(buf, re, replacement, Location::ZERO)
}

fn replace_from(buf: &mut Buffer, re: &Regex, replacement: &str, from: Location) -> usize {
    let edits: Vec<(Range, String)> = find_all(buf, re, from)
        .into_iter()
        .map(|r| (r, replacement.to_owned()))
        .collect();
    if edits.is_empty() {
        return 0;
    }
    let count = buf.multiple_replace(edits);
    debug!(pattern = re.as_str(), count, "replaced matches");
    count
}

// ---------------------------------------------------------------------------
// ReplaceSession
// ---------------------------------------------------------------------------

/// Step-by-step replacement: find a match, then accept or skip it.
#[derive(Debug, Clone)]
pub struct ReplaceSession {
    re: Regex,
    replacement: String,
    /// Where the next search starts.
    cursor: Location,
    /// The match returned by the last `next`, not yet accepted or skipped.
    pending: Option<Range>,
    replaced: usize,
    done: bool,
}

impl ReplaceSession {
    /// A session replacing matches of `re` with `replacement`, searching
    /// from `from`.
    #[must_use]
    pub fn new(re: Regex, replacement: impl Into<String>, from: Location) -> Self {
        Self {
            re,
            replacement: replacement.into(),
            cursor: from,
            pending: None,
            replaced: 0,
            done: false,
        }
    }

    /// Find the next match. Calling it again without accepting or skipping
    /// returns the same match. `None` ends the session.
    pub fn next(&mut self, buf: &Buffer) -> Option<Range> {
        if self.done {
            return None;
        }
        if self.pending.is_none() {
            self.pending = find_next(buf, &self.re, self.cursor);
            if self.pending.is_none() {
                self.done = true;
            }
        }
        self.pending
    }

    /// Replace the pending match as its own undo step. Returns false if no
    /// match was pending.
    pub fn accept(&mut self, buf: &mut Buffer) -> bool {
        let Some(range) = self.pending.take() else {
            return false;
        };
        self.cursor = buf.replace(range.start, range.end, &self.replacement);
        self.replaced += 1;
        true
    }

    /// Leave the pending match alone and move past it.
    pub fn skip(&mut self) {
        if let Some(range) = self.pending.take() {
            self.cursor = range.end;
        }
    }

    /// Replace the pending match and every later one as a single undo step.
    /// Returns how many were replaced by this call.
    pub fn accept_all(&mut self, buf: &mut Buffer) -> usize {
        if self.done {
            return 0;
        }
        let from = self.pending.take().map_or(self.cursor, |r| r.start);
        let count = replace_from(buf, &self.re, &self.replacement, from);
        self.replaced += count;
        self.done = true;
        count
    }

    /// Replacements made so far.
    #[inline]
    #[must_use]
    pub const fn replaced(&self) -> usize {
        self.replaced
    }

    #[inline]
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
