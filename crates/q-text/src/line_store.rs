//! Line store — the fundamental unit of text storage.
//!
//! A [`LineStore`] is an ordered sequence of [`Line`]s. Each line owns its
//! bytes (never containing `\n`) plus the highlight slots the
//! [`highlight`](crate::highlight) pass fills in: the lexer state carried out
//! of the line, the matched spans for the line, and a rehighlight flag.
//!
//! # Design choices
//!
//! - **Lines are bytes, locations are runes.** Every primitive that takes a
//!   [`Location`] translates its column through
//!   [`rune_to_byte_index`](crate::utf8::rune_to_byte_index) before touching
//!   storage. Byte offsets only appear in the byte-level primitives
//!   ([`insert_byte`](LineStore::insert_byte),
//!   [`delete_to_end`](LineStore::delete_to_end), …).
//!
//! - **Never empty.** An empty file is one empty line. No primitive may
//!   remove the last remaining line.
//!
//! - **Terminators are not stored.** The convention (LF or CRLF) is detected
//!   from the first terminator while loading and kept on the store so that
//!   serialization can reproduce it.
//!
//! - **Indices are a caller contract.** Out-of-range lines or columns are a
//!   programming defect and panic immediately instead of corrupting content.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};

use memchr::memchr;
use serde::{Deserialize, Serialize};

use crate::highlight::{LexState, LineMatch};
use crate::location::Location;
use crate::utf8;

/// Lines read before the capacity estimate kicks in.
pub const ESTIMATE_AFTER_LINES: usize = 1000;

/// Extra lines reserved on top of the estimate.
pub const CAPACITY_SLACK: usize = 10_000;

// ---------------------------------------------------------------------------
// Line ending
// ---------------------------------------------------------------------------

/// Line ending convention of a file.
///
/// Detected on load from the first terminator. Defaults to `Lf` for new
/// buffers and for files without any terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// `\n` — Unix, macOS, Linux.
    #[default]
    #[serde(alias = "unix")]
    Lf,
    /// `\r\n` — Windows, DOS.
    #[serde(alias = "dos")]
    CrLf,
}

impl LineEnding {
    /// The byte representation of this line ending.
    #[inline]
    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
        }
    }

    /// Parse a `fileformat` value: `unix`/`lf` or `dos`/`crlf`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "unix" | "lf" => Some(Self::Lf),
            "dos" | "crlf" => Some(Self::CrLf),
            _ => None,
        }
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lf => f.write_str("unix"),
            Self::CrLf => f.write_str("dos"),
        }
    }
}

// ---------------------------------------------------------------------------
// Line
// ---------------------------------------------------------------------------

/// One line of text plus its highlight slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub(crate) data: Vec<u8>,
    /// Lexer state observed when leaving this line.
    pub(crate) state: Option<LexState>,
    pub(crate) matches: LineMatch,
    pub(crate) rehighlight: bool,
}

impl Line {
    /// A line holding `data`, with empty highlight slots.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        debug_assert!(memchr(b'\n', &data).is_none(), "a line never holds a line feed");
        Self {
            data,
            ..Self::default()
        }
    }

    /// The raw bytes of the line.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// The line as text. Invalid UTF-8 is replaced with `U+FFFD`.
    #[inline]
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Number of runes in the line — the largest valid column.
    #[inline]
    #[must_use]
    pub fn rune_len(&self) -> usize {
        utf8::rune_count(&self.data)
    }

    /// Cached lexer state leaving this line.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> Option<LexState> {
        self.state
    }

    /// Cached highlight spans for this line.
    #[inline]
    #[must_use]
    pub const fn matches(&self) -> &LineMatch {
        &self.matches
    }

    /// True when the highlight slots are stale.
    #[inline]
    #[must_use]
    pub const fn needs_rehighlight(&self) -> bool {
        self.rehighlight
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Collects raw lines while loading, applying the convention detected from
/// the first terminator.
#[derive(Default)]
struct Splitter {
    lines: Vec<Line>,
    ending: Option<LineEnding>,
}

impl Splitter {
    /// Push a line that was followed by `\n` (the `\n` already stripped).
    fn push_terminated(&mut self, mut data: Vec<u8>) {
        let ending = *self.ending.get_or_insert(if data.last() == Some(&b'\r') {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        });
        if ending == LineEnding::CrLf && data.last() == Some(&b'\r') {
            data.pop();
        }
        self.lines.push(Line::new(data));
    }

    /// Push the trailing unterminated bytes (possibly empty) and finish.
    fn finish(mut self, data: Vec<u8>) -> LineStore {
        self.lines.push(Line::new(data));
        LineStore {
            lines: self.lines,
            line_ending: self.ending.unwrap_or_default(),
            dirty_from: 0,
        }
    }
}

/// Extrapolate a total line count from the average line length seen so far.
///
/// `size_hint` is the declared input size in bytes, `lines` and `consumed`
/// describe what has been read. The result includes [`CAPACITY_SLACK`].
#[must_use]
pub fn estimate_line_capacity(size_hint: u64, lines: usize, consumed: usize) -> usize {
    let size = usize::try_from(size_hint).unwrap_or(usize::MAX);
    size.saturating_mul(lines) / consumed.max(1) + CAPACITY_SLACK
}

// ---------------------------------------------------------------------------
// LineStore
// ---------------------------------------------------------------------------

/// Ordered sequence of lines. Always holds at least one line.
#[derive(Clone, PartialEq, Eq)]
pub struct LineStore {
    pub(crate) lines: Vec<Line>,
    line_ending: LineEnding,
    /// No line before this index is flagged for rehighlight.
    pub(crate) dirty_from: usize,
}

impl LineStore {
    // -- Construction -------------------------------------------------------

    /// A store holding exactly one empty line.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: vec![Line::default()],
            line_ending: LineEnding::Lf,
            dirty_from: 0,
        }
    }

    /// Split `text` into lines.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut splitter = Splitter::default();
        let mut rest = text.as_bytes();
        while let Some(nl) = memchr(b'\n', rest) {
            splitter.push_terminated(rest[..nl].to_vec());
            rest = &rest[nl + 1..];
        }
        splitter.finish(rest.to_vec())
    }

    /// Read lines from a byte stream.
    ///
    /// `size_hint` is the declared size of the input. It never affects the
    /// content: after [`ESTIMATE_AFTER_LINES`] lines the average line length
    /// is used to reserve capacity for the whole input in one step.
    ///
    /// # Errors
    ///
    /// Returns any error produced by the underlying reader (including a
    /// decoding codec wrapped around it).
    pub fn from_reader<R: Read>(reader: R, size_hint: u64) -> io::Result<Self> {
        let mut reader = BufReader::new(reader);
        let mut splitter = Splitter {
            lines: Vec::with_capacity(ESTIMATE_AFTER_LINES),
            ending: None,
        };
        let mut consumed = 0usize;
        let mut estimated = false;

        loop {
            let mut data = Vec::new();
            let n = reader.read_until(b'\n', &mut data)?;

            if !estimated && splitter.lines.len() >= ESTIMATE_AFTER_LINES {
                let estimate = estimate_line_capacity(size_hint, splitter.lines.len(), consumed);
                let additional = estimate.saturating_sub(splitter.lines.len());
                splitter.lines.reserve_exact(additional);
                estimated = true;
            }
            consumed += n;

            if data.last() == Some(&b'\n') {
                data.pop();
                splitter.push_terminated(data);
            } else {
                return Ok(splitter.finish(data));
            }
        }
    }

    // -- Access -------------------------------------------------------------

    /// Number of lines. Never zero.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True when the store holds a single empty line.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].data.is_empty()
    }

    /// The line at index `n`.
    ///
    /// # Panics
    ///
    /// Panics if `n >= len()`.
    #[inline]
    #[must_use]
    pub fn line(&self, n: usize) -> &Line {
        self.check_line(n);
        &self.lines[n]
    }

    /// The line at index `n`, or `None` when out of range.
    #[inline]
    #[must_use]
    pub fn get(&self, n: usize) -> Option<&Line> {
        self.lines.get(n)
    }

    /// Iterate over all lines in order.
    pub fn lines(&self) -> impl ExactSizeIterator<Item = &Line> {
        self.lines.iter()
    }

    /// Number of runes in line `n`.
    #[inline]
    #[must_use]
    pub fn rune_len(&self, n: usize) -> usize {
        self.line(n).rune_len()
    }

    /// Total rune count, counting each line separator as one rune.
    #[must_use]
    pub fn rune_count(&self) -> usize {
        let runes: usize = self.lines.iter().map(Line::rune_len).sum();
        runes + self.lines.len() - 1
    }

    /// Total byte count of the line contents (separators excluded).
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.lines.iter().map(|l| l.data.len()).sum()
    }

    /// The first location of the store.
    #[inline]
    #[must_use]
    pub const fn start(&self) -> Location {
        Location::ZERO
    }

    /// The location just past the last rune of the last line.
    #[must_use]
    pub fn end(&self) -> Location {
        let last = self.lines.len() - 1;
        Location::new(last, self.lines[last].rune_len())
    }

    /// Clamp `loc` to the nearest valid location.
    #[must_use]
    pub fn clamp(&self, loc: Location) -> Location {
        let line = loc.line.min(self.lines.len() - 1);
        Location::new(line, loc.col.min(self.lines[line].rune_len()))
    }

    /// True when `loc` is a valid location in this store.
    #[must_use]
    pub fn contains(&self, loc: Location) -> bool {
        self.lines
            .get(loc.line)
            .and_then(|l| utf8::checked_rune_to_byte_index(loc.col, &l.data))
            .is_some()
    }

    /// The rune at `loc`, or `None` at end of line.
    #[must_use]
    pub fn rune_at(&self, loc: Location) -> Option<char> {
        utf8::rune_at(loc.col, self.line(loc.line).bytes())
    }

    /// Byte offset of `loc` within its line.
    ///
    /// # Panics
    ///
    /// Panics if the line or column is out of range.
    #[must_use]
    pub fn byte_offset(&self, loc: Location) -> usize {
        let data = &self.line(loc.line).data;
        match utf8::checked_rune_to_byte_index(loc.col, data) {
            Some(offset) => offset,
            None => panic!(
                "column {} out of range on line {} ({} runes)",
                loc.col,
                loc.line,
                utf8::rune_count(data)
            ),
        }
    }

    /// The convention detected at load time (or set since).
    #[inline]
    #[must_use]
    pub const fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Override the convention used for serialization.
    #[inline]
    pub const fn set_line_ending(&mut self, ending: LineEnding) {
        self.line_ending = ending;
    }

    /// Serialize every line separated by `ending`. Returns the number of
    /// bytes written.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to<W: Write>(&self, mut w: W, ending: LineEnding) -> io::Result<usize> {
        let eol = ending.as_bytes();
        let mut written = 0;
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                w.write_all(eol)?;
                written += eol.len();
            }
            w.write_all(&line.data)?;
            written += line.data.len();
        }
        Ok(written)
    }

    // -- Reading ------------------------------------------------------------

    /// The raw bytes between two locations. Lines are separated by a single
    /// `\n`.
    ///
    /// # Panics
    ///
    /// Panics if either location is invalid.
    #[must_use]
    pub fn substr_bytes(&self, start: Location, end: Location) -> Vec<u8> {
        debug_assert!(start <= end, "substr requires start <= end");
        let sx = self.byte_offset(start);
        let ex = self.byte_offset(end);
        if start.line == end.line {
            return self.lines[start.line].data[sx..ex].to_vec();
        }

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.lines[start.line].data[sx..]);
        bytes.push(b'\n');
        for line in &self.lines[start.line + 1..end.line] {
            bytes.extend_from_slice(&line.data);
            bytes.push(b'\n');
        }
        bytes.extend_from_slice(&self.lines[end.line].data[..ex]);
        bytes
    }

    /// [`substr_bytes`](Self::substr_bytes) decoded for display. Invalid
    /// UTF-8 becomes U+FFFD.
    #[must_use]
    pub fn substr(&self, start: Location, end: Location) -> String {
        String::from_utf8_lossy(&self.substr_bytes(start, end)).into_owned()
    }

    /// The whole content with lines joined by `\n`, byte for byte.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len() + self.lines.len());
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push(b'\n');
            }
            out.extend_from_slice(&line.data);
        }
        out
    }

    // -- Splicing -----------------------------------------------------------

    /// Splice one byte into line `line` at byte offset `at`.
    ///
    /// # Panics
    ///
    /// Panics if `value` is a line feed or the offset is out of range.
    pub fn insert_byte(&mut self, line: usize, at: usize, value: u8) {
        assert!(value != b'\n', "insert_byte cannot insert a line feed; use split");
        self.check_line(line);
        self.lines[line].data.insert(at, value);
        self.touch(line);
    }

    /// Insert `bytes` at `loc`. Every embedded `\n` splits the line at the
    /// running position and insertion continues at column 0 of the new
    /// line. Returns the location just past the inserted bytes.
    ///
    /// # Panics
    ///
    /// Panics if `loc` is invalid.
    pub fn insert_bytes(&mut self, loc: Location, bytes: &[u8]) -> Location {
        let mut y = loc.line;
        let mut x = self.byte_offset(loc);
        let mut col = loc.col;
        let mut rest = bytes;

        while let Some(nl) = memchr(b'\n', rest) {
            self.splice_in(y, x, &rest[..nl]);
            self.split_at_byte(y, x + nl);
            y += 1;
            x = 0;
            col = 0;
            rest = &rest[nl + 1..];
        }
        self.splice_in(y, x, rest);
        Location::new(y, col + utf8::rune_count(rest))
    }

    /// Split the line at `loc`: a new line below receives everything from
    /// `loc.col` to the end, the original line is truncated at `loc.col`.
    ///
    /// The lower line inherits the lexer state that used to leave the
    /// original line. The upper line's state is cleared. Both lines lose
    /// their match caches and are flagged for rehighlight.
    pub fn split(&mut self, loc: Location) {
        let at = self.byte_offset(loc);
        self.split_at_byte(loc.line, at);
    }

    /// Append line `b` to the end of line `a`, then remove line `b`.
    ///
    /// The joined line carries `b`'s outgoing lexer state. This is the exact
    /// inverse of a [`split`](Self::split) at the original join point.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range or `a == b`.
    pub fn join_lines(&mut self, a: usize, b: usize) {
        assert!(a != b, "cannot join line {a} with itself");
        self.check_line(a);
        self.check_line(b);

        let removed = self.lines.remove(b);
        let a = if b < a { a - 1 } else { a };
        let target = &mut self.lines[a];
        target.data.extend_from_slice(&removed.data);
        target.state = removed.state;
        self.touch(a);
    }

    /// Remove the text between `start` and `end`, returning its raw bytes.
    ///
    /// A multi-line range deletes every line strictly between the two,
    /// truncates the start line at `start`, cuts the head of the end line up
    /// to `end`, and joins the two remainders.
    ///
    /// # Panics
    ///
    /// Panics if either location is invalid.
    pub fn delete_range(&mut self, start: Location, end: Location) -> Vec<u8> {
        debug_assert!(start <= end, "delete_range requires start <= end");
        let removed = self.substr_bytes(start, end);
        let sx = self.byte_offset(start);
        let ex = self.byte_offset(end);

        if start.line == end.line {
            self.lines[start.line].data.drain(sx..ex);
            self.touch(start.line);
        } else {
            self.lines.drain(start.line + 1..end.line);
            self.delete_to_end(start.line, sx);
            self.delete_from_start(start.line + 1, ex);
            self.join_lines(start.line, start.line + 1);
        }
        removed
    }

    /// Truncate line `line` at byte offset `at`.
    pub fn delete_to_end(&mut self, line: usize, at: usize) {
        self.check_line(line);
        self.lines[line].data.truncate(at);
        self.touch(line);
    }

    /// Remove the bytes of line `line` before byte offset `at`.
    pub fn delete_from_start(&mut self, line: usize, at: usize) {
        self.check_line(line);
        self.lines[line].data.drain(..at);
        self.touch(line);
    }

    /// Remove the single byte at byte offset `at` of line `line`.
    pub fn delete_byte(&mut self, line: usize, at: usize) {
        self.check_line(line);
        self.lines[line].data.remove(at);
        self.touch(line);
    }

    /// Remove line `n` entirely.
    ///
    /// # Panics
    ///
    /// Panics if `n` is out of range or it is the only line left.
    pub fn delete_line(&mut self, n: usize) {
        self.check_line(n);
        assert!(self.lines.len() > 1, "cannot delete the last remaining line");
        self.lines.remove(n);
        self.dirty_from = self.dirty_from.min(n);
    }

    // -- Helpers ------------------------------------------------------------

    fn splice_in(&mut self, line: usize, at: usize, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.lines[line].data.splice(at..at, bytes.iter().copied());
        self.touch(line);
    }

    fn split_at_byte(&mut self, y: usize, at: usize) {
        let upper = &mut self.lines[y];
        let tail = upper.data.split_off(at);
        let carried = upper.state.take();
        upper.matches.clear();

        let mut lower = Line::new(tail);
        lower.state = carried;
        self.lines.insert(y + 1, lower);

        self.touch(y);
        self.touch(y + 1);
    }

    /// Drop the match cache of a line whose bytes changed and flag it.
    fn touch(&mut self, n: usize) {
        self.lines[n].matches.clear();
        self.mark_dirty(n);
    }

    fn check_line(&self, n: usize) {
        assert!(
            n < self.lines.len(),
            "line {n} out of range ({} lines)",
            self.lines.len()
        );
    }
}

impl Default for LineStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LineStore {
    /// The content with lines joined by `\n`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            f.write_str(&line.text())?;
        }
        Ok(())
    }
}

impl fmt::Debug for LineStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineStore")
            .field("lines", &self.lines.len())
            .field("line_ending", &self.line_ending)
            .field("dirty_from", &self.dirty_from)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
