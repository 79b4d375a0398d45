//! Per-line highlight state cache and the forward fixed-point pass.
//!
//! Every [`Line`](crate::Line) carries the lexer state observed when leaving
//! it, the spans matched on its own content, and a rehighlight flag. The
//! lexer itself is external: anything implementing [`Highlighter`] can drive
//! the pass.
//!
//! # Design choices
//!
//! - **Opaque state.** [`LexState`] is a plain `Copy` token. The cache only
//!   ever compares states for equality; what they mean belongs to the
//!   highlighter.
//!
//! - **Fixed point.** [`LineStore::rehighlight`] starts at the first flagged
//!   line and walks forward, continuing past a line only if its outgoing
//!   state changed or the next line is flagged too. An unterminated block
//!   comment therefore re-lexes everything below it; an edit inside a
//!   plain line re-lexes one line.
//!
//! - **Edits keep the old state.** Byte edits clear the match cache and flag
//!   the line, but leave the previous outgoing state in place so the pass
//!   has something to compare against. A split is the exception: the upper
//!   half starts with no state.
//!
//! - **Resumable.** A budget bounds the number of lines recomputed in one
//!   call. The line where the pass stopped stays flagged, so the next call
//!   resumes there. State is only swapped in after a line is fully lexed.

use std::collections::BTreeMap;

use tracing::trace;

use crate::line_store::LineStore;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lexer context carried from the end of one line into the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LexState(u64);

impl LexState {
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Highlight group identifier, assigned by the highlighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Group(u32);

impl Group {
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }
}

/// Matched spans for one line: each key is the rune column where a group
/// starts, and the group runs until the next key or the end of the line.
pub type LineMatch = BTreeMap<usize, Group>;

/// Result of lexing one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineHighlight {
    /// State when leaving the line.
    pub state: Option<LexState>,
    pub matches: LineMatch,
}

/// A line-at-a-time lexer.
pub trait Highlighter {
    /// Lex `line` given the state left by the previous line (`None` for the
    /// first line, or when the previous line has never been lexed).
    fn highlight_line(&self, line: &[u8], incoming: Option<LexState>) -> LineHighlight;
}

/// Outcome of a [`LineStore::rehighlight`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightProgress {
    /// No line is left flagged.
    Complete,
    /// The budget ran out; call again to continue.
    Suspended,
}

// ---------------------------------------------------------------------------
// Cache maintenance on the store
// ---------------------------------------------------------------------------

impl LineStore {
    /// Flag line `n` for rehighlight.
    pub fn mark_dirty(&mut self, n: usize) {
        self.lines[n].rehighlight = true;
        self.dirty_from = self.dirty_from.min(n);
    }

    /// Flag every line. Needed whenever the active syntax changes.
    pub fn mark_all_dirty(&mut self) {
        for line in &mut self.lines {
            line.rehighlight = true;
        }
        self.dirty_from = 0;
    }

    /// Index of the first flagged line.
    #[must_use]
    pub fn first_dirty(&self) -> Option<usize> {
        self.next_dirty(self.dirty_from)
    }

    /// Drop all cached states and matches, flagging every line.
    pub fn clear_matches(&mut self) {
        for line in &mut self.lines {
            line.state = None;
            line.matches.clear();
            line.rehighlight = true;
        }
        self.dirty_from = 0;
    }

    /// Run the forward fixed-point pass.
    ///
    /// `budget` caps how many lines are lexed in this call; `None` runs to
    /// completion.
    pub fn rehighlight<H>(&mut self, hl: &H, budget: Option<usize>) -> HighlightProgress
    where
        H: Highlighter + ?Sized,
    {
        let Some(mut y) = self.first_dirty() else {
            self.dirty_from = self.lines.len();
            return HighlightProgress::Complete;
        };
        let first = y;
        let mut lexed = 0usize;

        loop {
            if budget.is_some_and(|b| lexed >= b) {
                self.lines[y].rehighlight = true;
                self.dirty_from = y;
                trace!(first, stopped_at = y, lexed, "highlight pass suspended");
                return HighlightProgress::Suspended;
            }

            let incoming = if y == 0 { None } else { self.lines[y - 1].state };
            let line = &mut self.lines[y];
            let out = hl.highlight_line(&line.data, incoming);
            let changed = line.state != out.state;
            line.state = out.state;
            line.matches = out.matches;
            line.rehighlight = false;
            lexed += 1;

            let next = y + 1;
            if next >= self.lines.len() {
                break;
            }
            if changed || self.lines[next].rehighlight {
                y = next;
            } else if let Some(n) = self.next_dirty(next) {
                y = n;
            } else {
                break;
            }
        }

        self.dirty_from = self.lines.len();
        trace!(first, lexed, "highlight pass complete");
        HighlightProgress::Complete
    }

    fn next_dirty(&self, from: usize) -> Option<usize> {
        let from = from.min(self.lines.len());
        self.lines[from..]
            .iter()
            .position(|l| l.rehighlight)
            .map(|i| from + i)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
