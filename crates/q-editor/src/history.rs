//! Undo/redo history — grouped, invertible deltas.
//!
//! Every buffer mutation is recorded as a [`Delta`]. Deltas are grouped into
//! [`Transaction`]s, the atomic unit of undo/redo. Groups form in two ways:
//!
//! - **Explicitly**: [`History::begin`] … [`History::commit`] around a
//!   compound operation (paste, replace-all, save-time cleanup). Groups nest;
//!   only the outermost commit closes the transaction.
//! - **By coalescing**: outside an explicit group, a single-rune edit that
//!   continues the previous typed edit joins its transaction. Typing `abc`
//!   is one undo step, and so is a run of backspaces.
//!
//! Undo replays a group's inverses in reverse order through a [`DeltaSink`],
//! so the history never needs a reference to the buffer it belongs to.
//!
//! # Usage
//!
//! ```text
//! history.begin(cursor);
//! // perform edits, recording each one:
//! history.record(delta, before, after);
//! history.commit(cursor);
//! ```
//!
//! Empty transactions are discarded. Any recorded edit clears the redo
//! stack: there is no redo tree.

use serde::{Deserialize, Serialize};

use q_text::{Location, utf8};

// ---------------------------------------------------------------------------
// Delta
// ---------------------------------------------------------------------------

/// Direction of a [`Delta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaKind {
    Insert,
    Remove,
}

/// One invertible edit.
///
/// `start..end` is the span the text occupies in the buffer: after the edit
/// for an insert, before the edit for a remove. `text` holds the exact bytes,
/// so lines that are not valid UTF-8 replay unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub kind: DeltaKind,
    pub text: Vec<u8>,
    pub start: Location,
    pub end: Location,
}

impl Delta {
    /// `text` was inserted at `start`.
    #[must_use]
    pub fn insert(start: Location, text: impl Into<Vec<u8>>) -> Self {
        let text = text.into();
        let end = start.advance(&text);
        Self {
            kind: DeltaKind::Insert,
            text,
            start,
            end,
        }
    }

    /// `text` was removed from `start..end`.
    #[must_use]
    pub fn remove(start: Location, end: Location, text: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: DeltaKind::Remove,
            text: text.into(),
            start,
            end,
        }
    }

    /// The delta that undoes this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            kind: match self.kind {
                DeltaKind::Insert => DeltaKind::Remove,
                DeltaKind::Remove => DeltaKind::Insert,
            },
            text: self.text.clone(),
            start: self.start,
            end: self.end,
        }
    }

    /// One rune, not a line feed: the shape of a keystroke.
    fn is_keystroke(&self) -> bool {
        !self.text.is_empty() && self.text != b"\n" && utf8::rune_width(&self.text) == self.text.len()
    }

    /// True when `next` continues the same typing gesture as `self`.
    fn continues_with(&self, next: &Self) -> bool {
        match (self.kind, next.kind) {
            (DeltaKind::Insert, DeltaKind::Insert) => next.start == self.end,
            // Backspace walks left, forward delete stays put.
            (DeltaKind::Remove, DeltaKind::Remove) => {
                next.end == self.start || next.start == self.start
            }
            _ => false,
        }
    }
}

/// Something deltas can be replayed against.
pub trait DeltaSink {
    /// Perform `delta` as written.
    fn apply(&mut self, delta: &Delta);

    /// Undo `delta`.
    fn revert(&mut self, delta: &Delta) {
        self.apply(&delta.inverse());
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A group of deltas that undo/redo as one unit, with the cursor location
/// to restore on either side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    deltas: Vec<Delta>,
    cursor_before: Location,
    cursor_after: Location,
}

impl Transaction {
    #[must_use]
    pub fn deltas(&self) -> &[Delta] {
        &self.deltas
    }

    fn undo<S: DeltaSink + ?Sized>(&self, sink: &mut S) {
        for delta in self.deltas.iter().rev() {
            sink.revert(delta);
        }
    }

    fn redo<S: DeltaSink + ?Sized>(&self, sink: &mut S) {
        for delta in &self.deltas {
            sink.apply(delta);
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Undo/redo stacks for one buffer.
///
/// Serializes to the two stacks only; an open group or typing run is not
/// part of a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    undo_stack: Vec<Transaction>,
    redo_stack: Vec<Transaction>,
    #[serde(skip)]
    pending: Option<Transaction>,
    #[serde(skip)]
    depth: usize,
    /// The top of the undo stack may still absorb keystrokes.
    #[serde(skip)]
    typing: bool,
}

impl History {
    /// Create an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            pending: None,
            depth: 0,
            typing: false,
        }
    }

    // -- Grouping -----------------------------------------------------------

    /// Open an explicit group. `cursor` is the location to restore on undo.
    /// Nested calls join the outermost group.
    pub fn begin(&mut self, cursor: Location) {
        self.typing = false;
        if self.depth == 0 {
            self.pending = Some(Transaction {
                deltas: Vec::new(),
                cursor_before: cursor,
                cursor_after: cursor,
            });
        }
        self.depth += 1;
    }

    /// Close an explicit group. The outermost commit pushes the transaction;
    /// `cursor` is the location to restore on redo. Empty groups vanish.
    pub fn commit(&mut self, cursor: Location) {
        match self.depth {
            0 => return,
            1 => {}
            _ => {
                self.depth -= 1;
                return;
            }
        }
        self.depth = 0;
        if let Some(mut txn) = self.pending.take() {
            if txn.deltas.is_empty() {
                return;
            }
            txn.cursor_after = cursor;
            self.undo_stack.push(txn);
        }
    }

    /// End the current typing run. The next keystroke starts a new group.
    pub const fn seal(&mut self) {
        self.typing = false;
    }

    /// True while an explicit group is open.
    #[must_use]
    pub const fn in_group(&self) -> bool {
        self.depth > 0
    }

    // -- Recording ----------------------------------------------------------

    /// Record an edit already performed on the buffer.
    pub fn record(&mut self, delta: Delta, before: Location, after: Location) {
        self.redo_stack.clear();

        if let Some(txn) = &mut self.pending {
            txn.deltas.push(delta);
            txn.cursor_after = after;
            return;
        }

        let keystroke = delta.is_keystroke();
        if keystroke && self.typing {
            if let Some(txn) = self.undo_stack.last_mut() {
                if txn.deltas.last().is_some_and(|prev| prev.continues_with(&delta)) {
                    txn.deltas.push(delta);
                    txn.cursor_after = after;
                    return;
                }
            }
        }

        self.undo_stack.push(Transaction {
            deltas: vec![delta],
            cursor_before: before,
            cursor_after: after,
        });
        self.typing = keystroke;
    }

    // -- Undo / redo --------------------------------------------------------

    /// Undo the last transaction. Returns the cursor location to restore,
    /// or `None` if there's nothing to undo.
    pub fn undo<S: DeltaSink + ?Sized>(&mut self, sink: &mut S) -> Option<Location> {
        self.close_pending();
        self.typing = false;

        let txn = self.undo_stack.pop()?;
        txn.undo(sink);
        let cursor = txn.cursor_before;
        self.redo_stack.push(txn);
        Some(cursor)
    }

    /// Redo the last undone transaction. Returns the cursor location to
    /// restore, or `None` if there's nothing to redo.
    pub fn redo<S: DeltaSink + ?Sized>(&mut self, sink: &mut S) -> Option<Location> {
        self.typing = false;

        let txn = self.redo_stack.pop()?;
        txn.redo(sink);
        let cursor = txn.cursor_after;
        self.undo_stack.push(txn);
        Some(cursor)
    }

    // -- Queries ------------------------------------------------------------

    /// True if there are transactions that can be undone.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
            || self
                .pending
                .as_ref()
                .is_some_and(|t| !t.deltas.is_empty())
    }

    /// True if there are transactions that can be redone.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of transactions on the undo stack.
    #[must_use]
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of transactions on the redo stack.
    #[must_use]
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// The most recent undoable transaction.
    #[must_use]
    pub fn last(&self) -> Option<&Transaction> {
        self.undo_stack.last()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Push an open group as-is, however deep the nesting.
    fn close_pending(&mut self) {
        if let Some(txn) = self.pending.take() {
            if !txn.deltas.is_empty() {
                self.undo_stack.push(txn);
            }
        }
        self.depth = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
