//! Edit engine — the only two ways content changes.
//!
//! [`EditEngine::insert`] and [`EditEngine::remove`] are the mutation entry
//! points for everything above storage. Line moves, whitespace trimming,
//! search-and-replace, and undo itself are all expressed through them.
//!
//! Each call, in order: splices the [`LineStore`], refreshes the cached line
//! count, sets the modified flag, and shifts every cursor so it keeps
//! pointing at the same text. The store flags the first touched line for
//! rehighlight as part of the splice. Recording the inverse delta belongs
//! to the [`Buffer`](crate::buffer::Buffer), which owns the history; the
//! engine itself is a [`DeltaSink`] so undo can replay through it without
//! being recorded again.

use q_text::{LineStore, Location};
use tracing::trace;

use crate::cursor::CursorSet;
use crate::history::{Delta, DeltaKind, DeltaSink};

/// Line store, cursors, and the modified flag, mutated together.
#[derive(Debug, Clone)]
pub struct EditEngine {
    store: LineStore,
    cursors: CursorSet,
    line_count: usize,
    modified: bool,
}

impl EditEngine {
    /// Wrap `store` with a single cursor at the origin.
    #[must_use]
    pub fn new(store: LineStore) -> Self {
        let line_count = store.len();
        Self {
            store,
            cursors: CursorSet::new(),
            line_count,
            modified: false,
        }
    }

    // -- Accessors ----------------------------------------------------------

    #[inline]
    #[must_use]
    pub const fn store(&self) -> &LineStore {
        &self.store
    }

    /// Direct store access for highlight maintenance. Content must only
    /// change through `insert`/`remove`.
    #[inline]
    pub(crate) const fn store_mut(&mut self) -> &mut LineStore {
        &mut self.store
    }

    #[inline]
    #[must_use]
    pub const fn cursors(&self) -> &CursorSet {
        &self.cursors
    }

    #[inline]
    pub const fn cursors_mut(&mut self) -> &mut CursorSet {
        &mut self.cursors
    }

    /// Split borrow for cursor operations that need bounds.
    #[inline]
    pub fn cursors_and_store(&mut self) -> (&mut CursorSet, &LineStore) {
        (&mut self.cursors, &self.store)
    }

    #[inline]
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.line_count
    }

    #[inline]
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    #[inline]
    pub const fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    // -- Mutation -----------------------------------------------------------

    /// Insert `text` at `loc`. Returns the location just past it.
    ///
    /// Empty text is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if `loc` is not a valid location in the store.
    pub fn insert(&mut self, loc: Location, text: &str) -> Location {
        self.insert_bytes(loc, text.as_bytes())
    }

    /// [`insert`](Self::insert) for raw bytes, which need not be UTF-8.
    pub fn insert_bytes(&mut self, loc: Location, bytes: &[u8]) -> Location {
        if bytes.is_empty() {
            return loc;
        }
        let end = self.store.insert_bytes(loc, bytes);
        self.line_count = self.store.len();
        self.modified = true;
        self.cursors.shift_insert(loc, end);
        trace!(at = %loc, to = %end, "insert");
        end
    }

    /// Remove `start..end`, returning the removed bytes.
    ///
    /// An empty range is a no-op that returns nothing.
    ///
    /// # Panics
    ///
    /// Panics if either location is invalid or `start > end`.
    pub fn remove(&mut self, start: Location, end: Location) -> Vec<u8> {
        assert!(start <= end, "remove range is reversed: {start:?} > {end:?}");
        if start == end {
            return Vec::new();
        }
        let removed = self.store.delete_range(start, end);
        self.line_count = self.store.len();
        self.modified = true;
        self.cursors.shift_remove(start, end);
        trace!(from = %start, to = %end, "remove");
        removed
    }
}

impl DeltaSink for EditEngine {
    fn apply(&mut self, delta: &Delta) {
        match delta.kind {
            DeltaKind::Insert => {
                self.insert_bytes(delta.start, &delta.text);
            }
            DeltaKind::Remove => {
                self.remove(delta.start, delta.end);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn engine(text: &str) -> EditEngine {
        EditEngine::new(LineStore::from_text(text))
    }

    // -- Insert -------------------------------------------------------------

    #[test]
    fn insert_after_multibyte_rune() {
        let mut e = engine("héllo\nworld");
        e.insert(Location::new(0, 1), "X");
        assert_eq!(e.store().line(0).bytes(), "hXéllo".as_bytes());
        assert_eq!(e.line_count(), 2);
        assert!(e.is_modified());
    }

    #[test]
    fn insert_newline_updates_line_count() {
        let mut e = engine("ab");
        let end = e.insert(Location::new(0, 1), "\n\n");
        assert_eq!(end, Location::new(2, 0));
        assert_eq!(e.line_count(), 3);
    }

    #[test]
    fn empty_insert_is_noop() {
        let mut e = engine("ab");
        assert_eq!(e.insert(Location::new(0, 1), ""), Location::new(0, 1));
        assert!(!e.is_modified());
    }

    #[test]
    fn insert_moves_cursor_along() {
        let mut e = engine("ab");
        let (cursors, store) = e.cursors_and_store();
        cursors.current_mut().set_location(Location::new(0, 1), store);
        e.insert(Location::new(0, 1), "xyz");
        assert_eq!(e.cursors().current().location(), Location::new(0, 4));
    }

    // -- Remove -------------------------------------------------------------

    #[test]
    fn remove_returns_text() {
        let mut e = engine("one\ntwo\nthree");
        let removed = e.remove(Location::new(0, 1), Location::new(2, 2));
        assert_eq!(removed, b"ne\ntwo\nth");
        assert_eq!(e.store().to_string(), "oree");
        assert_eq!(e.line_count(), 1);
    }

    #[test]
    fn remove_whole_single_empty_line_is_noop() {
        let mut e = engine("");
        let (start, end) = (e.store().start(), e.store().end());
        assert!(e.remove(start, end).is_empty());
        assert_eq!(e.line_count(), 1);
        assert!(!e.is_modified());
    }

    #[test]
    fn remove_collapses_cursor_inside() {
        let mut e = engine("abcdef");
        let (cursors, store) = e.cursors_and_store();
        cursors.current_mut().set_location(Location::new(0, 3), store);
        e.remove(Location::new(0, 1), Location::new(0, 5));
        assert_eq!(e.cursors().current().location(), Location::new(0, 1));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn remove_past_end_panics() {
        let mut e = engine("abc");
        e.remove(Location::ZERO, Location::new(0, 9));
    }

    // -- Delta replay -------------------------------------------------------

    #[test]
    fn revert_undoes_apply() {
        let mut e = engine("hello");
        let d = Delta::insert(Location::new(0, 5), " world");
        e.apply(&d);
        assert_eq!(e.store().to_string(), "hello world");
        e.revert(&d);
        assert_eq!(e.store().to_string(), "hello");
    }

    #[test]
    fn revert_restores_invalid_utf8_exactly() {
        let raw = [b'a', 0xE4, 0xB8, b'b'];
        let mut e = EditEngine::new(LineStore::from_reader(&raw[..], 4).unwrap());
        let (start, end) = (Location::new(0, 1), Location::new(0, 3));

        let d = Delta::remove(start, end, e.remove(start, end));
        assert_eq!(e.store().line(0).bytes(), b"ab");
        e.revert(&d);
        assert_eq!(e.store().line(0).bytes(), raw);
        assert_eq!(e.store().rune_len(0), 4);
        e.apply(&d);
        assert_eq!(e.store().line(0).bytes(), b"ab");
    }

    // -- Properties ---------------------------------------------------------

    proptest! {
        #[test]
        fn insert_then_remove_span_is_identity(
            base in "[a-zé\n]{0,24}",
            text in "[x-zö世\n]{1,12}",
            line in any::<prop::sample::Index>(),
            col in any::<prop::sample::Index>(),
        ) {
            let mut e = engine(&base);
            let before = e.store().to_string();
            let count = e.line_count();

            let y = line.index(e.line_count());
            let x = col.index(e.store().rune_len(y) + 1);
            let at = Location::new(y, x);

            let end = e.insert(at, &text);
            let removed = e.remove(at, end);

            prop_assert_eq!(removed, text.into_bytes());
            prop_assert_eq!(e.store().to_string(), before);
            prop_assert_eq!(e.line_count(), count);
        }
    }
}
