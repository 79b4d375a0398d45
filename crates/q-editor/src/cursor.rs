//! Cursors — locations with optional selection anchors, and the set of them.
//!
//! A [`Cursor`] is a plain value: a location, an optional anchor, and a
//! stable number. It never points back at the buffer; anything that needs
//! bounds takes the [`LineStore`] as a parameter.
//!
//! # Multiple cursors
//!
//! A [`CursorSet`] always holds at least one cursor. Index 0 is the primary
//! cursor (its location is what gets persisted); `current` is the one the
//! user is driving. Edits shift every cursor so each keeps pointing at the
//! same text. When two cursors land on the same location, [`CursorSet::merge`]
//! keeps the first and drops the rest.

use q_text::{LineStore, Location, Range};

/// A cursor in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    loc: Location,

    /// Selection anchor. When `Some`, the text between `anchor` and `loc`
    /// is selected.
    anchor: Option<Location>,

    /// Stable number within its set, reassigned by [`CursorSet::renumber`].
    num: usize,
}

impl Cursor {
    /// A cursor at `loc` with no selection.
    #[must_use]
    pub const fn at(loc: Location) -> Self {
        Self {
            loc,
            anchor: None,
            num: 0,
        }
    }

    // -- Accessors ----------------------------------------------------------

    #[inline]
    #[must_use]
    pub const fn location(&self) -> Location {
        self.loc
    }

    #[inline]
    #[must_use]
    pub const fn anchor(&self) -> Option<Location> {
        self.anchor
    }

    #[inline]
    #[must_use]
    pub const fn num(&self) -> usize {
        self.num
    }

    #[inline]
    #[must_use]
    pub const fn has_selection(&self) -> bool {
        self.anchor.is_some()
    }

    /// The selected range, always ordered.
    #[must_use]
    pub fn selection(&self) -> Option<Range> {
        self.anchor.map(|anchor| Range::ordered(anchor, self.loc))
    }

    // -- Mutation -----------------------------------------------------------

    /// Move to `loc`, clamped to the store. Keeps the anchor.
    pub fn set_location(&mut self, loc: Location, store: &LineStore) {
        self.loc = store.clamp(loc);
    }

    pub const fn set_anchor(&mut self, anchor: Location) {
        self.anchor = Some(anchor);
    }

    pub const fn clear_anchor(&mut self) {
        self.anchor = None;
    }

    /// Clamp location and anchor to the store.
    pub fn clamp(&mut self, store: &LineStore) {
        self.loc = store.clamp(self.loc);
        if let Some(anchor) = &mut self.anchor {
            *anchor = store.clamp(*anchor);
        }
    }

    fn shift_insert(&mut self, start: Location, end: Location) {
        self.loc = self.loc.shifted_by_insert(start, end);
        if let Some(anchor) = &mut self.anchor {
            *anchor = anchor.shifted_by_insert(start, end);
        }
    }

    fn shift_remove(&mut self, start: Location, end: Location) {
        self.loc = self.loc.shifted_by_remove(start, end);
        if let Some(anchor) = &mut self.anchor {
            *anchor = anchor.shifted_by_remove(start, end);
        }
    }
}

// ---------------------------------------------------------------------------
// CursorSet
// ---------------------------------------------------------------------------

/// One or more cursors over the same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSet {
    cursors: Vec<Cursor>,
    current: usize,
}

impl CursorSet {
    /// A single cursor at the origin.
    #[must_use]
    pub fn new() -> Self {
        Self::at(Location::ZERO)
    }

    /// A single cursor at `loc`.
    #[must_use]
    pub fn at(loc: Location) -> Self {
        Self {
            cursors: vec![Cursor::at(loc)],
            current: 0,
        }
    }

    // -- Access -------------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// Always false; the set never drops its last cursor.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&Cursor> {
        self.cursors.get(i)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Cursor> {
        self.cursors.iter()
    }

    /// Cursor 0.
    #[inline]
    #[must_use]
    pub fn primary(&self) -> &Cursor {
        &self.cursors[0]
    }

    /// The cursor being driven.
    #[inline]
    #[must_use]
    pub fn current(&self) -> &Cursor {
        &self.cursors[self.current]
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut Cursor {
        &mut self.cursors[self.current]
    }

    #[inline]
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current
    }

    /// Make cursor `i` current. Out-of-range indices select the last cursor.
    pub fn set_current(&mut self, i: usize) {
        self.current = i.min(self.cursors.len() - 1);
    }

    // -- Adding and removing ------------------------------------------------

    /// Add a cursor at `loc` (clamped). Returns its index.
    pub fn add(&mut self, loc: Location, store: &LineStore) -> usize {
        self.cursors.push(Cursor::at(store.clamp(loc)));
        self.renumber();
        self.cursors.len() - 1
    }

    /// Remove cursor `i`. The last remaining cursor is never removed.
    pub fn remove(&mut self, i: usize) -> bool {
        if self.cursors.len() <= 1 || i >= self.cursors.len() {
            return false;
        }
        self.cursors.remove(i);
        if self.current > i || self.current >= self.cursors.len() {
            self.current = self.current.saturating_sub(1);
        }
        self.renumber();
        true
    }

    /// Drop every cursor except the primary, clear its selection, and make
    /// it current.
    pub fn clear_cursors(&mut self) {
        self.cursors.truncate(1);
        self.cursors[0].clear_anchor();
        self.current = 0;
        self.renumber();
    }

    /// Drop cursors that share a location with an earlier one, renumber the
    /// rest, and clamp the current index.
    pub fn merge(&mut self) {
        let mut seen: Vec<Location> = Vec::with_capacity(self.cursors.len());
        let current = self.current;
        let mut kept_before_current = 0;
        let mut index = 0;
        self.cursors.retain(|c| {
            let keep = !seen.contains(&c.loc);
            if keep {
                seen.push(c.loc);
                if index < current {
                    kept_before_current += 1;
                }
            }
            index += 1;
            keep
        });
        self.current = kept_before_current.min(self.cursors.len() - 1);
        self.renumber();
    }

    /// Give every cursor its index as its number.
    pub fn renumber(&mut self) {
        for (i, c) in self.cursors.iter_mut().enumerate() {
            c.num = i;
        }
    }

    // -- Keeping cursors valid ----------------------------------------------

    /// Clamp every cursor to the store.
    pub fn relocate(&mut self, store: &LineStore) {
        for c in &mut self.cursors {
            c.clamp(store);
        }
    }

    /// Every cursor's location, in order.
    #[must_use]
    pub fn locations(&self) -> Vec<Location> {
        self.cursors.iter().map(|c| c.loc).collect()
    }

    /// Put cursors back at `locs` (as returned by [`locations`](Self::locations)),
    /// clamped to the store. Extra entries on either side are ignored.
    pub fn restore_locations(&mut self, locs: &[Location], store: &LineStore) {
        for (c, loc) in self.cursors.iter_mut().zip(locs) {
            c.loc = store.clamp(*loc);
        }
    }

    /// Move every cursor with the text after `start..end` was inserted.
    pub fn shift_insert(&mut self, start: Location, end: Location) {
        for c in &mut self.cursors {
            c.shift_insert(start, end);
        }
    }

    /// Move every cursor with the text after `start..end` was removed.
    pub fn shift_remove(&mut self, start: Location, end: Location) {
        for c in &mut self.cursors {
            c.shift_remove(start, end);
        }
    }
}

impl Default for CursorSet {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
