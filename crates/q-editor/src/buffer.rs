//! Buffer — one open file: content, history, cursors, and file state.
//!
//! A `Buffer` owns an [`EditEngine`] (line store, cursors, modified flag),
//! a [`History`], the file's path and last-known modification time, the
//! modification-detection state, its [`BufferOptions`], the [`Codec`] the
//! file was opened with, and optionally a [`Highlighter`].
//!
//! # Design choices
//!
//! - **Two mutation entry points.** [`insert`](Buffer::insert) and
//!   [`remove`](Buffer::remove) run the engine and record the delta. Every
//!   compound operation here (replace, line moves, save-time cleanup,
//!   reload) is built from them inside one history group, so it undoes as a
//!   unit and keeps highlighting consistent.
//!
//! - **Modification detection has two modes.** Small files keep a SHA-256 of
//!   their lines joined by `\n`, so typing a character and deleting it again
//!   reads as unmodified. Files above [`LARGE_FILE_THRESHOLD`] (or with
//!   `fastdirty` set) only keep a flag.
//!
//! - **The codec is opaque.** Load wraps the file stream with
//!   [`Codec::decode`], save hands the serialized bytes to
//!   [`Codec::encode`]. A codec failure on save happens before the disk is
//!   touched.
//!
//! - **Snapshots are advisory.** Cursor/undo snapshots are restored only if
//!   their modification time matches the file. A stale, missing, or broken
//!   snapshot reads as none, and a snapshot that fails to write after a
//!   successful save is logged, not reported.
//!
//! - **Saves are not atomic.** The file is overwritten in place.

use std::borrow::Cow;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use q_text::{HighlightProgress, Highlighter, LineEnding, LineStore, Location, Range, utf8};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::codec::{Codec, CodecRegistry, IdentityCodec};
use crate::cursor::CursorSet;
use crate::engine::EditEngine;
use crate::error::{BufferError, Result};
use crate::history::{Delta, History};
use crate::options::{BufferOptions, LARGE_FILE_THRESHOLD};
use crate::persist::{self, SerializedBuffer};

/// The bracket pairs editors usually match.
pub const BRACE_PAIRS: [(char, char); 3] = [('(', ')'), ('{', '}'), ('[', ']')];

/// How a buffer decides whether it is modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirtyTracking {
    /// Trust the engine's modified flag.
    Flag,
    /// Compare against the content hash taken at the last load or save.
    Hash([u8; 32]),
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

/// An open file (or scratch text) with undo history and cursors.
pub struct Buffer {
    engine: EditEngine,
    history: History,
    path: Option<PathBuf>,
    abs_path: Option<PathBuf>,
    mod_time: Option<SystemTime>,
    dirty: DirtyTracking,
    options: BufferOptions,
    codec: Arc<dyn Codec>,
    highlighter: Option<Box<dyn Highlighter + Send>>,
}

impl Buffer {
    // -- Construction -------------------------------------------------------

    /// An empty scratch buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::from_store(LineStore::new(), BufferOptions::default(), Arc::new(IdentityCodec), 0)
    }

    /// A scratch buffer holding `text`.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::from_store(
            LineStore::from_text(text),
            BufferOptions::default(),
            Arc::new(IdentityCodec),
            text.len() as u64,
        )
    }

    /// A buffer read from `reader`, decoded through `codec`. `size` is the
    /// declared input size, used only as a capacity hint and to pick the
    /// modification-detection mode.
    ///
    /// # Errors
    ///
    /// Codec failures and read errors.
    pub fn from_reader<R: Read>(
        reader: R,
        size: u64,
        codec: Arc<dyn Codec>,
        options: BufferOptions,
    ) -> Result<Self> {
        let store = decode_store(reader, size, codec.as_ref(), Path::new(""))?;
        Ok(Self::from_store(store, options, codec, size))
    }

    /// Open `path` with the codec the registry picks for it.
    ///
    /// A path that does not exist yet gives an empty buffer bound to it.
    ///
    /// # Errors
    ///
    /// Directories, filesystem errors, and codec failures.
    pub fn open(path: impl AsRef<Path>, options: BufferOptions, codecs: &CodecRegistry) -> Result<Self> {
        Self::open_at(path, None, options, codecs)
    }

    /// Like [`open`](Self::open), with the cursor placed at `cursor`
    /// (clamped). An explicit cursor wins over a persisted one.
    ///
    /// # Errors
    ///
    /// Directories, filesystem errors, and codec failures.
    pub fn open_at(
        path: impl AsRef<Path>,
        cursor: Option<Location>,
        options: BufferOptions,
        codecs: &CodecRegistry,
    ) -> Result<Self> {
        let path = path.as_ref();
        let started = Instant::now();
        let codec = codecs.for_path(path);

        let (mut buf, size) = match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => return Err(BufferError::IsDirectory(path.to_path_buf())),
            Ok(meta) => {
                let file = File::open(path).map_err(|e| BufferError::io(path, e))?;
                let store = decode_store(file, meta.len(), codec.as_ref(), path)?;
                let mut buf = Self::from_store(store, options, codec, meta.len());
                buf.mod_time = meta.modified().ok();
                (buf, meta.len())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "new file");
                (Self::from_store(LineStore::new(), options, codec, 0), 0)
            }
            Err(e) => return Err(BufferError::io(path, e)),
        };
        buf.set_path(path);

        if let Some(loc) = cursor {
            buf.set_cursor(loc);
        }
        buf.restore_snapshot(cursor.is_none());

        debug!(
            path = %path.display(),
            bytes = size,
            lines = buf.line_count(),
            codec = buf.codec.name(),
            elapsed = ?started.elapsed(),
            "opened buffer"
        );
        Ok(buf)
    }

    fn from_store(store: LineStore, options: BufferOptions, codec: Arc<dyn Codec>, size: u64) -> Self {
        let mut buf = Self {
            engine: EditEngine::new(store),
            history: History::new(),
            path: None,
            abs_path: None,
            mod_time: None,
            dirty: DirtyTracking::Flag,
            options,
            codec,
            highlighter: None,
        };
        buf.reset_dirty(size);
        buf
    }

    // -- Text access --------------------------------------------------------

    /// The underlying store.
    #[inline]
    #[must_use]
    pub const fn store(&self) -> &LineStore {
        self.engine.store()
    }

    /// Number of lines. Never zero.
    #[inline]
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.engine.line_count()
    }

    /// Text of line `n`, without terminator.
    ///
    /// # Panics
    ///
    /// Panics if `n` is out of range.
    #[must_use]
    pub fn line_text(&self, n: usize) -> Cow<'_, str> {
        self.store().line(n).text()
    }

    /// Raw bytes of line `n`.
    #[must_use]
    pub fn line_bytes(&self, n: usize) -> &[u8] {
        self.store().line(n).bytes()
    }

    /// Rune count of line `n`.
    #[must_use]
    pub fn line_rune_count(&self, n: usize) -> usize {
        self.store().rune_len(n)
    }

    /// Text of lines `start..end`, clamped to the buffer.
    #[must_use]
    pub fn lines(&self, start: usize, end: usize) -> Vec<String> {
        let end = end.min(self.line_count());
        (start.min(end)..end)
            .map(|n| self.line_text(n).into_owned())
            .collect()
    }

    /// The text between two locations, lines joined by `\n`.
    #[must_use]
    pub fn substr(&self, start: Location, end: Location) -> String {
        self.store().substr(start, end)
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> Location {
        Location::ZERO
    }

    #[must_use]
    pub fn end(&self) -> Location {
        self.store().end()
    }

    /// The rune at `loc`, `None` at end of line.
    #[must_use]
    pub fn rune_at(&self, loc: Location) -> Option<char> {
        self.store().rune_at(loc)
    }

    /// Rune count of the whole buffer, each line break counting as one.
    #[must_use]
    pub fn rune_count(&self) -> usize {
        self.store().rune_count()
    }

    // -- Editing ------------------------------------------------------------

    /// Insert `text` at `loc` and record it. Returns the location just past
    /// the inserted text. Empty text does nothing.
    ///
    /// # Panics
    ///
    /// Panics if `loc` is not a valid location.
    pub fn insert(&mut self, loc: Location, text: &str) -> Location {
        self.insert_bytes(loc, text.as_bytes())
    }

    /// [`insert`](Self::insert) for raw bytes, which need not be UTF-8.
    pub fn insert_bytes(&mut self, loc: Location, bytes: &[u8]) -> Location {
        if bytes.is_empty() {
            return loc;
        }
        let before = self.cursor_location();
        let end = self.engine.insert_bytes(loc, bytes);
        let after = self.cursor_location();
        self.history.record(Delta::insert(loc, bytes), before, after);
        end
    }

    /// Remove `start..end` and record it. Returns the removed text, with
    /// invalid UTF-8 shown as U+FFFD; the history keeps the exact bytes. An
    /// empty range does nothing.
    ///
    /// # Panics
    ///
    /// Panics if either location is invalid or `start > end`.
    pub fn remove(&mut self, start: Location, end: Location) -> String {
        String::from_utf8_lossy(&self.remove_bytes(start, end)).into_owned()
    }

    /// [`remove`](Self::remove), returning the exact bytes removed.
    pub fn remove_bytes(&mut self, start: Location, end: Location) -> Vec<u8> {
        if start == end {
            return Vec::new();
        }
        let before = self.cursor_location();
        let removed = self.engine.remove(start, end);
        let after = self.cursor_location();
        self.history
            .record(Delta::remove(start, end, removed.clone()), before, after);
        removed
    }

    /// Replace `start..end` with `text` as one undo step. Returns the end of
    /// the inserted text.
    pub fn replace(&mut self, start: Location, end: Location, text: &str) -> Location {
        self.group(|buf| {
            buf.remove(start, end);
            buf.insert(start, text)
        })
    }

    /// Apply several non-overlapping replacements as one undo step.
    ///
    /// Edits are applied from the last location to the first so earlier
    /// ranges stay valid. Returns how many were applied.
    ///
    /// # Panics
    ///
    /// Panics if two ranges overlap, before anything is changed.
    pub fn multiple_replace(&mut self, mut edits: Vec<(Range, String)>) -> usize {
        edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
        assert!(
            edits.windows(2).all(|w| w[1].0.end <= w[0].0.start),
            "replacements overlap"
        );
        let count = edits.len();
        self.group(|buf| {
            for (range, text) in &edits {
                buf.replace(range.start, range.end, text);
            }
        });
        count
    }

    /// Run `f` inside one history group.
    pub fn group<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.history.begin(self.cursor_location());
        let out = f(self);
        self.history.commit(self.cursor_location());
        out
    }

    /// Move lines `start..end` up by one, over line `start - 1`.
    ///
    /// Returns false (and does nothing) unless `1 <= start < end <= line_count`.
    pub fn move_lines_up(&mut self, start: usize, end: usize) -> bool {
        if start < 1 || start >= end || end > self.line_count() {
            return false;
        }
        let above = self.line_bytes(start - 1).to_vec();
        self.group(|buf| {
            if end == buf.line_count() {
                let tail = Location::new(end - 1, buf.line_rune_count(end - 1));
                buf.insert_bytes(tail, &[b"\n".as_slice(), above.as_slice()].concat());
            } else {
                buf.insert_bytes(Location::new(end, 0), &[above.as_slice(), b"\n".as_slice()].concat());
            }
            buf.remove(Location::new(start - 1, 0), Location::new(start, 0));
        });
        true
    }

    /// Move lines `start..end` down by one, under line `end`.
    ///
    /// Returns false (and does nothing) unless `start < end < line_count`.
    pub fn move_lines_down(&mut self, start: usize, end: usize) -> bool {
        if start >= end || end >= self.line_count() {
            return false;
        }
        let below = self.line_bytes(end).to_vec();
        self.group(|buf| {
            buf.insert_bytes(Location::new(start, 0), &[below.as_slice(), b"\n".as_slice()].concat());
            // The moved line now sits at end + 1.
            let moved = end + 1;
            if moved + 1 < buf.line_count() {
                buf.remove(Location::new(moved, 0), Location::new(moved + 1, 0));
            } else {
                let from = Location::new(moved - 1, buf.line_rune_count(moved - 1));
                buf.remove(from, buf.end());
            }
        });
        true
    }

    // -- Undo / redo --------------------------------------------------------

    /// Undo the last group. Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.undo(&mut self.engine) {
            Some(loc) => {
                self.restore_cursor(loc);
                true
            }
            None => false,
        }
    }

    /// Redo the last undone group. Returns false if there was nothing to
    /// redo.
    pub fn redo(&mut self) -> bool {
        match self.history.redo(&mut self.engine) {
            Some(loc) => {
                self.restore_cursor(loc);
                true
            }
            None => false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    /// End the current typing run so the next keystroke starts a new undo
    /// step.
    pub const fn seal_undo(&mut self) {
        self.history.seal();
    }

    fn restore_cursor(&mut self, loc: Location) {
        let (cursors, store) = self.engine.cursors_and_store();
        let cursor = cursors.current_mut();
        cursor.set_location(loc, store);
        cursor.clear_anchor();
    }

    // -- Cursors ------------------------------------------------------------

    #[inline]
    #[must_use]
    pub const fn cursors(&self) -> &CursorSet {
        self.engine.cursors()
    }

    /// Location of the current cursor.
    #[must_use]
    pub fn cursor_location(&self) -> Location {
        self.cursors().current().location()
    }

    /// Move the current cursor to `loc` (clamped).
    pub fn set_cursor(&mut self, loc: Location) {
        let (cursors, store) = self.engine.cursors_and_store();
        cursors.current_mut().set_location(loc, store);
    }

    /// Set or clear the current cursor's selection anchor (clamped).
    pub fn set_anchor(&mut self, anchor: Option<Location>) {
        let (cursors, store) = self.engine.cursors_and_store();
        let cursor = cursors.current_mut();
        match anchor {
            Some(loc) => cursor.set_anchor(store.clamp(loc)),
            None => cursor.clear_anchor(),
        }
    }

    /// Add a cursor at `loc` (clamped). Returns its index.
    pub fn add_cursor(&mut self, loc: Location) -> usize {
        let (cursors, store) = self.engine.cursors_and_store();
        cursors.add(loc, store)
    }

    /// Remove cursor `i`; the last cursor is never removed.
    pub fn remove_cursor(&mut self, i: usize) -> bool {
        self.engine.cursors_mut().remove(i)
    }

    pub fn set_current_cursor(&mut self, i: usize) {
        self.engine.cursors_mut().set_current(i);
    }

    /// Collapse cursors sharing a location.
    pub fn merge_cursors(&mut self) {
        self.engine.cursors_mut().merge();
    }

    /// Keep only the primary cursor, without selection.
    pub fn clear_cursors(&mut self) {
        self.engine.cursors_mut().clear_cursors();
    }

    /// Renumber cursors after external reordering.
    pub fn update_cursors(&mut self) {
        self.engine.cursors_mut().renumber();
    }

    /// Clamp every cursor into the buffer.
    pub fn relocate_cursors(&mut self) {
        let (cursors, store) = self.engine.cursors_and_store();
        cursors.relocate(store);
    }

    // -- Brace matching -----------------------------------------------------

    /// The bracket balancing the one at `start`.
    ///
    /// Scans forward if the rune at `start` is `pair.0`, backward if it is
    /// `pair.1`, counting nesting. Returns `start` when the rune is neither
    /// or no balancing bracket exists.
    #[must_use]
    pub fn find_matching_brace(&self, pair: (char, char), start: Location) -> Location {
        let (open, close) = pair;
        let store = self.store();
        let Some(ch) = store.rune_at(start) else {
            return start;
        };

        let mut depth = 0usize;
        if ch == open {
            for y in start.line..store.len() {
                let skip = if y == start.line { start.col } else { 0 };
                for (x, r) in utf8::runes(store.line(y).bytes()).enumerate().skip(skip) {
                    if r == open {
                        depth += 1;
                    } else if r == close {
                        depth -= 1;
                        if depth == 0 {
                            return Location::new(y, x);
                        }
                    }
                }
            }
        } else if ch == close {
            for y in (0..=start.line).rev() {
                let runes: Vec<char> = utf8::runes(store.line(y).bytes()).collect();
                let upto = if y == start.line { start.col + 1 } else { runes.len() };
                for (x, &r) in runes[..upto].iter().enumerate().rev() {
                    if r == close {
                        depth += 1;
                    } else if r == open {
                        depth -= 1;
                        if depth == 0 {
                            return Location::new(y, x);
                        }
                    }
                }
            }
        }
        start
    }

    // -- File state ---------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn abs_path(&self) -> Option<&Path> {
        self.abs_path.as_deref()
    }

    /// Bind the buffer to `path`.
    pub fn set_path(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.abs_path = Some(std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()));
        self.path = Some(path.to_path_buf());
    }

    /// Modification time of the file when it was last read or written.
    #[inline]
    #[must_use]
    pub const fn mod_time(&self) -> Option<SystemTime> {
        self.mod_time
    }

    /// True if the content differs from what was last loaded or saved.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        match self.dirty {
            DirtyTracking::Flag => self.engine.is_modified(),
            DirtyTracking::Hash(hash) => self.content_hash() != hash,
        }
    }

    /// True if the file on disk changed since this buffer last read or
    /// wrote it. Files that cannot be inspected report false.
    #[must_use]
    pub fn check_mod_time(&self) -> bool {
        let Some(path) = &self.path else {
            return false;
        };
        match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(on_disk) => Some(on_disk) != self.mod_time,
            Err(_) => false,
        }
    }

    /// The line ending saves will use.
    #[must_use]
    pub fn line_ending(&self) -> LineEnding {
        self.options
            .file_format
            .unwrap_or_else(|| self.store().line_ending())
    }

    #[inline]
    #[must_use]
    pub const fn options(&self) -> &BufferOptions {
        &self.options
    }

    /// Change options. Switching `fastdirty` on takes effect immediately;
    /// switching it off waits for the next load or save to take a hash.
    pub fn set_options(&mut self, options: BufferOptions) {
        if options.fast_dirty {
            self.dirty = DirtyTracking::Flag;
        }
        self.options = options;
    }

    #[must_use]
    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub fn set_codec(&mut self, codec: Arc<dyn Codec>) {
        self.codec = codec;
    }

    fn content_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for (i, line) in self.store().lines().enumerate() {
            if i > 0 {
                hasher.update(b"\n");
            }
            hasher.update(line.bytes());
        }
        hasher.finalize().into()
    }

    fn reset_dirty(&mut self, size: u64) {
        self.engine.set_modified(false);
        self.dirty = if self.options.fast_dirty || size > LARGE_FILE_THRESHOLD {
            DirtyTracking::Flag
        } else {
            DirtyTracking::Hash(self.content_hash())
        };
    }

    // -- Saving -------------------------------------------------------------

    /// Save to the bound path.
    ///
    /// # Errors
    ///
    /// [`BufferError::NoPath`] for scratch buffers, otherwise as
    /// [`save_as`](Self::save_as).
    pub fn save(&mut self) -> Result<()> {
        let path = self.path.clone().ok_or(BufferError::NoPath)?;
        self.save_as(path)
    }

    /// Save to `path` and bind the buffer to it.
    ///
    /// Runs the save-time cleanup (trailing whitespace, final newline) as
    /// one undo step, serializes with [`line_ending`](Self::line_ending),
    /// encodes through the codec, and writes. On success the buffer reads as
    /// unmodified and a snapshot is persisted if enabled.
    ///
    /// # Errors
    ///
    /// Codec errors (the file is untouched and the buffer stays modified)
    /// and filesystem errors.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let started = Instant::now();
        self.prepare_for_save();

        let mut plain = Vec::with_capacity(self.store().byte_len() + self.line_count() * 2);
        self.store()
            .write_to(&mut plain, self.line_ending())
            .map_err(|e| BufferError::io(path, e))?;
        let size = plain.len() as u64;

        let encoded = self.codec.encode(plain)?;
        fs::write(path, &encoded).map_err(|e| BufferError::io(path, e))?;

        if self.path.as_deref() != Some(path) {
            self.set_path(path);
        }
        self.mod_time = fs::metadata(path).and_then(|m| m.modified()).ok();
        self.reset_dirty(size);
        self.history.seal();

        if let Err(e) = self.persist() {
            warn!(path = %path.display(), error = %e, "could not persist snapshot");
        }

        debug!(
            path = %path.display(),
            bytes = encoded.len(),
            codec = self.codec.name(),
            elapsed = ?started.elapsed(),
            "saved buffer"
        );
        Ok(())
    }

    /// Trailing whitespace and final newline, per options, as one group.
    fn prepare_for_save(&mut self) {
        let trim = self.options.rm_trailing_ws;
        let eof = self.options.eof_newline;
        if !trim && !eof {
            return;
        }
        self.group(|buf| {
            if trim {
                for y in 0..buf.line_count() {
                    let runes: Vec<char> = utf8::runes(buf.line_bytes(y)).collect();
                    let keep = runes
                        .iter()
                        .rposition(|c| !c.is_whitespace())
                        .map_or(0, |i| i + 1);
                    if keep < runes.len() {
                        buf.remove(Location::new(y, keep), Location::new(y, runes.len()));
                    }
                }
            }
            if eof {
                let end = buf.end();
                if end.col > 0 {
                    let pinned = buf.cursors().locations();
                    buf.insert(end, "\n");
                    let (cursors, store) = buf.engine.cursors_and_store();
                    cursors.restore_locations(&pinned, store);
                }
            }
        });
    }

    /// Write the cursor/undo snapshot if the options ask for one. Returns
    /// whether a snapshot was written.
    ///
    /// # Errors
    ///
    /// Encoding and filesystem errors.
    pub fn persist(&self) -> Result<bool> {
        if !self.options.persists_snapshot() {
            return Ok(false);
        }
        let (Some(dir), Some(abs)) = (&self.options.history_dir, &self.abs_path) else {
            return Ok(false);
        };
        let snapshot = SerializedBuffer {
            history: if self.options.save_undo {
                self.history.clone()
            } else {
                History::new()
            },
            cursor: self.cursors().primary().location(),
            mod_time: self.mod_time,
        };
        persist::write_snapshot(dir, abs, &snapshot)?;
        Ok(true)
    }

    fn restore_snapshot(&mut self, restore_cursor: bool) {
        if !self.options.persists_snapshot() {
            return;
        }
        let (Some(dir), Some(abs)) = (&self.options.history_dir, &self.abs_path) else {
            return;
        };
        let Some(snapshot) = persist::read_snapshot(dir, abs) else {
            return;
        };
        if !snapshot.matches(self.mod_time) {
            debug!(path = %abs.display(), "file changed since snapshot, ignoring it");
            return;
        }
        if self.options.save_cursor && restore_cursor {
            let (cursors, store) = self.engine.cursors_and_store();
            cursors.clear_cursors();
            cursors.current_mut().set_location(snapshot.cursor, store);
        }
        if self.options.save_undo {
            self.history = snapshot.history;
        }
        debug!(path = %abs.display(), undo = self.history.undo_count(), "restored snapshot");
    }

    // -- Reloading ----------------------------------------------------------

    /// Re-read the file through the codec and replace the content as one
    /// undo step. The buffer reads as unmodified afterwards.
    ///
    /// # Errors
    ///
    /// [`BufferError::NoPath`], filesystem and codec errors. The content is
    /// untouched on error.
    pub fn reopen(&mut self) -> Result<()> {
        let path = self.path.clone().ok_or(BufferError::NoPath)?;
        let meta = fs::metadata(&path).map_err(|e| BufferError::io(&path, e))?;
        let file = File::open(&path).map_err(|e| BufferError::io(&path, e))?;
        let fresh = decode_store(file, meta.len(), self.codec.as_ref(), &path)?;

        let content = fresh.to_bytes();
        if content != self.store().to_bytes() {
            self.group(|buf| {
                let (start, end) = (buf.start(), buf.end());
                buf.remove_bytes(start, end);
                buf.insert_bytes(start, &content);
            });
        }
        self.engine.store_mut().set_line_ending(fresh.line_ending());
        self.relocate_cursors();
        self.mod_time = meta.modified().ok();
        self.reset_dirty(meta.len());
        debug!(path = %path.display(), lines = self.line_count(), "reloaded buffer");
        Ok(())
    }

    // -- Highlighting -------------------------------------------------------

    /// Install (or remove) the highlighter. Every line is re-lexed on the
    /// next pass.
    pub fn set_highlighter(&mut self, highlighter: Option<Box<dyn Highlighter + Send>>) {
        self.highlighter = highlighter;
        self.engine.store_mut().clear_matches();
    }

    /// Drop all cached highlight data.
    pub fn clear_matches(&mut self) {
        self.engine.store_mut().clear_matches();
    }

    /// Bring highlight state up to date, lexing at most `budget` lines.
    pub fn update_highlight(&mut self, budget: Option<usize>) -> HighlightProgress {
        match &self.highlighter {
            Some(hl) => self.engine.store_mut().rehighlight(hl.as_ref(), budget),
            None => HighlightProgress::Complete,
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("lines", &self.line_count())
            .field("path", &self.path)
            .field("modified", &self.is_modified())
            .field("line_ending", &self.line_ending())
            .field("codec", &self.codec.name())
            .field("undo", &self.history.undo_count())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Decode `reader` through `codec` and split it into lines.
fn decode_store<R: Read>(reader: R, size: u64, codec: &dyn Codec, path: &Path) -> Result<LineStore> {
    let decoded = codec.decode(Box::new(reader))?;
    LineStore::from_reader(decoded, size).map_err(|e| BufferError::io(path, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::XorCodec;
    use crate::error::CodecError;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn text(buf: &Buffer) -> String {
        buf.store().to_string()
    }

    // -- Editing ------------------------------------------------------------

    #[test]
    fn insert_after_multibyte_rune() {
        let mut buf = Buffer::from_text("héllo\nworld");
        buf.insert(Location::new(0, 1), "X");
        assert_eq!(buf.line_text(0), "hXéllo");
        assert_eq!(buf.line_count(), 2);
    }

    #[test]
    fn remove_everything_from_empty_buffer() {
        let mut buf = Buffer::new();
        let removed = buf.remove(buf.start(), buf.end());
        assert_eq!(removed, "");
        assert_eq!(buf.line_count(), 1);
        assert!(!buf.history().can_undo());
    }

    #[test]
    fn remove_everything_leaves_one_line() {
        let mut buf = Buffer::from_text("a\nb\nc");
        let removed = buf.remove(buf.start(), buf.end());
        assert_eq!(removed, "a\nb\nc");
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.line_text(0), "");
    }

    #[test]
    fn replace_is_one_undo_step() {
        let mut buf = Buffer::from_text("hello world");
        let end = buf.replace(Location::new(0, 6), Location::new(0, 11), "there");
        assert_eq!(end, Location::new(0, 11));
        assert_eq!(text(&buf), "hello there");
        assert!(buf.undo());
        assert_eq!(text(&buf), "hello world");
    }

    #[test]
    fn multiple_replace_applies_back_to_front() {
        let mut buf = Buffer::from_text("a b c");
        let n = buf.multiple_replace(vec![
            (Range::new(Location::ZERO, Location::new(0, 1)), "one".into()),
            (Range::new(Location::new(0, 4), Location::new(0, 5)), "three".into()),
            (Range::new(Location::new(0, 2), Location::new(0, 3)), "two".into()),
        ]);
        assert_eq!(n, 3);
        assert_eq!(text(&buf), "one two three");
        assert_eq!(buf.history().undo_count(), 1);
        buf.undo();
        assert_eq!(text(&buf), "a b c");
    }

    #[test]
    #[should_panic(expected = "replacements overlap")]
    fn multiple_replace_rejects_overlap() {
        let mut buf = Buffer::from_text("abcdef");
        buf.multiple_replace(vec![
            (Range::new(Location::ZERO, Location::new(0, 3)), "x".into()),
            (Range::new(Location::new(0, 2), Location::new(0, 5)), "y".into()),
        ]);
    }

    #[test]
    fn accessors() {
        let buf = Buffer::from_text("ab\ncdé\nf");
        assert_eq!(buf.lines(1, 10), vec!["cdé".to_string(), "f".to_string()]);
        assert_eq!(buf.substr(Location::new(0, 1), Location::new(1, 2)), "b\ncd");
        assert_eq!(buf.rune_at(Location::new(1, 2)), Some('é'));
        assert_eq!(buf.rune_count(), 8);
        assert_eq!(buf.end(), Location::new(2, 1));
        assert_eq!(buf.line_rune_count(1), 3);
    }

    // -- Line moves ---------------------------------------------------------

    #[test]
    fn move_lines_up_middle() {
        let mut buf = Buffer::from_text("a\nb\nc\nd");
        assert!(buf.move_lines_up(1, 3));
        assert_eq!(text(&buf), "b\nc\na\nd");
        assert_eq!(buf.history().undo_count(), 1);
        buf.undo();
        assert_eq!(text(&buf), "a\nb\nc\nd");
    }

    #[test]
    fn move_lines_up_to_end() {
        let mut buf = Buffer::from_text("a\nb\nc");
        assert!(buf.move_lines_up(2, 3));
        assert_eq!(text(&buf), "a\nc\nb");
    }

    #[test]
    fn move_lines_up_rejects_first_line() {
        let mut buf = Buffer::from_text("a\nb");
        assert!(!buf.move_lines_up(0, 1));
        assert_eq!(text(&buf), "a\nb");
    }

    #[test]
    fn move_lines_down_middle() {
        let mut buf = Buffer::from_text("a\nb\nc\nd");
        assert!(buf.move_lines_down(0, 2));
        assert_eq!(text(&buf), "c\na\nb\nd");
    }

    #[test]
    fn move_lines_down_over_last_line() {
        let mut buf = Buffer::from_text("a\nb\nc");
        assert!(buf.move_lines_down(0, 2));
        assert_eq!(text(&buf), "c\na\nb");
        assert!(!buf.move_lines_down(1, 3));
    }

    #[test]
    fn moving_lines_keeps_raw_bytes() {
        let mut buf = raw(b"a\n\xFFz\nc");
        assert!(buf.move_lines_up(1, 2));
        assert_eq!(buf.store().to_bytes(), b"\xFFz\na\nc");
        assert!(buf.move_lines_down(0, 2));
        assert_eq!(buf.store().to_bytes(), b"c\n\xFFz\na");
        assert!(buf.move_lines_up(2, 3));
        assert_eq!(buf.store().to_bytes(), b"c\na\n\xFFz");
    }

    // -- Undo / redo --------------------------------------------------------

    #[test]
    fn undo_restores_cursor() {
        let mut buf = Buffer::from_text("abc");
        buf.set_cursor(Location::new(0, 3));
        buf.insert(Location::new(0, 3), "d");
        assert_eq!(buf.cursor_location(), Location::new(0, 4));
        buf.undo();
        assert_eq!(buf.cursor_location(), Location::new(0, 3));
        buf.redo();
        assert_eq!(buf.cursor_location(), Location::new(0, 4));
    }

    #[test]
    fn undo_past_beginning_is_false() {
        let mut buf = Buffer::from_text("x");
        assert!(!buf.undo());
        assert!(!buf.redo());
    }

    fn raw(bytes: &[u8]) -> Buffer {
        Buffer::from_reader(bytes, bytes.len() as u64, Arc::new(IdentityCodec), BufferOptions::default())
            .unwrap()
    }

    #[test]
    fn undo_redo_keep_invalid_utf8() {
        let bytes = [b'a', 0xE4, 0xB8, b'b'];
        let mut buf = raw(&bytes);
        assert_eq!(buf.line_rune_count(0), 4);

        buf.remove(Location::new(0, 1), Location::new(0, 3));
        assert_eq!(buf.line_bytes(0), b"ab");
        assert!(buf.undo());
        assert_eq!(buf.line_bytes(0), bytes);
        assert!(buf.redo());
        assert_eq!(buf.line_bytes(0), b"ab");
        assert!(buf.undo());
        assert_eq!(buf.line_bytes(0), bytes);
    }

    #[test]
    fn redo_at_end_of_invalid_line() {
        let bytes = [b'a', 0xE4, 0xB8];
        let mut buf = raw(&bytes);
        buf.remove(Location::new(0, 1), Location::new(0, 3));
        buf.undo();
        assert_eq!(buf.line_bytes(0), bytes);
        buf.redo();
        assert_eq!(buf.line_bytes(0), b"a");
    }

    // -- Modification detection ---------------------------------------------

    #[test]
    fn hash_mode_sees_reverted_edit_as_clean() {
        let mut buf = Buffer::from_text("abc");
        buf.insert(Location::new(0, 3), "d");
        assert!(buf.is_modified());
        buf.remove(Location::new(0, 3), Location::new(0, 4));
        assert!(!buf.is_modified());
    }

    #[test]
    fn fast_dirty_keeps_flag() {
        let mut buf = Buffer::from_text("abc");
        buf.set_options(BufferOptions {
            fast_dirty: true,
            ..BufferOptions::default()
        });
        buf.insert(Location::new(0, 3), "d");
        buf.remove(Location::new(0, 3), Location::new(0, 4));
        assert!(buf.is_modified());
    }

    #[test]
    fn large_input_forces_flag() {
        let big = "x".repeat(60_000);
        let buf = Buffer::from_reader(
            big.as_bytes(),
            big.len() as u64,
            Arc::new(IdentityCodec),
            BufferOptions::default(),
        )
        .unwrap();
        assert_eq!(buf.dirty, DirtyTracking::Flag);
        assert!(!buf.is_modified());
    }

    // -- Brace matching -----------------------------------------------------

    #[test]
    fn brace_forward_and_back() {
        let buf = Buffer::from_text("fn f(a: (u8, u8)) {\n    [1, (2)]\n}");
        let open = Location::new(0, 4);
        let close = buf.find_matching_brace(('(', ')'), open);
        assert_eq!(close, Location::new(0, 16));
        assert_eq!(buf.find_matching_brace(('(', ')'), close), open);

        let brace = buf.find_matching_brace(('{', '}'), Location::new(0, 18));
        assert_eq!(brace, Location::new(2, 0));
        assert_eq!(buf.find_matching_brace(('{', '}'), brace), Location::new(0, 18));
    }

    #[test]
    fn unbalanced_brace_returns_start() {
        let buf = Buffer::from_text("(( )");
        assert_eq!(buf.find_matching_brace(('(', ')'), Location::ZERO), Location::ZERO);
        assert_eq!(buf.find_matching_brace(('(', ')'), Location::new(0, 2)), Location::new(0, 2));
        assert_eq!(buf.find_matching_brace(('(', ')'), Location::new(0, 4)), Location::new(0, 4));
    }

    // -- Cursors ------------------------------------------------------------

    #[test]
    fn cursor_accessors_clamp() {
        let mut buf = Buffer::from_text("ab\nc");
        buf.set_cursor(Location::new(9, 9));
        assert_eq!(buf.cursor_location(), Location::new(1, 1));
        let i = buf.add_cursor(Location::new(1, 1));
        assert_eq!(i, 1);
        buf.merge_cursors();
        assert_eq!(buf.cursors().len(), 1);
        buf.add_cursor(Location::ZERO);
        buf.set_anchor(Some(Location::new(0, 7)));
        assert_eq!(buf.cursors().current().anchor(), Some(Location::new(0, 2)));
        buf.clear_cursors();
        assert_eq!(buf.cursors().len(), 1);
        assert!(!buf.cursors().primary().has_selection());
    }

    // -- Files --------------------------------------------------------------

    #[test]
    fn open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.txt");
        let buf = Buffer::open(&path, BufferOptions::default(), &CodecRegistry::new()).unwrap();
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.path(), Some(path.as_path()));
        assert!(!buf.is_modified());
    }

    #[test]
    fn open_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Buffer::open(dir.path(), BufferOptions::default(), &CodecRegistry::new()).unwrap_err();
        assert!(matches!(err, BufferError::IsDirectory(_)));
    }

    #[test]
    fn open_without_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, "one\ntwo\nthree").unwrap();
        let buf = Buffer::open(&path, BufferOptions::default(), &CodecRegistry::new()).unwrap();
        assert_eq!(buf.line_count(), 3);
        assert_eq!(buf.line_bytes(2), b"three");
    }

    #[test]
    fn open_at_clamps_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, "abc\nde").unwrap();
        let buf = Buffer::open_at(
            &path,
            Some(Location::new(1, 40)),
            BufferOptions::default(),
            &CodecRegistry::new(),
        )
        .unwrap();
        assert_eq!(buf.cursor_location(), Location::new(1, 2));
    }

    #[test]
    fn save_keeps_crlf_and_adds_final_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dos.txt");
        fs::write(&path, "a\r\nb").unwrap();

        let mut buf = Buffer::open(&path, BufferOptions::default(), &CodecRegistry::new()).unwrap();
        assert_eq!(buf.line_ending(), LineEnding::CrLf);
        buf.insert(Location::new(1, 1), "c");
        buf.save().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"a\r\nbc\r\n");
        assert!(!buf.is_modified());
        assert!(!buf.check_mod_time());
    }

    #[test]
    fn save_cleanup_is_one_undo_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ws.txt");
        let mut buf = Buffer::from_text("a  \nb\t");
        buf.set_options(BufferOptions {
            rm_trailing_ws: true,
            ..BufferOptions::default()
        });
        buf.set_cursor(Location::new(1, 2));
        buf.save_as(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
        assert_eq!(buf.cursor_location(), Location::new(1, 1));
        assert_eq!(buf.history().undo_count(), 1);
        buf.undo();
        assert_eq!(text(&buf), "a  \nb\t");
    }

    #[test]
    fn save_scratch_without_path_fails() {
        let mut buf = Buffer::from_text("x");
        assert!(matches!(buf.save(), Err(BufferError::NoPath)));
    }

    #[test]
    fn fileformat_option_overrides_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        let mut buf = Buffer::from_text("a\nb\n");
        let mut opts = BufferOptions::default();
        opts.apply_set("ff=dos").unwrap();
        buf.set_options(opts);
        buf.save_as(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"a\r\nb\r\n");
    }

    #[test]
    fn codec_roundtrip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.x");
        let mut codecs = CodecRegistry::new();
        codecs.register(".x", Arc::new(XorCodec { key: 0x33 }));

        let mut buf = Buffer::open(&path, BufferOptions::default(), &codecs).unwrap();
        buf.insert(Location::ZERO, "top secret\nline two");
        buf.save().unwrap();
        assert_ne!(fs::read(&path).unwrap(), b"top secret\nline two\n");

        let back = Buffer::open(&path, BufferOptions::default(), &codecs).unwrap();
        assert_eq!(text(&back), "top secret\nline two\n");
    }

    #[test]
    fn codec_failure_on_load_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.x");
        fs::write(&path, "not encoded").unwrap();
        let mut codecs = CodecRegistry::new();
        codecs.register(".x", Arc::new(XorCodec { key: 1 }));

        let err = Buffer::open(&path, BufferOptions::default(), &codecs).unwrap_err();
        assert!(matches!(err, BufferError::Codec(CodecError::Armor(_))));
    }

    struct FailingCodec;

    impl Codec for FailingCodec {
        fn name(&self) -> &str {
            "failing"
        }

        fn decode<'a>(&self, input: Box<dyn Read + 'a>) -> std::result::Result<Box<dyn Read + 'a>, CodecError> {
            Ok(input)
        }

        fn encode(&self, _plain: Vec<u8>) -> std::result::Result<Vec<u8>, CodecError> {
            Err(CodecError::InvalidPassword)
        }
    }

    #[test]
    fn codec_failure_on_save_leaves_disk_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.txt");
        fs::write(&path, "original\n").unwrap();

        let mut buf = Buffer::open(&path, BufferOptions::default(), &CodecRegistry::new()).unwrap();
        buf.set_codec(Arc::new(FailingCodec));
        buf.insert(Location::ZERO, "changed ");
        let err = buf.save().unwrap_err();

        assert!(matches!(err, BufferError::Codec(CodecError::InvalidPassword)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "original\n");
        assert!(buf.is_modified());
    }

    #[test]
    fn snapshot_restores_when_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        let opts = BufferOptions {
            save_cursor: true,
            save_undo: true,
            history_dir: Some(dir.path().join("history")),
            ..BufferOptions::default()
        };

        let mut buf = Buffer::open(&path, opts.clone(), &CodecRegistry::new()).unwrap();
        buf.insert(Location::ZERO, "hello");
        buf.set_cursor(Location::new(0, 2));
        buf.save().unwrap();

        let mut back = Buffer::open(&path, opts.clone(), &CodecRegistry::new()).unwrap();
        assert_eq!(back.cursor_location(), Location::new(0, 2));
        assert!(back.history().can_undo());
        back.undo();
        assert_eq!(text(&back), "hello");
        back.undo();
        assert_eq!(text(&back), "");

        // An explicit cursor wins over the snapshot.
        let at = Buffer::open_at(&path, Some(Location::ZERO), opts, &CodecRegistry::new()).unwrap();
        assert_eq!(at.cursor_location(), Location::ZERO);
    }

    #[test]
    fn snapshot_ignored_after_external_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        let opts = BufferOptions {
            save_cursor: true,
            save_undo: true,
            history_dir: Some(dir.path().join("history")),
            ..BufferOptions::default()
        };
        let mut buf = Buffer::open(&path, opts.clone(), &CodecRegistry::new()).unwrap();
        buf.insert(Location::ZERO, "hello");
        buf.save().unwrap();

        // Rewrite the snapshot as if taken against another file version.
        let abs = buf.abs_path().unwrap().to_path_buf();
        let history_dir = opts.history_dir.clone().unwrap();
        let mut snapshot = persist::read_snapshot(&history_dir, &abs).unwrap();
        snapshot.mod_time = Some(SystemTime::UNIX_EPOCH);
        persist::write_snapshot(&history_dir, &abs, &snapshot).unwrap();

        let back = Buffer::open(&path, opts, &CodecRegistry::new()).unwrap();
        assert!(!back.history().can_undo());
        assert_eq!(back.cursor_location(), Location::ZERO);
    }

    #[test]
    fn reopen_picks_up_external_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.txt");
        fs::write(&path, "old\n").unwrap();
        let mut buf = Buffer::open(&path, BufferOptions::default(), &CodecRegistry::new()).unwrap();

        fs::write(&path, "new\r\ncontent").unwrap();
        buf.reopen().unwrap();

        assert_eq!(text(&buf), "new\ncontent");
        assert_eq!(buf.line_ending(), LineEnding::CrLf);
        assert!(!buf.is_modified());
        assert!(!buf.check_mod_time());
        buf.undo();
        assert_eq!(text(&buf), "old\n");
    }

    #[test]
    fn reopen_keeps_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin.txt");
        fs::write(&path, b"ok\n").unwrap();
        let mut buf = Buffer::open(&path, BufferOptions::default(), &CodecRegistry::new()).unwrap();

        fs::write(&path, b"\xFFa\xE4\xB8\n").unwrap();
        buf.reopen().unwrap();
        assert_eq!(buf.store().to_bytes(), b"\xFFa\xE4\xB8\n");

        buf.save().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"\xFFa\xE4\xB8\n");
    }

    // -- Highlighting -------------------------------------------------------

    /// Lines starting with `#` open a comment that a line starting with `!`
    /// closes.
    struct HashComments;

    impl Highlighter for HashComments {
        fn highlight_line(&self, line: &[u8], incoming: Option<q_text::LexState>) -> q_text::LineHighlight {
            let inside = incoming.is_some_and(|s| s.raw() == 1);
            let state = match line.first() {
                Some(b'#') => 1,
                Some(b'!') => 0,
                _ => u64::from(inside),
            };
            q_text::LineHighlight {
                state: Some(q_text::LexState::new(state)),
                matches: q_text::LineMatch::new(),
            }
        }
    }

    #[test]
    fn highlight_follows_edits() {
        let mut buf = Buffer::from_text("a\nb\nc");
        buf.set_highlighter(Some(Box::new(HashComments)));
        assert_eq!(buf.update_highlight(None), HighlightProgress::Complete);
        assert_eq!(buf.store().line(2).state(), Some(q_text::LexState::new(0)));

        buf.insert(Location::ZERO, "#");
        buf.update_highlight(None);
        assert_eq!(buf.store().line(2).state(), Some(q_text::LexState::new(1)));

        buf.undo();
        buf.update_highlight(None);
        assert_eq!(buf.store().line(2).state(), Some(q_text::LexState::new(0)));
    }

    // -- Properties ---------------------------------------------------------

    #[derive(Debug, Clone)]
    enum Op {
        Insert(prop::sample::Index, prop::sample::Index, String),
        Remove(prop::sample::Index, prop::sample::Index, usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<prop::sample::Index>(), any::<prop::sample::Index>(), "[a-cé\n]{1,4}")
                .prop_map(|(l, c, t)| Op::Insert(l, c, t)),
            (any::<prop::sample::Index>(), any::<prop::sample::Index>(), 1usize..6)
                .prop_map(|(l, c, n)| Op::Remove(l, c, n)),
        ]
    }

    fn apply(buf: &mut Buffer, op: &Op) {
        match op {
            Op::Insert(l, c, t) => {
                let y = l.index(buf.line_count());
                let x = c.index(buf.line_rune_count(y) + 1);
                buf.insert(Location::new(y, x), t);
            }
            Op::Remove(l, c, n) => {
                let y = l.index(buf.line_count());
                let x = c.index(buf.line_rune_count(y) + 1);
                let start = Location::new(y, x);
                let end = buf.store().clamp(Location::new(y, x + n));
                buf.remove(start, end);
            }
        }
    }

    proptest! {
        #[test]
        fn undo_all_then_redo_all(base in "[a-d\n]{0,16}", ops in prop::collection::vec(op(), 1..12)) {
            let mut buf = Buffer::from_text(&base);
            let before_text = text(&buf);
            let before_cursor = buf.cursor_location();

            for op in &ops {
                apply(&mut buf, op);
            }
            let after_text = text(&buf);
            let after_cursor = buf.cursor_location();

            for _ in 0..ops.len() {
                buf.undo();
            }
            prop_assert_eq!(text(&buf), before_text);
            prop_assert_eq!(buf.cursor_location(), before_cursor);

            for _ in 0..ops.len() {
                buf.redo();
            }
            prop_assert_eq!(text(&buf), after_text);
            prop_assert_eq!(buf.cursor_location(), after_cursor);
        }

        #[test]
        fn brace_matching_is_symmetric(
            pieces in prop::collection::vec(prop_oneof![Just("("), Just(")"), Just("x"), Just("\n")], 0..24),
        ) {
            let buf = Buffer::from_text(&pieces.concat());
            for y in 0..buf.line_count() {
                for x in 0..buf.line_rune_count(y) {
                    let at = Location::new(y, x);
                    if buf.rune_at(at) == Some('(') {
                        let close = buf.find_matching_brace(('(', ')'), at);
                        if close != at {
                            prop_assert_eq!(buf.find_matching_brace(('(', ')'), close), at);
                        }
                    }
                }
            }
        }
    }
}
