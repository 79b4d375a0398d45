//! # q-text — Text storage for quire
//!
//! This crate holds the storage layer under every buffer:
//!
//! - **[`location`]** — `Location` (line, rune column) and `Range`, 0-indexed
//! - **[`utf8`]** — rune/byte index translation over raw line bytes
//! - **[`line_store`]** — `LineStore`, its `Line` records, and line-ending detection
//! - **[`highlight`]** — per-line lexer state cache and the forward fixed-point pass
//!
//! Nothing here knows about undo, cursors, or files. Those live in q-editor.

pub mod highlight;
pub mod line_store;
pub mod location;
pub mod utf8;

pub use highlight::{Group, HighlightProgress, Highlighter, LexState, LineHighlight, LineMatch};
pub use line_store::{Line, LineEnding, LineStore};
pub use location::{Location, Range};
