//! # q-editor — Buffer engine for quire
//!
//! Everything between raw line storage (q-text) and a UI:
//!
//! - **[`engine`]** — `EditEngine`, the two mutation entry points (insert/remove)
//! - **[`history`]** — `Delta`s, undo/redo groups, typing coalescing
//! - **[`cursor`]** — `Cursor` and `CursorSet`, shifted with every edit
//! - **[`buffer`]** — `Buffer`: load/save through a codec, modification
//!   detection, snapshots, line moves, brace matching
//! - **[`codec`]** — the `Codec` trait and the suffix-based `CodecRegistry`
//! - **[`options`]** — buffer-local options and `:set` parsing
//! - **[`persist`]** — cursor/undo snapshots keyed by absolute path
//! - **[`replace`]** — regex search, replace-all, and interactive replace
//! - **[`error`]** — error types

pub mod buffer;
pub mod codec;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod history;
pub mod options;
pub mod persist;
pub mod replace;

pub use buffer::{BRACE_PAIRS, Buffer};
pub use codec::{Codec, CodecRegistry, IdentityCodec};
pub use error::{BufferError, CodecError, OptionError, Result};
pub use options::BufferOptions;
pub use replace::ReplaceSession;
