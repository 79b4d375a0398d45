//! Buffer options and the `:set` directive parser.
//!
//! [`BufferOptions`] holds the settings that change how a buffer saves and
//! tracks modification. They deserialize from the editor's settings file
//! (every field has a default) and can be changed at runtime with
//! `:set`-style directives:
//!
//! | Syntax              | Effect                         |
//! |---------------------|--------------------------------|
//! | `:set option`       | Enable boolean / show value    |
//! | `:set nooption`     | Disable boolean                |
//! | `:set option!`      | Toggle boolean                 |
//! | `:set option?`      | Query current value            |
//! | `:set option=value` | Assign a value                 |
//! | `:set`              | Show changed options           |
//! | `:set all`          | Show all options               |
//!
//! # Option names
//!
//! | Full name      | Abbrev | Type | Default |
//! |----------------|--------|------|---------|
//! | `fastdirty`    | `fd`   | bool | false   |
//! | `rmtrailingws` | `rtw`  | bool | false   |
//! | `eofnewline`   | `eol`  | bool | true    |
//! | `savecursor`   | `sc`   | bool | false   |
//! | `saveundo`     | `su`   | bool | false   |
//! | `fileformat`   | `ff`   | unix / dos | detected |

use std::path::PathBuf;

use q_text::LineEnding;
use serde::{Deserialize, Serialize};

use crate::error::OptionError;

/// Files larger than this many bytes always use fast-dirty tracking.
pub const LARGE_FILE_THRESHOLD: u64 = 50_000;

// ---------------------------------------------------------------------------
// BufferOptions
// ---------------------------------------------------------------------------

/// Per-buffer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferOptions {
    /// Track modification with a flag instead of a content hash.
    pub fast_dirty: bool,
    /// Strip trailing whitespace from every line on save.
    pub rm_trailing_ws: bool,
    /// Make sure the file ends with a newline on save.
    pub eof_newline: bool,
    /// Persist and restore the primary cursor.
    pub save_cursor: bool,
    /// Persist and restore the undo history.
    pub save_undo: bool,
    /// Line ending to save with. `None` keeps the detected one.
    pub file_format: Option<LineEnding>,
    /// Where cursor/undo snapshots are kept.
    pub history_dir: Option<PathBuf>,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            fast_dirty: false,
            rm_trailing_ws: false,
            eof_newline: true,
            save_cursor: false,
            save_undo: false,
            file_format: None,
            history_dir: None,
        }
    }
}

impl BufferOptions {
    /// True if either snapshot option is on.
    #[must_use]
    pub const fn persists_snapshot(&self) -> bool {
        self.save_cursor || self.save_undo
    }

    /// Apply one parsed directive.
    ///
    /// Returns text to show the user for queries and listings, `None` for
    /// silent changes.
    ///
    /// # Errors
    ///
    /// Unknown option names, unparsable values, and boolean forms used on
    /// valued options (or the reverse).
    pub fn apply(&mut self, directive: &SetDirective) -> Result<Option<String>, OptionError> {
        match directive {
            SetDirective::On(name) => {
                *self.flag_mut(name)? = true;
                Ok(None)
            }
            SetDirective::Off(name) => {
                *self.flag_mut(name)? = false;
                Ok(None)
            }
            SetDirective::Toggle(name) => {
                let flag = self.flag_mut(name)?;
                *flag = !*flag;
                Ok(None)
            }
            SetDirective::Query(name) => self.show(name).map(Some),
            SetDirective::Assign(name, value) => {
                self.assign(name, value)?;
                Ok(None)
            }
            SetDirective::ShowChanged => {
                let defaults = Self::default();
                let changed: Vec<String> = OPTION_NAMES
                    .iter()
                    .filter(|name| self.show(name) != defaults.show(name))
                    .filter_map(|name| self.show(name).ok())
                    .collect();
                Ok(Some(changed.join(" ")))
            }
            SetDirective::ShowAll => {
                let all: Vec<String> = OPTION_NAMES
                    .iter()
                    .filter_map(|name| self.show(name).ok())
                    .collect();
                Ok(Some(all.join(" ")))
            }
        }
    }

    /// Parse and apply a whole `:set` argument string, stopping at the
    /// first error. Output from queries is joined with spaces.
    ///
    /// # Errors
    ///
    /// The first directive that fails to apply.
    pub fn apply_set(&mut self, args: &str) -> Result<Option<String>, OptionError> {
        let mut shown = Vec::new();
        for directive in parse_set(args) {
            if let Some(text) = self.apply(&directive)? {
                shown.push(text);
            }
        }
        Ok((!shown.is_empty()).then(|| shown.join(" ")))
    }

    fn flag_mut(&mut self, name: &str) -> Result<&mut bool, OptionError> {
        match canonical(name) {
            Some("fastdirty") => Ok(&mut self.fast_dirty),
            Some("rmtrailingws") => Ok(&mut self.rm_trailing_ws),
            Some("eofnewline") => Ok(&mut self.eof_newline),
            Some("savecursor") => Ok(&mut self.save_cursor),
            Some("saveundo") => Ok(&mut self.save_undo),
            Some(_) => Err(OptionError::WrongKind(name.to_string())),
            None => Err(OptionError::Unknown(name.to_string())),
        }
    }

    fn assign(&mut self, name: &str, value: &str) -> Result<(), OptionError> {
        let invalid = || OptionError::InvalidValue {
            option: name.to_string(),
            value: value.to_string(),
        };
        match canonical(name) {
            Some("fileformat") => {
                self.file_format = Some(LineEnding::from_name(value).ok_or_else(invalid)?);
                Ok(())
            }
            Some(_) => {
                let parsed = match value {
                    "true" | "on" | "1" => true,
                    "false" | "off" | "0" => false,
                    _ => return Err(invalid()),
                };
                *self.flag_mut(name)? = parsed;
                Ok(())
            }
            None => Err(OptionError::Unknown(name.to_string())),
        }
    }

    fn show(&self, name: &str) -> Result<String, OptionError> {
        let full = canonical(name).ok_or_else(|| OptionError::Unknown(name.to_string()))?;
        let value = match full {
            "fastdirty" => self.fast_dirty,
            "rmtrailingws" => self.rm_trailing_ws,
            "eofnewline" => self.eof_newline,
            "savecursor" => self.save_cursor,
            "saveundo" => self.save_undo,
            _ => {
                return Ok(match self.file_format {
                    Some(ending) => format!("{full}={ending}"),
                    None => format!("{full}="),
                });
            }
        };
        Ok(format_bool(full, value))
    }
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

const OPTION_NAMES: [&str; 6] = [
    "eofnewline",
    "fastdirty",
    "fileformat",
    "rmtrailingws",
    "savecursor",
    "saveundo",
];

/// Resolve an abbreviation to the full option name.
fn canonical(name: &str) -> Option<&'static str> {
    Some(match name {
        "fastdirty" | "fd" => "fastdirty",
        "rmtrailingws" | "rtw" => "rmtrailingws",
        "eofnewline" | "eol" => "eofnewline",
        "savecursor" | "sc" => "savecursor",
        "saveundo" | "su" => "saveundo",
        "fileformat" | "ff" => "fileformat",
        _ => return None,
    })
}

/// Returns `true` if `name` is a known boolean option (full name or abbreviation).
#[must_use]
pub fn is_bool_option(name: &str) -> bool {
    canonical(name).is_some_and(|full| full != "fileformat")
}

/// Returns `true` if `name` is a known valued option.
#[must_use]
pub fn is_value_option(name: &str) -> bool {
    canonical(name) == Some("fileformat")
}

// ---------------------------------------------------------------------------
// :set parsing
// ---------------------------------------------------------------------------

/// A parsed `:set` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetDirective {
    /// `:set option` — enable a boolean option.
    On(String),

    /// `:set nooption` — disable a boolean option.
    Off(String),

    /// `:set option!` — toggle a boolean option.
    Toggle(String),

    /// `:set option?` — query the current value.
    Query(String),

    /// `:set option=value` — assign a value.
    Assign(String, String),

    /// `:set` with no arguments — show changed options.
    ShowChanged,

    /// `:set all` — show all options.
    ShowAll,
}

/// Parse the full `:set` arguments string into directives.
///
/// Multiple space-separated arguments are supported. An empty argument
/// string produces [`SetDirective::ShowChanged`].
#[must_use]
pub fn parse_set(args: &str) -> Vec<SetDirective> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        return vec![SetDirective::ShowChanged];
    }
    trimmed.split_whitespace().map(parse_set_arg).collect()
}

/// Parse a single `:set` argument into a directive.
#[must_use]
pub fn parse_set_arg(arg: &str) -> SetDirective {
    if arg == "all" {
        return SetDirective::ShowAll;
    }

    if let Some((name, value)) = arg.split_once('=') {
        return SetDirective::Assign(name.to_string(), value.to_string());
    }

    if let Some(name) = arg.strip_suffix('?') {
        return SetDirective::Query(name.to_string());
    }

    if let Some(name) = arg.strip_suffix('!') {
        return SetDirective::Toggle(name.to_string());
    }

    // Only strip "no" when the rest names a boolean option.
    if let Some(name) = arg.strip_prefix("no") {
        if is_bool_option(name) {
            return SetDirective::Off(name.to_string());
        }
    }

    // A bare valued option shows its value.
    if is_value_option(arg) {
        return SetDirective::Query(arg.to_string());
    }

    SetDirective::On(arg.to_string())
}

/// Returns `"name"` when true, `"noname"` when false.
#[must_use]
pub fn format_bool(name: &str, value: bool) -> String {
    if value {
        name.to_string()
    } else {
        format!("no{name}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
