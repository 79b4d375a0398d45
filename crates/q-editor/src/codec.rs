//! Codecs — the byte transform between a file on disk and its lines.
//!
//! Loading runs the raw file stream through [`Codec::decode`] before any
//! line is split; saving hands the serialized bytes to [`Codec::encode`]
//! before anything touches the disk. Encryption lives behind this trait; the
//! buffer never branches on what a codec does.
//!
//! Which codec applies to a file is decided by a [`CodecRegistry`] that the
//! embedding editor builds once per session. Unregistered files get the
//! [`IdentityCodec`].

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::error::CodecError;

/// A reversible transform over file bytes.
pub trait Codec: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Wrap the raw file stream in a decoding reader.
    ///
    /// # Errors
    ///
    /// Fails when the stream cannot be opened with this codec (wrong key,
    /// bad armor). Errors that only show up mid-stream surface from the
    /// returned reader as I/O errors.
    fn decode<'a>(&self, input: Box<dyn Read + 'a>) -> Result<Box<dyn Read + 'a>, CodecError>;

    /// Transform serialized content into the bytes written to disk.
    ///
    /// # Errors
    ///
    /// Any failure leaves the file on disk untouched.
    fn encode(&self, plain: Vec<u8>) -> Result<Vec<u8>, CodecError>;
}

/// Pass-through codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl Codec for IdentityCodec {
    fn name(&self) -> &str {
        "identity"
    }

    fn decode<'a>(&self, input: Box<dyn Read + 'a>) -> Result<Box<dyn Read + 'a>, CodecError> {
        Ok(input)
    }

    fn encode(&self, plain: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(plain)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps file-name suffixes to codecs.
///
/// The longest matching suffix wins. Files matching nothing use the
/// fallback, which is the identity codec unless replaced.
#[derive(Clone)]
pub struct CodecRegistry {
    by_suffix: Vec<(String, Arc<dyn Codec>)>,
    fallback: Arc<dyn Codec>,
}

impl CodecRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_suffix: Vec::new(),
            fallback: Arc::new(IdentityCodec),
        }
    }

    /// Use `codec` for every file name ending in `suffix` (e.g. `".gpg"`).
    /// Registering the same suffix again replaces the earlier codec.
    pub fn register(&mut self, suffix: impl Into<String>, codec: Arc<dyn Codec>) {
        let suffix = suffix.into();
        self.by_suffix.retain(|(s, _)| *s != suffix);
        self.by_suffix.push((suffix, codec));
    }

    /// Replace the codec used for unmatched files.
    pub fn set_fallback(&mut self, codec: Arc<dyn Codec>) {
        self.fallback = codec;
    }

    /// The codec for `path`, judged by its file name.
    #[must_use]
    pub fn for_path(&self, path: &Path) -> Arc<dyn Codec> {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return Arc::clone(&self.fallback);
        };
        self.by_suffix
            .iter()
            .filter(|(suffix, _)| name.ends_with(suffix.as_str()))
            .max_by_key(|(suffix, _)| suffix.len())
            .map_or_else(|| Arc::clone(&self.fallback), |(_, codec)| Arc::clone(codec))
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("suffixes", &self.by_suffix.iter().map(|(s, _)| s).collect::<Vec<_>>())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Test codec
// ---------------------------------------------------------------------------

/// A toy keyed codec for exercising the non-identity paths: a magic
/// header, one key-check byte, then the payload XORed with the key.
#[cfg(test)]
pub(crate) struct XorCodec {
    pub key: u8,
}

#[cfg(test)]
impl XorCodec {
    const MAGIC: &'static [u8] = b"QX1";
}

#[cfg(test)]
impl Codec for XorCodec {
    fn name(&self) -> &str {
        "xor"
    }

    fn decode<'a>(&self, mut input: Box<dyn Read + 'a>) -> Result<Box<dyn Read + 'a>, CodecError> {
        let mut raw = Vec::new();
        input.read_to_end(&mut raw)?;
        let body = raw
            .strip_prefix(Self::MAGIC)
            .ok_or_else(|| CodecError::Armor("missing header".into()))?;
        let (&check, payload) = body
            .split_first()
            .ok_or_else(|| CodecError::Corrupt("truncated header".into()))?;
        if check != self.key {
            return Err(CodecError::InvalidPassword);
        }
        let plain: Vec<u8> = payload.iter().map(|b| b ^ self.key).collect();
        Ok(Box::new(std::io::Cursor::new(plain)))
    }

    fn encode(&self, plain: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut out = Self::MAGIC.to_vec();
        out.push(self.key);
        out.extend(plain.iter().map(|b| b ^ self.key));
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
