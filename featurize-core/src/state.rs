//! Persisted state framing for finalized computations
//!
//! Layout of a state blob (all integers little-endian):
//!
//! ```text
//! magic    4 bytes   b"FZST"
//! version  u32       FORMAT_VERSION
//! kind     u64 len + UTF-8 bytes
//! payload  u64 len + bincode bytes
//! ```
//!
//! The primitives on [`StateWriter`] and [`StateReader`] are bincode's
//! fixed-width little-endian encodings, so the framing is stable as long as
//! the version tag is.

use std::io::{Read, Write};
use std::path::Path;

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transform::Transformer;

/// Magic bytes opening every state blob
pub const MAGIC: [u8; 4] = *b"FZST";

/// Current framing version
pub const FORMAT_VERSION: u32 = 1;

/// Writes framed state primitives
pub struct StateWriter<W: Write> {
    inner: W,
}

impl<W: Write> StateWriter<W> {
    /// Wrap a writer
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write magic, version and kind tag
    pub fn write_header(&mut self, kind: &str) -> Result<()> {
        self.inner.write_all(&MAGIC)?;
        self.write_u32(FORMAT_VERSION)?;
        self.write_string(kind)
    }

    /// Write a `u32`
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        bincode::serialize_into(&mut self.inner, &value)?;
        Ok(())
    }

    /// Write a length-prefixed string
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        bincode::serialize_into(&mut self.inner, value)?;
        Ok(())
    }

    /// Write a length-prefixed byte array
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        bincode::serialize_into(&mut self.inner, value)?;
        Ok(())
    }

    /// Serialize `value` and write it as a length-prefixed byte array
    pub fn write_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let payload = bincode::serialize(value)?;
        self.write_bytes(&payload)
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reads framed state primitives
pub struct StateReader<R: Read> {
    inner: R,
}

impl<R: Read> StateReader<R> {
    /// Wrap a reader
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read and validate magic, version and kind tag
    pub fn read_header(&mut self, expected_kind: &str) -> Result<u32> {
        let mut magic = [0_u8; 4];
        self.inner
            .read_exact(&mut magic)
            .map_err(|_| Error::InvalidState("state blob is truncated".into()))?;
        if magic != MAGIC {
            return Err(Error::InvalidState("bad magic bytes".into()));
        }

        let version = self.read_u32()?;
        if version == 0 || version > FORMAT_VERSION {
            return Err(Error::InvalidState(format!(
                "unsupported format version {} (supported up to {})",
                version, FORMAT_VERSION
            )));
        }

        let kind = self.read_string()?;
        if kind != expected_kind {
            return Err(Error::InvalidState(format!(
                "expected state of kind '{}', found '{}'",
                expected_kind, kind
            )));
        }
        Ok(version)
    }

    /// Read a `u32`
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0_u8; 4];
        self.inner
            .read_exact(&mut buf)
            .map_err(|_| Error::InvalidState("state blob is truncated".into()))?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a length-prefixed string
    pub fn read_string(&mut self) -> Result<String> {
        String::from_utf8(self.read_bytes()?)
            .map_err(|_| Error::InvalidState("string is not valid UTF-8".into()))
    }

    /// Read a length-prefixed byte array.
    ///
    /// The buffer grows with the bytes actually read, so a corrupt length
    /// prefix fails as truncated instead of being allocated up front.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let mut prefix = [0_u8; 8];
        self.inner
            .read_exact(&mut prefix)
            .map_err(|_| Error::InvalidState("state blob is truncated".into()))?;
        let len = u64::from_le_bytes(prefix);

        let mut bytes = Vec::new();
        (&mut self.inner).take(len).read_to_end(&mut bytes)?;
        if bytes.len() as u64 != len {
            return Err(Error::InvalidState(format!(
                "length prefix claims {} bytes, only {} remain",
                len,
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    /// Read a length-prefixed byte array and deserialize it, never reading
    /// past the payload
    pub fn read_value<T: DeserializeOwned>(&mut self) -> Result<T> {
        let payload = self.read_bytes()?;
        let value = bincode::options()
            .with_fixint_encoding()
            .with_limit(payload.len() as u64)
            .deserialize(&payload)?;
        Ok(value)
    }

    /// Unwrap the reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Frame `value` as a state blob of the given kind
pub fn save_state<T: Serialize + ?Sized>(kind: &str, value: &T) -> Result<Vec<u8>> {
    let mut writer = StateWriter::new(Vec::new());
    writer.write_header(kind)?;
    writer.write_value(value)?;
    let bytes = writer.into_inner();
    debug!(kind, bytes = bytes.len(), "saved state");
    Ok(bytes)
}

/// Read a state blob of the given kind
pub fn load_state<T: DeserializeOwned>(kind: &str, bytes: &[u8]) -> Result<T> {
    let mut reader = StateReader::new(bytes);
    reader.read_header(kind)?;
    let value = reader.read_value()?;
    if !reader.into_inner().is_empty() {
        return Err(Error::InvalidState(format!(
            "trailing bytes after '{}' state",
            kind
        )));
    }
    Ok(value)
}

/// Save a finalized computation's state
pub fn save_transformer<T: Transformer>(transformer: &T) -> Result<Vec<u8>> {
    save_state(T::KIND, transformer)
}

/// Reconstruct a finalized computation from saved state, rejecting states
/// that fail [`Transformer::validate`]
pub fn load_transformer<T: Transformer>(bytes: &[u8]) -> Result<T> {
    let transformer: T = load_state(T::KIND, bytes)?;
    transformer
        .validate()
        .map_err(|e| Error::InvalidState(format!("invalid '{}' state: {}", T::KIND, e)))?;
    Ok(transformer)
}

/// Independent copy of a finalized computation, made by saving and
/// reconstructing it
pub fn clone_transformer<T: Transformer>(transformer: &T) -> Result<T> {
    load_transformer(&save_transformer(transformer)?)
}

/// Write a state blob to a file
pub fn save_to_file<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Read a state blob from a file
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    Ok(std::fs::read(path)?)
}
