//! Base64 payload handling between source reads and target writes.
//!
//! The provider hands out base64 wrapped at 60 columns with embedded
//! newlines. Payloads are decoded fully into memory and re-encoded as a
//! single standard-alphabet line before being written to the target.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Decoded file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    bytes: Vec<u8>,
}

impl FileContent {
    /// Parses a provider payload, ignoring the whitespace the provider inserts.
    pub fn from_provider(payload: &str) -> Result<Self, ContentError> {
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = STANDARD.decode(compact.as_bytes())?;
        Ok(Self { bytes })
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Single-line standard base64, as the write endpoint expects.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}
