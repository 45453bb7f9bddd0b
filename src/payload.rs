//! Message body preparation
//!
//! A dot block carries lines of text. Bodies that are not safe to send that
//! way (invalid UTF-8, NUL bytes) can be wrapped as base64 lines first, the
//! way MIME transfer encoding does for mail bodies.

use std::borrow::Cow;

use anyhow::{anyhow, Result};
use base64::Engine;

/// MIME line length for base64 bodies (RFC 2045)
pub const BASE64_LINE_WIDTH: usize = 76;

/// Configuration for body classification
#[derive(Debug, Clone)]
pub struct PayloadConfig {
    /// Treat invalid UTF-8 as binary
    pub validate_utf8: bool,
    /// Treat NUL bytes as binary (they are not allowed in protocol text)
    pub reject_nul: bool,
    /// Line width used when wrapping base64 output
    pub line_width: usize,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            validate_utf8: true,
            reject_nul: true,
            line_width: BASE64_LINE_WIDTH,
        }
    }
}

impl PayloadConfig {
    /// Set the base64 line width
    pub fn with_line_width(mut self, width: usize) -> Self {
        self.line_width = width;
        self
    }
}

/// Result of body classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadKind {
    /// Can be sent as is
    Text,
    /// Needs base64 wrapping
    Binary { reason: BinaryReason },
}

/// Reason why a body is considered binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryReason {
    /// Contains a NUL byte
    NulByte,
    /// Invalid UTF-8 encoding
    InvalidUtf8,
    /// Explicitly requested by the caller
    Explicit,
}

/// When to base64-wrap a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Base64Mode {
    /// Always send the body as is
    #[default]
    Never,
    /// Wrap only bodies classified as binary
    Auto,
    /// Wrap every body
    Always,
}

/// Classify a body
pub fn detect(data: &[u8], config: &PayloadConfig) -> PayloadKind {
    if config.reject_nul && data.contains(&0) {
        return PayloadKind::Binary {
            reason: BinaryReason::NulByte,
        };
    }

    if config.validate_utf8 && std::str::from_utf8(data).is_err() {
        return PayloadKind::Binary {
            reason: BinaryReason::InvalidUtf8,
        };
    }

    PayloadKind::Text
}

/// Base64-encode `data` into `\n`-separated lines of at most `width` characters.
///
/// The dot encoder widens the line endings to CRLF. A width of zero
/// produces a single line.
pub fn encode_base64_lines(data: &[u8], width: usize) -> Vec<u8> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    let width = if width == 0 { encoded.len().max(1) } else { width };

    let mut output = Vec::with_capacity(encoded.len() + encoded.len() / width + 1);
    for line in encoded.as_bytes().chunks(width) {
        output.extend_from_slice(line);
        output.push(b'\n');
    }
    output
}

/// Decode base64 lines produced by [`encode_base64_lines`], ignoring line breaks
pub fn decode_base64_lines(data: &[u8]) -> Result<Vec<u8>> {
    let filtered: Vec<u8> = data
        .iter()
        .copied()
        .filter(|&b| b != b'\n' && b != b'\r')
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(&filtered)
        .map_err(|e| anyhow!("Failed to decode base64 body: {}", e))
}

/// Prepare a body for a dot block.
///
/// Returns the bytes to write and the reason they were wrapped, if they were.
pub fn prepare<'a>(
    data: &'a [u8],
    mode: Base64Mode,
    config: &PayloadConfig,
) -> (Cow<'a, [u8]>, Option<BinaryReason>) {
    let reason = match mode {
        Base64Mode::Never => None,
        Base64Mode::Always => Some(BinaryReason::Explicit),
        Base64Mode::Auto => match detect(data, config) {
            PayloadKind::Text => None,
            PayloadKind::Binary { reason } => Some(reason),
        },
    };

    match reason {
        Some(reason) => (Cow::Owned(encode_base64_lines(data, config.line_width)), Some(reason)),
        None => (Cow::Borrowed(data), None),
    }
}
