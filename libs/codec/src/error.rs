//! Codec error type.

use thiserror::Error;

/// Frame-level decode failures.
///
/// These never escape the parser on the hot path; they exist for
/// diagnostics and for tools that want frame-by-frame validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame length {length} inconsistent with {remaining} remaining bytes")]
    BadFrameLength { length: u16, remaining: usize },

    #[error("message body {have} bytes, type requires {need}")]
    Truncated { need: usize, have: usize },

    #[error("unmapped message type 0x{0:02x}")]
    UnknownType(u8),
}
