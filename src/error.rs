use thiserror::Error;

use crate::registry::CodecKey;

/// Typed decode/encode failures.
///
/// Every parse failure is returned as a value; malformed input from a
/// switch must never take down the thread that is decoding it. The
/// transport layer turns these into closed connections or dropped
/// messages as it sees fit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ended before the declared length was consumed.
    #[error("message truncated: need {need} more bytes at offset {at}, {left} available")]
    TruncatedMessage { at: usize, need: usize, left: usize },

    /// Structurally present but semantically invalid input or message.
    #[error("invalid message: {reason}")]
    InvalidMessage { reason: &'static str },

    /// An experimenter structure carried an id other than the vendor's.
    #[error("unknown experimenter id {found:#010x}, expected {expected:#010x}")]
    UnknownExperimenter { expected: u32, found: u32 },

    /// Registry miss. Recoverable: the enclosing decoder decides whether
    /// to skip the fragment or abort the message.
    #[error("no codec registered for {key}")]
    NoCodecForKey { key: CodecKey },

    /// A declared length was not fully consumed by the sub-decoder.
    #[error("{left} trailing bytes after {context}")]
    TrailingData { context: &'static str, left: usize },

    /// A textual CIDR suffix outside the address width.
    #[error("prefix length {prefix} out of range for a {bits}-bit address")]
    InvalidMaskRange { prefix: u8, bits: u8 },
}
