//! Protocol error types and decode status codes.

use std::fmt;
use thiserror::Error;

/// Failures found while decoding a framed message.
///
/// These never escape `Decoder::decode_response`; they are folded into the
/// returned envelope's `status` and `error_message`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("magic {expected} not found in header")]
    MagicMismatch { expected: &'static str },

    #[error("separator double nl not found in header")]
    MissingSeparator,

    #[error("newline not found in header after directive {directive}")]
    MissingNewline { directive: String },

    #[error("dash - not found in value {value} after directive {directive}")]
    MissingDash { directive: String, value: String },

    #[error("invalid integer {value:?} after directive {directive}")]
    InvalidInteger { directive: String, value: String },

    #[error("range {from}-{to} after directive {directive} does not fit a data segment of {len} bytes")]
    InvalidRange {
        directive: String,
        from: usize,
        to: usize,
        len: usize,
    },

    #[error("unknown directive {0}")]
    UnknownDirective(String),
}

impl ProtocolError {
    /// Returns the status code this failure is reported under.
    pub fn status(&self) -> DecodeStatus {
        match self {
            ProtocolError::MagicMismatch { .. } => DecodeStatus::MagicMismatch,
            ProtocolError::MissingSeparator => DecodeStatus::MissingSeparator,
            ProtocolError::MissingNewline { .. }
            | ProtocolError::MissingDash { .. }
            | ProtocolError::InvalidInteger { .. }
            | ProtocolError::InvalidRange { .. } => DecodeStatus::MalformedHeader,
            ProtocolError::UnknownDirective(_) => DecodeStatus::UnknownDirective,
        }
    }
}

/// Status codes produced by the response decoder.
///
/// These codes are shared with the server and must remain stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeStatus {
    Success,
    MagicMismatch,
    MissingSeparator,
    MalformedHeader,
    UnknownDirective,
}

impl DecodeStatus {
    /// Returns the integer carried in `ResponseEnvelope::status`.
    pub fn code(&self) -> i32 {
        match self {
            DecodeStatus::Success => 0,
            DecodeStatus::MagicMismatch => 1,
            DecodeStatus::MissingSeparator => 2,
            DecodeStatus::MalformedHeader => 3,
            DecodeStatus::UnknownDirective => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(DecodeStatus::Success),
            1 => Some(DecodeStatus::MagicMismatch),
            2 => Some(DecodeStatus::MissingSeparator),
            3 => Some(DecodeStatus::MalformedHeader),
            4 => Some(DecodeStatus::UnknownDirective),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DecodeStatus::Success)
    }
}

impl fmt::Display for DecodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeStatus::Success => write!(f, "SUCCESS"),
            DecodeStatus::MagicMismatch => write!(f, "MAGIC_MISMATCH"),
            DecodeStatus::MissingSeparator => write!(f, "MISSING_SEPARATOR"),
            DecodeStatus::MalformedHeader => write!(f, "MALFORMED_HEADER"),
            DecodeStatus::UnknownDirective => write!(f, "UNKNOWN_DIRECTIVE"),
        }
    }
}
