//! # maboss-protocol
//!
//! Wire protocol implementation for the MaBoSS simulation server.
//!
//! This crate provides:
//! - Request encoding (`LAUNCH` magic, byte-range header, data segment)
//! - Response decoding into a status, an error message and named sections
//! - The header directive vocabulary and decode status codes
//!
//! Nothing here performs I/O. The transport lives in `maboss-client`.

pub mod codec;
pub mod directive;
pub mod error;
pub mod message;

pub use codec::{Decoder, Encoder};
pub use directive::{ByteRange, Directive, DirectiveValue, HeaderDirective, Section};
pub use error::{DecodeStatus, ProtocolError};
pub use message::{RequestEnvelope, ResponseEnvelope};

/// Protocol identifier carried by both magic lines.
pub const PROTOCOL_ID: &str = "MaBoSS-2.0";

/// Magic opening every request.
pub const REQUEST_MAGIC: &str = "LAUNCH MaBoSS-2.0";

/// Magic opening every response.
pub const RESPONSE_MAGIC: &str = "RETURN MaBoSS-2.0";

/// Byte written after a request so the server knows it is complete.
pub const END_OF_REQUEST: u8 = 0;

/// Blank line separating the header from the data segment.
pub const HEADER_SEPARATOR: &[u8] = b"\n\n";
