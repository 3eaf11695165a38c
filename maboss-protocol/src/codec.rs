//! Encoder and decoder for MaBoSS envelopes.
//!
//! Request layout:
//!
//! ```text
//! LAUNCH MaBoSS-2.0\n
//! [Configuration:<from>-<to>\n]
//! [Network:<from>-<to>\n]
//! \n
//! <config bytes><network bytes>
//! ```
//!
//! Response layout:
//!
//! ```text
//! RETURN MaBoSS-2.0\n
//! Status:<int>\n
//! [Error-Message:<text>\n]
//! [<Section>:<from>-<to>\n]...
//! \n
//! <data segment>
//! ```
//!
//! Ranges are inclusive offsets into the data segment. The trailing zero byte
//! that ends a request on the socket is not part of the envelope; the
//! transport appends it.

use crate::directive::{ByteRange, Directive, DirectiveValue, HeaderDirective};
use crate::error::ProtocolError;
use crate::message::{RequestEnvelope, ResponseEnvelope};
use crate::{END_OF_REQUEST, HEADER_SEPARATOR, REQUEST_MAGIC, RESPONSE_MAGIC};
use bytes::{BufMut, Bytes, BytesMut};

/// Encodes envelopes into wire bytes.
pub struct Encoder;

impl Encoder {
    /// Encodes a request.
    ///
    /// The data segment is `config || network` and the header lists
    /// `Configuration` before `Network`; servers rely on both orders. A part
    /// of length zero gets no header line.
    pub fn encode_request(request: &RequestEnvelope) -> BytesMut {
        let parts = [
            (Directive::Configuration, request.config()),
            (Directive::Network, request.network()),
        ];
        let data_len: usize = parts.iter().map(|(_, part)| part.len()).sum();

        let mut buf = BytesMut::with_capacity(REQUEST_MAGIC.len() + 64 + data_len);
        buf.put_slice(REQUEST_MAGIC.as_bytes());
        buf.put_u8(b'\n');

        let mut offset = 0;
        for (directive, part) in &parts {
            if let Some(range) = ByteRange::spanning(offset, offset + part.len()) {
                HeaderDirective::range(*directive, range).write_to(&mut buf);
            }
            offset += part.len();
        }
        buf.put_u8(b'\n');

        for (_, part) in &parts {
            buf.put_slice(part);
        }
        buf
    }

    /// Encodes a response the way a server does.
    ///
    /// Sections are laid out in `Section` order. Newlines in the error
    /// message are replaced by spaces since a header value cannot span lines.
    pub fn encode_response(response: &ResponseEnvelope) -> BytesMut {
        let mut buf = BytesMut::with_capacity(RESPONSE_MAGIC.len() + 128);
        buf.put_slice(RESPONSE_MAGIC.as_bytes());
        buf.put_u8(b'\n');

        HeaderDirective::literal(Directive::Status, response.status.to_string()).write_to(&mut buf);
        if !response.error_message.is_empty() {
            let message = response.error_message.replace('\n', " ");
            HeaderDirective::literal(Directive::ErrorMessage, message).write_to(&mut buf);
        }

        let mut data = BytesMut::new();
        for (section, bytes) in &response.sections {
            let start = data.len();
            data.put_slice(bytes);
            if let Some(range) = ByteRange::spanning(start, data.len()) {
                HeaderDirective::range(section.directive(), range).write_to(&mut buf);
            }
        }
        buf.put_u8(b'\n');
        buf.put_slice(&data);
        buf
    }
}

/// Decodes wire bytes into envelopes.
pub struct Decoder;

impl Decoder {
    /// Decodes a complete response.
    ///
    /// Never fails: decode errors come back as a nonzero `status` with an
    /// explanatory `error_message` and no sections.
    pub fn decode_response(data: &[u8]) -> ResponseEnvelope {
        Self::try_decode_response(data).unwrap_or_else(|err| ResponseEnvelope::failed(&err))
    }

    /// Decodes a complete response, surfacing the first failure.
    ///
    /// Checks run in order and stop at the first failure: magic, separator,
    /// header syntax, then directive resolution. An unknown directive aborts
    /// decoding even when valid directives came before it.
    pub fn try_decode_response(data: &[u8]) -> Result<ResponseEnvelope, ProtocolError> {
        let (header, body) = split_envelope(data, RESPONSE_MAGIC)?;
        let items = Self::parse_header(header)?;

        let mut response = ResponseEnvelope::new();
        for item in items {
            let Some(directive) = item.directive() else {
                return Err(ProtocolError::UnknownDirective(item.name));
            };
            let HeaderDirective { name, value } = item;

            match value {
                DirectiveValue::Literal(value) => {
                    if directive == Directive::Status {
                        response.status = parse_status(&name, &value)?;
                    } else {
                        response.error_message = value;
                    }
                }
                DirectiveValue::Range(range) => {
                    let bytes = extract(&name, range, body)?;
                    // Network and Configuration are echoes of the request.
                    if let Some(section) = directive.section() {
                        response
                            .sections
                            .insert(section, Bytes::copy_from_slice(bytes));
                    }
                }
            }
        }

        Ok(response)
    }

    /// Decodes a request as a server receives it. A trailing end-of-request
    /// byte is accepted and ignored.
    pub fn decode_request(data: &[u8]) -> Result<RequestEnvelope, ProtocolError> {
        let data = data.strip_suffix(&[END_OF_REQUEST]).unwrap_or(data);
        let (header, body) = split_envelope(data, REQUEST_MAGIC)?;

        let mut network = Bytes::new();
        let mut config = Bytes::new();
        for HeaderDirective { name, value } in Self::parse_header(header)? {
            match (Directive::from_name(&name), value) {
                (Some(Directive::Network), DirectiveValue::Range(range)) => {
                    network = Bytes::copy_from_slice(extract(&name, range, body)?);
                }
                (Some(Directive::Configuration), DirectiveValue::Range(range)) => {
                    config = Bytes::copy_from_slice(extract(&name, range, body)?);
                }
                _ => return Err(ProtocolError::UnknownDirective(name)),
            }
        }

        Ok(RequestEnvelope::new(network, config))
    }

    /// Splits a header region into directive lines.
    ///
    /// Each line runs from the current position to the next `:` (name) and
    /// then to the next newline (value). Trailing text without a `:` is
    /// ignored.
    pub fn parse_header(header: &[u8]) -> Result<Vec<HeaderDirective>, ProtocolError> {
        let mut items = Vec::new();
        let mut cursor = 0;

        while let Some(colon) = find_byte(header, cursor, b':') {
            let name = String::from_utf8_lossy(&header[cursor..colon]).into_owned();
            let value_start = colon + 1;
            let newline = find_byte(header, value_start, b'\n')
                .ok_or_else(|| ProtocolError::MissingNewline {
                    directive: name.clone(),
                })?;
            let value = String::from_utf8_lossy(&header[value_start..newline]).into_owned();
            cursor = newline + 1;

            items.push(HeaderDirective::parse(name, value)?);
        }

        Ok(items)
    }
}

/// Checks the magic and returns `(header, data)`.
///
/// The header starts after the magic's own newline and keeps the newline that
/// ends its last line; the data starts after the blank line.
fn split_envelope<'a>(
    data: &'a [u8],
    magic: &'static str,
) -> Result<(&'a [u8], &'a [u8]), ProtocolError> {
    if !data.starts_with(magic.as_bytes()) {
        return Err(ProtocolError::MagicMismatch { expected: magic });
    }

    let magic_len = magic.len();
    let pos = find_slice(data, magic_len, HEADER_SEPARATOR).ok_or(ProtocolError::MissingSeparator)?;

    Ok((&data[magic_len + 1..pos + 1], &data[pos + 2..]))
}

fn extract<'a>(name: &str, range: ByteRange, body: &'a [u8]) -> Result<&'a [u8], ProtocolError> {
    range.slice(body).ok_or_else(|| ProtocolError::InvalidRange {
        directive: name.to_string(),
        from: range.from,
        to: range.to,
        len: body.len(),
    })
}

fn parse_status(name: &str, value: &str) -> Result<i32, ProtocolError> {
    value
        .trim()
        .parse()
        .map_err(|_| ProtocolError::InvalidInteger {
            directive: name.to_string(),
            value: value.to_string(),
        })
}

fn find_byte(haystack: &[u8], from: usize, byte: u8) -> Option<usize> {
    haystack[from..]
        .iter()
        .position(|&b| b == byte)
        .map(|pos| pos + from)
}

fn find_slice(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}
