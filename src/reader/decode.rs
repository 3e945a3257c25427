//! Byte input decoding.
//!
//! The encoding is taken from the byte order mark if there is one, then from
//! the `encoding` pseudo attribute of the XML declaration, and defaults to
//! UTF-8.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

use crate::error::ParseError;

/// Decodes `bytes` to UTF-8 text without the byte order mark.
pub(crate) fn decode(bytes: &[u8]) -> Result<Cow<'_, str>, ParseError> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom)) => (encoding, &bytes[bom..]),
        None => (declared_encoding(bytes)?.unwrap_or(UTF_8), bytes),
    };
    tracing::trace!(encoding = encoding.name(), len = body.len(), "decoding input");
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| ParseError::Encoding(format!("input is not valid {}", encoding.name())))
}

/// Reads the declared encoding, scanning the bytes as ASCII.
fn declared_encoding(bytes: &[u8]) -> Result<Option<&'static Encoding>, ParseError> {
    let Some(label) = declaration_label(&bytes[..bytes.len().min(200)]) else {
        return Ok(None);
    };
    let encoding = Encoding::for_label(label)
        .ok_or_else(|| ParseError::Encoding(format!(
            "unsupported encoding: {}",
            String::from_utf8_lossy(label)
        )))?;
    // Without a byte order mark the declaration was readable as ASCII, so
    // the input cannot really be UTF-16.
    if encoding == UTF_16LE || encoding == UTF_16BE {
        return Ok(None);
    }
    Ok(Some(encoding))
}

fn declaration_label(scan: &[u8]) -> Option<&[u8]> {
    if !scan.starts_with(b"<?xml") {
        return None;
    }
    let end = scan.windows(2).position(|w| w == b"?>")?;
    let decl = &scan[..end];
    let at = decl.windows(8).position(|w| w == b"encoding")?;
    let rest = skip_whitespace(&decl[at + 8..]).strip_prefix(b"=")?;
    let rest = skip_whitespace(rest);
    let quote = *rest.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value = &rest[1..];
    let close = value.iter().position(|&b| b == quote)?;
    Some(&value[..close])
}

fn skip_whitespace(bytes: &[u8]) -> &[u8] {
    let skip = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
    &bytes[skip..]
}
