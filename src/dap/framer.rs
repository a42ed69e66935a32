//! Content-Length framing for the debugger's stdio stream.
//!
//! Outgoing frames are `Content-Length: <N>\r\n\r\n<json>`. Incoming frames are read as a
//! header line followed by N+1 bytes: the blank separator line counts as a single byte
//! (a `\r\n` separator is normalized to `\n`), so the payload handed back is `"\n" + json`.
//! JSON parsers skip the leading newline, and the next header is never touched.

use crate::error::{Error, Result};
use serde::Serialize;
use std::io::{BufRead, Read, Write};

const HEADER_PREFIX: &str = "Content-Length:";
/// Larger frames are treated as a corrupt header.
pub const MAX_CONTENT_LENGTH: usize = 64 * 1024 * 1024;

pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    let mut out = format!("{} {}\r\n\r\n", HEADER_PREFIX, json.len()).into_bytes();
    out.extend_from_slice(&json);
    Ok(out)
}

pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let bytes = encode(message)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Reads one framed payload. `Ok(None)` means the stream ended before a header started.
pub fn decode_next<R: BufRead>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut header = Vec::new();
    if reader.read_until(b'\n', &mut header)? == 0 {
        return Ok(None);
    }

    let line = String::from_utf8_lossy(&header);
    let length = parse_length(&line)?;

    // The separator line is the "+1" of the read.
    let mut separator = [0u8; 1];
    reader.read_exact(&mut separator)?;
    if separator[0] == b'\r' {
        reader.read_exact(&mut separator)?;
        if separator[0] != b'\n' {
            return Err(Error::Framing(line.into_owned()));
        }
    }

    let mut payload = vec![0u8; length + 1];
    payload[0] = separator[0];
    reader.read_exact(&mut payload[1..])?;
    Ok(Some(payload))
}

fn parse_length(line: &str) -> Result<usize> {
    line.split_whitespace()
        .last()
        .and_then(|n| n.parse().ok())
        .filter(|&n| n <= MAX_CONTENT_LENGTH)
        .ok_or_else(|| Error::Framing(line.trim_end().to_string()))
}
