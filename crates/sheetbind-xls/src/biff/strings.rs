//! BIFF8 string decoding.
//!
//! A string is a character count, a flags byte and the characters. Flag bit
//! 0 selects UTF-16LE over compressed Latin-1, bit 2 announces trailing
//! phonetic data and bit 3 trailing rich-text runs.
//!
//! Inside the SST a string may cross a CONTINUE boundary. The continuation
//! then starts with a fresh flags byte that may switch the encoding.

use super::parser::{read_u16, read_u32, read_u8};
use crate::error::{XlsError, XlsResult};

const WIDE: u8 = 0x01;
const EXT: u8 = 0x04;
const RICH: u8 = 0x08;

/// Read a string with a one-byte character count (sheet names).
pub fn read_short_string(data: &[u8], offset: &mut usize) -> XlsResult<String> {
    let count = read_u8(data, offset)? as usize;
    let flags = read_u8(data, offset)?;
    read_chars(data, offset, count, flags & WIDE != 0, usize::MAX).map(|(s, _)| s)
}

/// Read `count` characters preceded by a flags byte (the count lives
/// elsewhere in the record, as in NAME).
pub fn read_uncounted_string(data: &[u8], offset: &mut usize, count: usize) -> XlsResult<String> {
    let flags = read_u8(data, offset)?;
    read_chars(data, offset, count, flags & WIDE != 0, usize::MAX).map(|(s, _)| s)
}

/// Read a string with a two-byte character count that lives inside one record.
pub fn read_unicode_string(data: &[u8], offset: &mut usize) -> XlsResult<String> {
    read_split_string(data, offset, &[])
}

/// Read a two-byte-count string whose characters may cross one of the
/// `boundaries` (body offsets where a CONTINUE record started).
fn read_split_string(data: &[u8], offset: &mut usize, boundaries: &[usize]) -> XlsResult<String> {
    let count = read_u16(data, offset)? as usize;
    let flags = read_u8(data, offset)?;
    let runs = if flags & RICH != 0 {
        read_u16(data, offset)? as usize
    } else {
        0
    };
    let ext = if flags & EXT != 0 {
        read_u32(data, offset)? as usize
    } else {
        0
    };

    let mut text = String::with_capacity(count);
    let mut wide = flags & WIDE != 0;
    let mut remaining = count;
    loop {
        let limit = boundaries
            .iter()
            .copied()
            .find(|&b| b >= *offset)
            .unwrap_or(usize::MAX);
        let (part, read) = read_chars(data, offset, remaining, wide, limit)?;
        text.push_str(&part);
        remaining -= read;
        if remaining == 0 {
            break;
        }
        // continuation: a new flags byte picks the encoding of the rest
        wide = read_u8(data, offset)? & WIDE != 0;
    }

    *offset += runs * 4 + ext;
    Ok(text)
}

/// Read up to `count` characters, stopping early at the byte offset `limit`.
/// Returns the text and the number of characters read.
fn read_chars(
    data: &[u8],
    offset: &mut usize,
    count: usize,
    wide: bool,
    limit: usize,
) -> XlsResult<(String, usize)> {
    let width = if wide { 2 } else { 1 };
    let available = limit.saturating_sub(*offset) / width;
    let n = count.min(available);
    let bytes = data.get(*offset..*offset + n * width).ok_or_else(|| {
        XlsError::Parse(format!(
            "string data too short: need {} bytes at offset {}",
            n * width,
            *offset
        ))
    })?;
    let text = if wide {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16(&units)
            .map_err(|e| XlsError::Parse(format!("invalid UTF-16 string: {e}")))?
    } else {
        bytes.iter().map(|&b| b as char).collect()
    };
    *offset += n * width;
    Ok((text, n))
}

/// Parse the shared string table.
///
/// `data` is the SST body with its CONTINUE bodies appended, and
/// `boundaries` the offsets at which those continuations start.
pub fn parse_sst(data: &[u8], boundaries: &[usize]) -> XlsResult<Vec<String>> {
    let mut offset = 0;
    let _total = read_u32(data, &mut offset)?;
    let unique = read_u32(data, &mut offset)? as usize;

    let mut strings = Vec::with_capacity(unique.min(data.len()));
    for i in 0..unique {
        match read_split_string(data, &mut offset, boundaries) {
            Ok(s) => strings.push(s),
            Err(e) => {
                log::warn!("SST truncated at string {i}/{unique}: {e}");
                break;
            }
        }
    }
    Ok(strings)
}
