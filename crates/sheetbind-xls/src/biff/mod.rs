//! BIFF8 record stream.
//!
//! A stream is a sequence of records, each a 2-byte type and a 2-byte body
//! length followed by the body. CONTINUE records extend the body of the
//! record before them past the 8224-byte limit.

pub mod parser;
pub mod records;
pub mod strings;

use crate::error::{XlsError, XlsResult};
use std::io::{ErrorKind, Read};

/// One record, with its CONTINUE bodies appended.
#[derive(Debug, Clone, PartialEq)]
pub struct BiffRecord {
    pub record_type: u16,
    pub data: Vec<u8>,
    /// Offsets into `data` where each appended CONTINUE body starts
    pub continues: Vec<usize>,
}

impl BiffRecord {
    pub fn new(record_type: u16, data: Vec<u8>) -> Self {
        Self {
            record_type,
            data,
            continues: Vec::new(),
        }
    }
}

/// Read every record up to the end of the stream.
pub fn read_all_records<R: Read>(stream: &mut R) -> XlsResult<Vec<BiffRecord>> {
    let mut records: Vec<BiffRecord> = Vec::new();
    let mut header = [0u8; 4];

    loop {
        match stream.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let record_type = u16::from_le_bytes([header[0], header[1]]);
        let len = u16::from_le_bytes([header[2], header[3]]) as usize;

        let mut body = vec![0u8; len];
        stream.read_exact(&mut body)?;

        if record_type == records::CONTINUE {
            match records.last_mut() {
                Some(prev) => {
                    prev.continues.push(prev.data.len());
                    prev.data.extend_from_slice(&body);
                }
                None => log::warn!("dropping CONTINUE record with no parent"),
            }
        } else {
            records.push(BiffRecord::new(record_type, body));
        }
    }

    Ok(records)
}

/// Split a BOF body into `(version, substream type)`.
pub fn parse_bof(data: &[u8]) -> XlsResult<(u16, u16)> {
    if data.len() < 4 {
        return Err(XlsError::InvalidFormat("BOF record too short".into()));
    }
    Ok((
        u16::from_le_bytes([data[0], data[1]]),
        u16::from_le_bytes([data[2], data[3]]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(record_type: u16, body: &[u8]) -> Vec<u8> {
        let mut out = record_type.to_le_bytes().to_vec();
        out.extend_from_slice(&(body.len() as u16).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_continue_bodies_are_appended() {
        let mut stream = raw(records::SST, &[1, 2, 3]);
        stream.extend(raw(records::CONTINUE, &[4, 5]));
        stream.extend(raw(records::EOF, &[]));

        let recs = read_all_records(&mut stream.as_slice()).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].data, vec![1, 2, 3, 4, 5]);
        assert_eq!(recs[0].continues, vec![3]);
        assert_eq!(recs[1].record_type, records::EOF);
    }

    #[test]
    fn test_truncated_body_is_an_error() {
        let mut stream = raw(records::NUMBER, &[0; 14]);
        stream.truncate(10);
        assert!(matches!(
            read_all_records(&mut stream.as_slice()),
            Err(XlsError::Io(_))
        ));
    }

    #[test]
    fn test_parse_bof() {
        let body = [0x00, 0x06, 0x05, 0x00, 0, 0, 0, 0];
        assert_eq!(
            parse_bof(&body).unwrap(),
            (records::BIFF8_VERSION, records::BOF_WORKBOOK_GLOBALS)
        );
        assert!(parse_bof(&[0x00]).is_err());
    }
}
