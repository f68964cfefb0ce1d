// On-disk layout of a ttyrec recording
//
// A recording is a bare concatenation of records with no magic number,
// framing checksum, or trailer. Each record is a fixed 12-byte header
// (seconds, microseconds, payload length, all unsigned 32-bit
// little-endian) followed by the payload bytes originally written to the
// recorded pseudo-terminal.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::error::{PlayerError, Result};
use crate::timeval::Timeval;

/// Size of the record header on disk
pub const HEADER_SIZE: usize = 12;

/// Maximum supported payload length; larger declarations are treated as
/// corruption (observed recordings stay well below this).
pub const MAX_PAYLOAD: usize = 8192;

/// The 4-byte clear-screen marker, `ESC [ 2 J`. Its first occurrence in a
/// payload defines a navigation point.
pub const CLEAR_SCREEN: &[u8; 4] = b"\x1b[2J";

/// One timestamped chunk of recorded terminal output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Wall clock at capture; only differences between records matter
    pub ts: Timeval,
    /// Opaque terminal output, never interpreted beyond the marker scan
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(ts: Timeval, payload: Vec<u8>) -> Self {
        Record { ts, payload }
    }

    /// Number of bytes this record occupies on disk.
    pub fn len_on_disk(&self) -> u64 {
        (HEADER_SIZE + self.payload.len()) as u64
    }

    /// Byte offset of the first clear-screen marker within the payload.
    pub fn clear_screen_offset(&self) -> Option<usize> {
        self.payload
            .windows(CLEAR_SCREEN.len())
            .position(|w| w == CLEAR_SCREEN)
    }

    /// Read the next record from a stream.
    ///
    /// Returns `Ok(None)` when fewer than a full header remains at the
    /// read position; a half-written trailing header is indistinguishable
    /// from a clean end and is treated as one (callers that intend to
    /// retry must restore the stream position themselves). A payload
    /// shorter than its declared length is a fatal corruption.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Option<Record>> {
        let mut header = [0u8; HEADER_SIZE];
        let mut filled = 0;
        while filled < HEADER_SIZE {
            match r.read(&mut header[filled..]) {
                Ok(0) => return Ok(None),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let mut fields = &header[..];
        let sec = fields.read_u32::<LittleEndian>()?;
        let usec = fields.read_u32::<LittleEndian>()?;
        let len = fields.read_u32::<LittleEndian>()?;

        if len as usize > MAX_PAYLOAD {
            return Err(PlayerError::PayloadTooLarge { len, max: MAX_PAYLOAD });
        }

        let mut payload = vec![0u8; len as usize];
        r.read_exact(&mut payload).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                PlayerError::ShortRead { expected: len as usize }
            } else {
                PlayerError::Io(e)
            }
        })?;

        Ok(Some(Record {
            ts: Timeval::new(sec as i64, usec as i64),
            payload,
        }))
    }

    /// Write the record in the on-disk layout.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<LittleEndian>(self.ts.sec as u32)?;
        w.write_u32::<LittleEndian>(self.ts.usec as u32)?;
        w.write_u32::<LittleEndian>(self.payload.len() as u32)?;
        w.write_all(&self.payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn record_round_trip() {
        let record = Record::new(Timeval::new(1234, 567_890), b"hello world".to_vec());

        let mut buf = Vec::new();
        record.write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, record.len_on_disk());

        let mut cursor = Cursor::new(buf);
        let decoded = Record::read_from(&mut cursor).unwrap().unwrap();
        assert_eq!(record, decoded);

        // Nothing after the record, so the next read is a clean end.
        assert!(Record::read_from(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn truncated_header_is_end_of_stream() {
        let record = Record::new(Timeval::new(0, 0), b"x".to_vec());
        let mut buf = Vec::new();
        record.write_to(&mut buf).unwrap();
        buf.extend_from_slice(&[0x01, 0x02, 0x03]); // partial trailing header

        let mut cursor = Cursor::new(buf);
        assert!(Record::read_from(&mut cursor).unwrap().is_some());
        assert!(Record::read_from(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn truncated_payload_is_fatal() {
        let mut buf = Vec::new();
        Record::new(Timeval::new(0, 0), vec![b'a'; 16]).write_to(&mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 7);

        let mut cursor = Cursor::new(buf);
        match Record::read_from(&mut cursor) {
            Err(PlayerError::ShortRead { expected }) => assert_eq!(expected, 16),
            other => panic!("expected ShortRead, got {:?}", other),
        }
    }

    #[test]
    fn oversized_payload_declaration_is_rejected() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_u32::<LittleEndian>((MAX_PAYLOAD + 1) as u32).unwrap();

        let mut cursor = Cursor::new(buf);
        match Record::read_from(&mut cursor) {
            Err(PlayerError::PayloadTooLarge { len, max }) => {
                assert_eq!(len as usize, MAX_PAYLOAD + 1);
                assert_eq!(max, MAX_PAYLOAD);
            }
            other => panic!("expected PayloadTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn clear_screen_offset_finds_first_occurrence() {
        let record = Record::new(Timeval::ZERO, b"ab\x1b[2Jcd\x1b[2J".to_vec());
        assert_eq!(record.clear_screen_offset(), Some(2));

        let plain = Record::new(Timeval::ZERO, b"no marker here".to_vec());
        assert_eq!(plain.clear_screen_offset(), None);
    }
}
