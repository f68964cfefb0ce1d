// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Peek mode: follow a recording that is still being written
//!
//! Skips every record already on disk without emitting, then polls for
//! appended records and writes them through as they complete. Pacing is
//! disabled; the poll sleep doubles as the input wait so the tail can be
//! ended from the keyboard.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{PlayerError, Result};
use crate::format::Record;
use crate::input::{decode, Command};
use crate::player::InputSource;

/// How often the tail checks the file for new records.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Tail-follow one recording file.
pub fn peek<I: InputSource, W: Write>(path: &Path, input: &mut I, out: &mut W) -> Result<()> {
    let file = File::open(path).map_err(|source| PlayerError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let mut pos: u64 = 0;

    // Skip past everything already recorded. A record the writer has not
    // finished yet reads as end-of-stream or a short payload; either way
    // `pos` stays at the last complete record boundary.
    loop {
        match Record::read_from(&mut reader) {
            Ok(Some(record)) => pos += record.len_on_disk(),
            Ok(None) | Err(PlayerError::ShortRead { .. }) => break,
            Err(e) => return Err(e),
        }
    }
    debug!(skipped_bytes = pos, "tailing recording");

    loop {
        reader.seek(SeekFrom::Start(pos))?;
        match Record::read_from(&mut reader) {
            Ok(Some(record)) => {
                out.write_all(&record.payload)?;
                out.flush()?;
                pos += record.len_on_disk();
            }
            Ok(None) | Err(PlayerError::ShortRead { .. }) => {
                if let Some(key) = input.wait_key(Some(POLL_INTERVAL))? {
                    if decode(&key, 1.0) == Some(Command::Quit) {
                        return Ok(());
                    }
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{script, write_recording};
    use crate::timeval::Timeval;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::thread;

    fn quit_key() -> Option<KeyEvent> {
        Some(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE))
    }

    #[test]
    fn existing_records_are_skipped_silently() {
        let file = write_recording(&[
            (Timeval::new(0, 0), b"old".to_vec()),
            (Timeval::new(1, 0), b"history".to_vec()),
        ]);

        let mut input = script(&[quit_key()]);
        let mut out = Vec::new();
        peek(file.path(), &mut input, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn appended_records_are_emitted() {
        let file = write_recording(&[(Timeval::new(0, 0), b"old".to_vec())]);

        let path = file.path().to_path_buf();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            Record::new(Timeval::new(2, 0), b"fresh".to_vec())
                .write_to(&mut f)
                .unwrap();
            f.flush().unwrap();
        });

        // Two idle polls bracket the append; the third ends the tail.
        let mut input = script(&[None, None, quit_key()]);
        let mut out = Vec::new();
        peek(file.path(), &mut input, &mut out).unwrap();
        writer.join().unwrap();

        assert_eq!(out, b"fresh".to_vec());
    }

    #[test]
    fn half_written_trailing_record_is_not_fatal() {
        let file = write_recording(&[(Timeval::new(0, 0), b"done".to_vec())]);
        {
            let mut f = std::fs::OpenOptions::new()
                .append(true)
                .open(file.path())
                .unwrap();
            // A complete header whose payload has not landed yet.
            let mut partial = Vec::new();
            Record::new(Timeval::new(1, 0), vec![b'x'; 64])
                .write_to(&mut partial)
                .unwrap();
            partial.truncate(crate::format::HEADER_SIZE + 10);
            f.write_all(&partial).unwrap();
        }

        let mut input = script(&[quit_key()]);
        let mut out = Vec::new();
        peek(file.path(), &mut input, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
