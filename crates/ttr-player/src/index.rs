// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Clear-screen index over a sequence of recording files
//!
//! A one-pass scan of every input file records each clear-screen
//! occurrence together with the cumulative elapsed time at which it
//! happens. The result is the time-addressable structure the seek engine
//! navigates: an ordered list of files, each referencing an ordered run of
//! clear-screen entries, with the global chain implicit in array order.
//! Entries reference each other by index, never by ownership, and nothing
//! is mutated after construction.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PlayerError, Result};
use crate::format::{Record, HEADER_SIZE};
use crate::timeval::Timeval;

/// One input file, in command-line order
#[derive(Debug)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Cumulative elapsed time from the first record of the first file to
    /// the last record of this file
    pub elapsed_at_end: Timeval,
    /// Index of this file's first clear-screen entry, if it has any
    pub first_clear: Option<usize>,
    /// Index of this file's last clear-screen entry, if it has any
    pub last_clear: Option<usize>,
}

/// One clear-screen occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearEntry {
    /// Owning file, as an index into the file list
    pub file: usize,
    /// Byte offset within the file of the header of the record that
    /// contains the marker
    pub record_offset: u64,
    /// Byte offset within the file of the marker itself
    pub payload_offset: u64,
    /// Cumulative elapsed time at the containing record
    pub elapsed: Timeval,
}

/// Immutable navigation index spanning all input files.
///
/// `clears` is ordered by `(file, record_offset)`, which also orders it by
/// non-decreasing `elapsed`; neighbor entries in the global chain are
/// simply adjacent indices.
#[derive(Debug)]
pub struct SessionIndex {
    files: Vec<FileEntry>,
    clears: Vec<ClearEntry>,
}

impl SessionIndex {
    /// Scan every file once, in order, accumulating elapsed time across
    /// file boundaries.
    pub fn build<P: AsRef<Path>>(paths: &[P]) -> Result<SessionIndex> {
        let mut files = Vec::with_capacity(paths.len());
        let mut clears: Vec<ClearEntry> = Vec::new();
        let mut cumulative = Timeval::ZERO;

        for (file_idx, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            let file = File::open(path).map_err(|source| PlayerError::FileOpen {
                path: path.to_path_buf(),
                source,
            })?;
            let mut reader = BufReader::new(file);

            let mut first_clear = None;
            let mut last_clear = None;
            let mut offset: u64 = 0;
            let mut prev: Option<Timeval> = None;

            while let Some(record) = Record::read_from(&mut reader)? {
                let record_offset = offset;
                offset += record.len_on_disk();

                // The first record of each file contributes no delta.
                let prev_ts = prev.unwrap_or(record.ts);
                cumulative = cumulative + (record.ts - prev_ts);
                prev = Some(record.ts);

                if let Some(marker) = record.clear_screen_offset() {
                    let entry_idx = clears.len();
                    clears.push(ClearEntry {
                        file: file_idx,
                        record_offset,
                        payload_offset: record_offset + HEADER_SIZE as u64 + marker as u64,
                        elapsed: cumulative,
                    });
                    first_clear.get_or_insert(entry_idx);
                    last_clear = Some(entry_idx);
                }
            }

            debug!(
                path = %path.display(),
                clear_entries = last_clear.map_or(0, |l| l + 1 - first_clear.unwrap_or(l)),
                elapsed_at_end = cumulative.as_secs_f64(),
                "indexed recording"
            );

            files.push(FileEntry {
                path: path.to_path_buf(),
                elapsed_at_end: cumulative,
                first_clear,
                last_clear,
            });
        }

        Ok(SessionIndex { files, clears })
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn clears(&self) -> &[ClearEntry] {
        &self.clears
    }

    pub fn file(&self, idx: usize) -> &FileEntry {
        &self.files[idx]
    }

    pub fn clear(&self, idx: usize) -> &ClearEntry {
        &self.clears[idx]
    }

    /// Elapsed time at which the given file begins.
    pub fn file_start(&self, idx: usize) -> Timeval {
        if idx == 0 {
            Timeval::ZERO
        } else {
            self.files[idx - 1].elapsed_at_end
        }
    }

    /// The latest clear-screen entry whose elapsed time does not exceed
    /// the target, or `None` when the target precedes every entry.
    pub fn latest_clear_at_or_before(&self, target: Timeval) -> Option<usize> {
        let n = self.clears.partition_point(|c| c.elapsed <= target);
        n.checked_sub(1)
    }
}
