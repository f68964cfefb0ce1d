// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Seek engine: coarse repositioning to clear-screen entries plus fine
//! forward replay
//!
//! A coarse seek lands on the latest clear-screen entry at or before the
//! target so the screen is visually coherent; the fine phase then replays
//! records forward until the next one would overshoot. File and
//! clear-screen jumps walk the index arrays, clamping at the ends and
//! switching the open stream across file boundaries.

use std::io::Write;

use tracing::debug;

use crate::error::Result;
use crate::player::{InputSource, Player};
use crate::timeval::Timeval;

/// Grace window for the previous-file key: within this many seconds of
/// entering a file, "previous" means the file before it rather than a
/// restart of the current one.
const FILE_RESTART_GRACE_SECS: i64 = 10;

impl<I: InputSource, W: Write> Player<I, W> {
    /// Whether seek targets can be resolved at all.
    pub(crate) fn can_seek(&self) -> bool {
        self.index.as_ref().is_some_and(|ix| !ix.clears().is_empty())
    }

    /// Coarse seek to `target`, then fine forward replay up to it.
    ///
    /// Returns the timestamp normal pacing should treat as "previous", or
    /// `None` when no records were consumed at the new position.
    pub fn seek_to_time(&mut self, target: Timeval) -> Result<Option<Timeval>> {
        let entry_idx = {
            let Some(ix) = &self.index else { return Ok(None) };
            if ix.clears().is_empty() {
                return Ok(None);
            }
            // A target before every entry pins to the first one.
            ix.latest_clear_at_or_before(target).unwrap_or(0)
        };
        debug!(
            target = target.as_secs_f64(),
            entry = entry_idx,
            from = self.state.elapsed.as_secs_f64(),
            "coarse seek"
        );
        self.position_at_clear(entry_idx)?;
        self.fine_forward(target)
    }

    /// Replay records forward from the current position until the next
    /// record would carry `elapsed` past the target.
    ///
    /// The overshooting record is emitted once so the screen is current
    /// just past the target, then the stream is restored to its start so
    /// regular pacing re-reads it. Rolls over file boundaries when the
    /// target lies beyond the current file.
    fn fine_forward(&mut self, target: Timeval) -> Result<Option<Timeval>> {
        let mut prev: Option<Timeval> = None;
        loop {
            let pos = self.reader.position()?;
            let record = match self.reader.read_record()? {
                Some(r) => r,
                None => {
                    if self.advance_file()? {
                        prev = None;
                        continue;
                    }
                    break;
                }
            };
            match prev {
                None => {
                    self.emit(&record.payload)?;
                    prev = Some(record.ts);
                }
                Some(p) => {
                    let delta = record.ts - p;
                    if self.state.elapsed + delta > target {
                        self.emit(&record.payload)?;
                        self.reader.seek_to(pos)?;
                        break;
                    }
                    self.state.elapsed = self.state.elapsed + delta;
                    self.emit(&record.payload)?;
                    prev = Some(record.ts);
                }
            }
        }
        self.refresh_current_clear();
        debug!(elapsed = self.state.elapsed.as_secs_f64(), "fine seek complete");
        Ok(prev)
    }

    /// Walk the file list by `step`, clamping at both ends, and reposition
    /// to the target file's first clear-screen (or its first byte when it
    /// has none).
    ///
    /// A single step backward within the grace window of the current
    /// file's start goes to the previous file; past the window it restarts
    /// the current file.
    pub fn jump_file(&mut self, step: i64) -> Result<bool> {
        let (target, first_clear, start) = {
            let Some(ix) = &self.index else { return Ok(false) };
            let last = ix.files().len() as i64 - 1;
            let current = self.state.current_file as i64;
            let mut target = current + step;
            if step == -1 {
                let in_file = self.state.elapsed - ix.file_start(self.state.current_file);
                if in_file >= Timeval::new(FILE_RESTART_GRACE_SECS, 0) {
                    target = current;
                }
            }
            let target = target.clamp(0, last) as usize;
            (target, ix.file(target).first_clear, ix.file_start(target))
        };

        debug!(target, "file jump");
        match first_clear {
            Some(entry_idx) => self.position_at_clear(entry_idx)?,
            None => {
                self.open_file_at(target, 0)?;
                self.state.elapsed = start;
                self.refresh_current_clear();
            }
        }
        Ok(true)
    }

    /// Walk the global clear-screen chain by `step`, clamping at the
    /// ends; crossing a file boundary switches the open stream.
    pub fn jump_clear(&mut self, step: i64) -> Result<bool> {
        let target = {
            let Some(ix) = &self.index else { return Ok(false) };
            if ix.clears().is_empty() {
                return Ok(false);
            }
            let last = ix.clears().len() as i64 - 1;
            match self.state.current_clear {
                Some(current) => (current as i64 + step).clamp(0, last),
                // Before the first entry, only forward steps resolve.
                None if step > 0 => (step - 1).clamp(0, last),
                None => return Ok(false),
            }
        };

        debug!(entry = target, "clear-screen jump");
        self.position_at_clear(target as usize)?;
        Ok(true)
    }

    /// Rewind to the first record of the first file.
    pub fn rewind_to_start(&mut self) -> Result<bool> {
        if self.index.is_none() {
            return Ok(false);
        }
        self.open_file_at(0, 0)?;
        self.state.elapsed = Timeval::ZERO;
        self.state.current_clear = None;
        self.state.pending_seek = 0.0;
        Ok(true)
    }

    /// Jump to the last clear-screen entry of the whole session.
    pub fn seek_to_final_clear(&mut self) -> Result<bool> {
        let last = match &self.index {
            Some(ix) if !ix.clears().is_empty() => ix.clears().len() - 1,
            _ => return Ok(false),
        };
        self.position_at_clear(last)?;
        self.state.pending_seek = 0.0;
        Ok(true)
    }

    /// Reposition the stream and player state onto a clear-screen entry.
    pub(crate) fn position_at_clear(&mut self, entry_idx: usize) -> Result<()> {
        let (file, offset, elapsed) = {
            let Some(ix) = &self.index else { return Ok(()) };
            let entry = ix.clear(entry_idx);
            (entry.file, entry.record_offset, entry.elapsed)
        };
        self.open_file_at(file, offset)?;
        self.state.elapsed = elapsed;
        self.state.current_clear = Some(entry_idx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{NullInput, Pacing, Player};
    use crate::testutil::write_recording;
    use tempfile::NamedTempFile;

    fn player_over(
        files: &[&NamedTempFile],
    ) -> Player<NullInput, Vec<u8>> {
        let paths: Vec<_> = files.iter().map(|f| f.path()).collect();
        Player::over_files(&paths, NullInput, Vec::new(), 1.0, Pacing::Timed).unwrap()
    }

    /// One file: clears at elapsed 1 and 4.
    fn clears_at_one_and_four() -> NamedTempFile {
        write_recording(&[
            (Timeval::new(0, 0), b"aa".to_vec()),
            (Timeval::new(1, 0), b"\x1b[2J#1".to_vec()),
            (Timeval::new(2, 0), b"bb".to_vec()),
            (Timeval::new(4, 0), b"\x1b[2J#2".to_vec()),
            (Timeval::new(5, 0), b"cc".to_vec()),
        ])
    }

    #[test]
    fn coarse_seek_picks_latest_entry_at_or_before_target() {
        let file = clears_at_one_and_four();
        let mut player = player_over(&[&file]);

        player.seek_to_time(Timeval::new(3, 0)).unwrap();
        assert_eq!(player.state().current_clear, Some(0));
        // Entry at 1, plus the consumed record at 2.
        assert_eq!(player.state().elapsed, Timeval::new(2, 0));
        assert_eq!(player.out, b"\x1b[2J#1bb\x1b[2J#2".to_vec());
    }

    #[test]
    fn coarse_seek_before_all_entries_pins_to_the_first() {
        let file = clears_at_one_and_four();
        let mut player = player_over(&[&file]);

        player.seek_to_time(Timeval::new(0, 500_000)).unwrap();
        assert_eq!(player.state().current_clear, Some(0));
        assert_eq!(player.state().elapsed, Timeval::new(1, 0));
    }

    #[test]
    fn fine_phase_stops_on_the_overshooting_record() {
        let file = write_recording(&[
            (Timeval::new(0, 0), b"hi".to_vec()),
            (Timeval::new(1, 0), b"\x1b[2Jcls".to_vec()),
            (Timeval::new(2, 0), b"end".to_vec()),
        ]);
        let mut player = player_over(&[&file]);

        let prev = player.seek_to_time(Timeval::new(1, 500_000)).unwrap();

        // Landed on the entry; "end" was emitted as the overshooting
        // record but not consumed, so elapsed stays at the entry time.
        assert_eq!(player.state().elapsed, Timeval::new(1, 0));
        assert_eq!(player.out, b"\x1b[2Jclsend".to_vec());
        assert_eq!(prev, Some(Timeval::new(1, 0)));

        // The stream was restored to the overshooting record.
        let next = player.reader.read_record().unwrap().unwrap();
        assert_eq!(next.payload, b"end".to_vec());
    }

    #[test]
    fn seek_never_overshoots_by_more_than_one_record() {
        let file = clears_at_one_and_four();
        for target_usec in [0i64, 1_500_000, 3_999_999, 4_000_000, 9_000_000] {
            let target = Timeval::new(0, target_usec);
            let mut player = player_over(&[&file]);
            player.seek_to_time(target).unwrap();
            assert!(
                player.state().elapsed <= target.max(Timeval::new(1, 0)),
                "elapsed {:?} beyond target {:?}",
                player.state().elapsed,
                target
            );
        }
    }

    #[test]
    fn fine_phase_crosses_file_boundaries_toward_the_target() {
        // File A: clear at 1, ends at elapsed 2. File B: no clears,
        // spans elapsed 2..6.
        let a = write_recording(&[
            (Timeval::new(0, 0), b"a0".to_vec()),
            (Timeval::new(1, 0), b"\x1b[2Ja1".to_vec()),
            (Timeval::new(2, 0), b"a2".to_vec()),
        ]);
        let b = write_recording(&[
            (Timeval::new(0, 0), b"b0".to_vec()),
            (Timeval::new(2, 0), b"b1".to_vec()),
            (Timeval::new(4, 0), b"b2".to_vec()),
        ]);
        let mut player = player_over(&[&a, &b]);

        player.seek_to_time(Timeval::new(5, 0)).unwrap();
        assert_eq!(player.state().current_file, 1);
        // Consumed through b1 at elapsed 4; b2 would land at 6.
        assert_eq!(player.state().elapsed, Timeval::new(4, 0));
        assert_eq!(player.out, b"\x1b[2Ja1a2b0b1b2".to_vec());
    }

    #[test]
    fn previous_file_honors_the_grace_window() {
        let a = write_recording(&[
            (Timeval::new(0, 0), b"\x1b[2Ja".to_vec()),
            (Timeval::new(20, 0), b"a-end".to_vec()),
        ]);
        let b = write_recording(&[
            (Timeval::new(0, 0), b"\x1b[2Jb".to_vec()),
            (Timeval::new(30, 0), b"b-end".to_vec()),
        ]);

        // Fewer than 10 seconds into file B: land on file A.
        let mut player = player_over(&[&a, &b]);
        player.state.current_file = 1;
        player.state.elapsed = Timeval::new(25, 0);
        player.jump_file(-1).unwrap();
        assert_eq!(player.state().current_file, 0);
        assert_eq!(player.state().current_clear, Some(0));
        assert_eq!(player.state().elapsed, Timeval::new(0, 0));

        // More than 10 seconds in: restart file B instead.
        let mut player = player_over(&[&a, &b]);
        player.state.current_file = 1;
        player.state.elapsed = Timeval::new(32, 0);
        player.jump_file(-1).unwrap();
        assert_eq!(player.state().current_file, 1);
        assert_eq!(player.state().current_clear, Some(1));
        assert_eq!(player.state().elapsed, Timeval::new(20, 0));
    }

    #[test]
    fn file_jumps_clamp_at_both_ends() {
        let a = write_recording(&[
            (Timeval::new(0, 0), b"\x1b[2Ja".to_vec()),
            (Timeval::new(1, 0), b"x".to_vec()),
        ]);
        let b = write_recording(&[(Timeval::new(0, 0), b"\x1b[2Jb".to_vec())]);
        let mut player = player_over(&[&a, &b]);

        player.jump_file(1).unwrap();
        assert_eq!(player.state().current_file, 1);
        // Already at the last file: a further jump restarts it.
        player.jump_file(1).unwrap();
        assert_eq!(player.state().current_file, 1);

        player.jump_file(-1).unwrap();
        assert_eq!(player.state().current_file, 0);
        player.jump_file(-1).unwrap();
        assert_eq!(player.state().current_file, 0);
    }

    #[test]
    fn clear_jumps_walk_the_chain_across_files() {
        let a = write_recording(&[
            (Timeval::new(0, 0), b"start".to_vec()),
            (Timeval::new(3, 0), b"\x1b[2JA".to_vec()),
        ]);
        let b = write_recording(&[
            (Timeval::new(0, 0), b"b-lead".to_vec()),
            (Timeval::new(4, 0), b"\x1b[2JB".to_vec()),
        ]);
        let mut player = player_over(&[&a, &b]);

        // From time zero the first forward step reaches A's entry.
        assert!(player.jump_clear(1).unwrap());
        assert_eq!(player.state().current_clear, Some(0));
        assert_eq!(player.state().current_file, 0);
        assert_eq!(player.state().elapsed, Timeval::new(3, 0));

        // The next one crosses into file B and switches the stream.
        assert!(player.jump_clear(1).unwrap());
        assert_eq!(player.state().current_clear, Some(1));
        assert_eq!(player.state().current_file, 1);
        assert_eq!(player.state().elapsed, Timeval::new(7, 0));
        let record = player.reader.read_record().unwrap().unwrap();
        assert_eq!(record.payload, b"\x1b[2JB".to_vec());

        // Clamped at the global end; backward returns to A.
        assert!(player.jump_clear(1).unwrap());
        assert_eq!(player.state().current_clear, Some(1));
        assert!(player.jump_clear(-1).unwrap());
        assert_eq!(player.state().current_clear, Some(0));
        assert_eq!(player.state().current_file, 0);
    }

    #[test]
    fn backward_clear_jump_before_any_entry_is_a_no_op() {
        let file = clears_at_one_and_four();
        let mut player = player_over(&[&file]);
        assert!(!player.jump_clear(-1).unwrap());
        assert_eq!(player.state().current_clear, None);
    }

    #[test]
    fn rewind_and_end_jumps() {
        let file = clears_at_one_and_four();
        let mut player = player_over(&[&file]);

        assert!(player.seek_to_final_clear().unwrap());
        assert_eq!(player.state().current_clear, Some(1));
        assert_eq!(player.state().elapsed, Timeval::new(4, 0));

        assert!(player.rewind_to_start().unwrap());
        assert_eq!(player.state().current_clear, None);
        assert_eq!(player.state().elapsed, Timeval::ZERO);
        let first = player.reader.read_record().unwrap().unwrap();
        assert_eq!(first.payload, b"aa".to_vec());
    }
}
