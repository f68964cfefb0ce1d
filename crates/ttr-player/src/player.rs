// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Playback loop and timing discipline
//!
//! Single-threaded cooperative driver: records are read from the current
//! stream, the scaled inter-record delta is waited out with interruption
//! on keyboard input, and payloads are written through to the output sink
//! unchanged. The wait keeps a signed drift adjustment so that many short
//! sleeps do not skew the overall pace, rolls over to the next indexed
//! file at end-of-stream, and hands jump/seek commands to the seek engine.

use std::fs::File;
use std::io::{self, BufReader, Seek, SeekFrom, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEvent};
use tracing::debug;

use crate::error::{PlayerError, Result};
use crate::format::Record;
use crate::index::SessionIndex;
use crate::input::{decode, Command};
use crate::timeval::Timeval;

/// Playback speed, with pause preserving the speed it will resume at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Speed {
    Running(f64),
    Paused(f64),
}

impl Speed {
    /// Magnitude, regardless of pause state.
    pub fn factor(&self) -> f64 {
        match self {
            Speed::Running(s) | Speed::Paused(s) => *s,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Speed::Paused(_))
    }

    pub fn toggled(self) -> Speed {
        match self {
            Speed::Running(s) => Speed::Paused(s),
            Speed::Paused(s) => Speed::Running(s),
        }
    }

    fn scaled(self, factor: f64) -> Speed {
        match self {
            Speed::Running(s) => Speed::Running(s * factor),
            Speed::Paused(s) => Speed::Paused(s * factor),
        }
    }

    pub fn doubled(self) -> Speed {
        self.scaled(2.0)
    }

    pub fn halved(self) -> Speed {
        self.scaled(0.5)
    }

    pub fn reset(self) -> Speed {
        match self {
            Speed::Running(_) => Speed::Running(1.0),
            Speed::Paused(_) => Speed::Paused(1.0),
        }
    }
}

/// Whether inter-record deltas are honored or records are emitted
/// back-to-back.
#[derive(Debug, Clone, Copy)]
pub enum Pacing {
    Timed,
    NoWait,
}

/// Mutable player state, threaded through the loop and the seek engine.
#[derive(Debug)]
pub struct PlayerState {
    /// Index of the file currently being played
    pub current_file: usize,
    /// Clear-screen entry most recently passed or landed on
    pub current_clear: Option<usize>,
    /// Cumulative elapsed time since the first record of the first file
    pub elapsed: Timeval,
    /// Outstanding user seek request in seconds; zero when none
    pub pending_seek: f64,
    pub speed: Speed,
    /// Measured oversleep carried into the next wait
    pub drift: Timeval,
}

/// Source of keyboard input for the timed wait.
///
/// `None` as the timeout means block until input arrives (pause); a
/// `Some` timeout returns `Ok(None)` once it elapses without input.
pub trait InputSource {
    fn wait_key(&mut self, timeout: Option<Duration>) -> Result<Option<KeyEvent>>;
}

/// Keyboard input from the controlling terminal.
pub struct TerminalInput;

impl InputSource for TerminalInput {
    fn wait_key(&mut self, timeout: Option<Duration>) -> Result<Option<KeyEvent>> {
        match timeout {
            Some(limit) => {
                let deadline = Instant::now() + limit;
                loop {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if !event::poll(remaining)? {
                        return Ok(None);
                    }
                    if let Event::Key(key) = event::read()? {
                        return Ok(Some(key));
                    }
                    if remaining.is_zero() {
                        return Ok(None);
                    }
                }
            }
            None => loop {
                if let Event::Key(key) = event::read()? {
                    return Ok(Some(key));
                }
            },
        }
    }
}

/// Input source that never yields a key and sleeps out every timeout.
pub struct NullInput;

impl InputSource for NullInput {
    fn wait_key(&mut self, timeout: Option<Duration>) -> Result<Option<KeyEvent>> {
        match timeout {
            Some(limit) => thread::sleep(limit),
            // Paused with no input source: nothing will ever resume us.
            None => loop {
                thread::sleep(Duration::from_secs(3600));
            },
        }
        Ok(None)
    }
}

/// The byte stream records are read from.
pub(crate) enum RecordStream {
    File(BufReader<File>),
    Stdin(BufReader<io::StdinLock<'static>>),
}

impl RecordStream {
    pub(crate) fn read_record(&mut self) -> Result<Option<Record>> {
        match self {
            RecordStream::File(r) => Record::read_from(r),
            RecordStream::Stdin(r) => Record::read_from(r),
        }
    }

    pub(crate) fn position(&mut self) -> Result<u64> {
        match self {
            RecordStream::File(r) => Ok(r.stream_position()?),
            RecordStream::Stdin(_) => Err(PlayerError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "stdin is not seekable",
            ))),
        }
    }

    pub(crate) fn seek_to(&mut self, pos: u64) -> Result<()> {
        match self {
            RecordStream::File(r) => {
                r.seek(SeekFrom::Start(pos))?;
                Ok(())
            }
            RecordStream::Stdin(_) => Err(PlayerError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "stdin is not seekable",
            ))),
        }
    }
}

/// What a key press did to the wait in progress.
enum KeyEffect {
    /// State updated; keep waiting if paused
    Absorbed,
    /// Stop waiting and let the loop continue
    Interrupt,
    /// Hand the command to the playback loop
    Dispatch(Command),
}

/// Interactive player over one indexed file sequence or a raw stdin
/// stream.
pub struct Player<I: InputSource, W: Write> {
    pub(crate) index: Option<SessionIndex>,
    pub(crate) reader: RecordStream,
    pub(crate) input: I,
    pub(crate) out: W,
    pub(crate) state: PlayerState,
    pub(crate) pacing: Pacing,
}

impl<I: InputSource, W: Write> Player<I, W> {
    /// Index the given files and open the first one for playback.
    pub fn over_files<P: AsRef<Path>>(
        paths: &[P],
        input: I,
        out: W,
        speed: f64,
        pacing: Pacing,
    ) -> Result<Self> {
        if paths.is_empty() {
            return Err(PlayerError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no input files",
            )));
        }
        let index = SessionIndex::build(paths)?;
        let first = open_recording(&index.file(0).path)?;
        Ok(Player {
            index: Some(index),
            reader: RecordStream::File(first),
            input,
            out,
            state: initial_state(speed),
            pacing,
        })
    }

    /// Play records arriving on stdin; navigation is unavailable.
    pub fn over_stdin(input: I, out: W, speed: f64, pacing: Pacing) -> Self {
        Player {
            index: None,
            reader: RecordStream::Stdin(BufReader::new(io::stdin().lock())),
            input,
            out,
            state: initial_state(speed),
            pacing,
        }
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn index(&self) -> Option<&SessionIndex> {
        self.index.as_ref()
    }

    /// Run playback to completion or until quit.
    pub fn run(&mut self) -> Result<()> {
        let mut prev: Option<Timeval> = None;
        loop {
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

            if let (Pacing::Timed, Some(prev_ts)) = (self.pacing, prev) {
                if let Some(cmd) = self.wait_between(prev_ts, record.ts)? {
                    match cmd {
                        Command::Quit => return Ok(()),
                        Command::NextFile => {
                            if self.jump_file(1)? {
                                prev = None;
                                continue;
                            }
                        }
                        Command::PrevFile => {
                            if self.jump_file(-1)? {
                                prev = None;
                                continue;
                            }
                        }
                        Command::NextClear => {
                            if self.jump_clear(1)? {
                                prev = None;
                                continue;
                            }
                        }
                        Command::PrevClear => {
                            if self.jump_clear(-1)? {
                                prev = None;
                                continue;
                            }
                        }
                        Command::SeekToStart => {
                            if self.rewind_to_start()? {
                                prev = None;
                                continue;
                            }
                        }
                        Command::SeekToEnd => {
                            if self.seek_to_final_clear()? {
                                prev = None;
                                continue;
                            }
                        }
                        // Speed, pause, and relative seeks were already
                        // applied inside the wait.
                        _ => {}
                    }
                }

                if self.state.pending_seek != 0.0 {
                    let offset = Timeval::from_secs_f64(self.state.pending_seek);
                    self.state.pending_seek = 0.0;
                    if self.can_seek() {
                        let target = (self.state.elapsed + offset).max_zero();
                        prev = self.seek_to_time(target)?;
                        continue;
                    }
                }
            }

            self.emit(&record.payload)?;
            if let Some(p) = prev {
                self.state.elapsed = self.state.elapsed + (record.ts - p);
                self.refresh_current_clear();
            }
            prev = Some(record.ts);
        }
        Ok(())
    }

    /// Wait out the scaled delta between two records, returning early on
    /// keyboard input. Returns a command for the loop to act on, if any.
    fn wait_between(&mut self, prev: Timeval, cur: Timeval) -> Result<Option<Command>> {
        loop {
            if self.state.speed.is_paused() {
                let Some(key) = self.input.wait_key(None)? else {
                    continue;
                };
                self.state.drift = Timeval::ZERO;
                match self.apply_key(&key) {
                    KeyEffect::Absorbed => continue,
                    KeyEffect::Interrupt => return Ok(None),
                    KeyEffect::Dispatch(cmd) => return Ok(Some(cmd)),
                }
            }

            let scaled = (cur - prev).div(self.state.speed.factor());
            let requested = (scaled - self.state.drift).max_zero();
            let started = Instant::now();
            match self.input.wait_key(Some(requested.to_duration()))? {
                None => {
                    let actual = Timeval::from_duration(started.elapsed());
                    self.state.drift = self.state.drift + actual - scaled;
                    return Ok(None);
                }
                Some(key) => {
                    // Time spent on user input is not playback time.
                    self.state.drift = Timeval::ZERO;
                    match self.apply_key(&key) {
                        // A pause starts blocking within this same wait.
                        KeyEffect::Absorbed if self.state.speed.is_paused() => continue,
                        KeyEffect::Absorbed | KeyEffect::Interrupt => return Ok(None),
                        KeyEffect::Dispatch(cmd) => return Ok(Some(cmd)),
                    }
                }
            }
        }
    }

    fn apply_key(&mut self, key: &KeyEvent) -> KeyEffect {
        match decode(key, self.state.speed.factor()) {
            None => KeyEffect::Absorbed,
            Some(Command::SpeedDouble) => {
                self.state.speed = self.state.speed.doubled();
                KeyEffect::Absorbed
            }
            Some(Command::SpeedHalve) => {
                self.state.speed = self.state.speed.halved();
                KeyEffect::Absorbed
            }
            Some(Command::SpeedReset) => {
                self.state.speed = self.state.speed.reset();
                KeyEffect::Absorbed
            }
            Some(Command::TogglePause) => {
                self.state.speed = self.state.speed.toggled();
                if self.state.speed.is_paused() {
                    KeyEffect::Absorbed
                } else {
                    KeyEffect::Interrupt
                }
            }
            Some(Command::SeekBy(secs)) => {
                self.state.pending_seek += secs;
                KeyEffect::Interrupt
            }
            Some(cmd) => KeyEffect::Dispatch(cmd),
        }
    }

    /// Switch to the next indexed file, if there is one.
    pub(crate) fn advance_file(&mut self) -> Result<bool> {
        let next = self.state.current_file + 1;
        let available = self
            .index
            .as_ref()
            .is_some_and(|ix| next < ix.files().len());
        if !available {
            return Ok(false);
        }
        debug!(file = next, "rolling over to next recording");
        self.open_file_at(next, 0)
    }

    /// Open the given indexed file at a byte offset and make it current.
    pub(crate) fn open_file_at(&mut self, file_idx: usize, offset: u64) -> Result<bool> {
        let path = match &self.index {
            Some(ix) => ix.file(file_idx).path.clone(),
            None => return Ok(false),
        };
        let mut reader = open_recording(&path)?;
        if offset != 0 {
            reader.seek(SeekFrom::Start(offset))?;
        }
        self.reader = RecordStream::File(reader);
        self.state.current_file = file_idx;
        Ok(true)
    }

    pub(crate) fn emit(&mut self, payload: &[u8]) -> Result<()> {
        self.out.write_all(payload)?;
        self.out.flush()?;
        Ok(())
    }

    /// Re-derive the most recently passed clear-screen entry from the
    /// elapsed time.
    pub(crate) fn refresh_current_clear(&mut self) {
        if let Some(ix) = &self.index {
            self.state.current_clear = ix.latest_clear_at_or_before(self.state.elapsed);
        }
    }
}

fn initial_state(speed: f64) -> PlayerState {
    PlayerState {
        current_file: 0,
        current_clear: None,
        elapsed: Timeval::ZERO,
        pending_seek: 0.0,
        speed: Speed::Running(speed),
        drift: Timeval::ZERO,
    }
}

fn open_recording(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|source| PlayerError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}
