// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Key decoding for interactive playback
//!
//! Translates terminal key events into abstract player commands. The
//! event layer already normalizes both CSI (`ESC [ x`) and SS3 (`ESC O x`)
//! arrow variants to the same `KeyCode`, so both forms are accepted.
//! Unknown keys decode to `None` and are silently discarded.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Base of a relative seek in seconds; scaled by the playback speed so a
/// fast playback also skips further.
pub const SEEK_STEP_SECS: f64 = 15.0;

/// Scale factor between the arrow-key, up/down, and page-key seek sizes.
pub const SEEK_STEP_SCALE: f64 = 10.0;

/// Abstract player command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SpeedDouble,
    SpeedHalve,
    SpeedReset,
    TogglePause,
    Quit,
    NextFile,
    PrevFile,
    NextClear,
    PrevClear,
    /// Relative seek by the given number of seconds (negative = backward)
    SeekBy(f64),
    SeekToStart,
    SeekToEnd,
}

/// Decode one key event against the current speed magnitude.
pub fn decode(key: &KeyEvent, speed: f64) -> Option<Command> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    let step = SEEK_STEP_SECS * speed;
    match key.code {
        // Raw mode swallows ISIG, so an interactive Ctrl-C arrives here.
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Command::Quit)
        }
        KeyCode::Char('+') => Some(Command::SpeedDouble),
        KeyCode::Char('-') => Some(Command::SpeedHalve),
        KeyCode::Char('1') => Some(Command::SpeedReset),
        KeyCode::Char('p') => Some(Command::TogglePause),
        KeyCode::Char('q') => Some(Command::Quit),
        KeyCode::Char('f') => Some(Command::NextFile),
        KeyCode::Char('d') => Some(Command::PrevFile),
        KeyCode::Char('c') => Some(Command::NextClear),
        KeyCode::Char('x') => Some(Command::PrevClear),
        KeyCode::Left => Some(Command::SeekBy(-step)),
        KeyCode::Right => Some(Command::SeekBy(step)),
        KeyCode::Up => Some(Command::SeekBy(-step * SEEK_STEP_SCALE)),
        KeyCode::Down => Some(Command::SeekBy(step * SEEK_STEP_SCALE)),
        KeyCode::PageUp => Some(Command::SeekBy(-step * SEEK_STEP_SCALE * SEEK_STEP_SCALE)),
        KeyCode::PageDown => Some(Command::SeekBy(step * SEEK_STEP_SCALE * SEEK_STEP_SCALE)),
        KeyCode::Home => Some(Command::SeekToStart),
        KeyCode::End => Some(Command::SeekToEnd),
        _ => None,
    }
}
