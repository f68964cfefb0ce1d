// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Shared fixtures for the test suite

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use crossterm::event::KeyEvent;
use tempfile::NamedTempFile;

use crate::error::Result;
use crate::format::Record;
use crate::player::InputSource;
use crate::timeval::Timeval;

/// Write a synthetic recording through the real codec.
pub(crate) fn write_recording(records: &[(Timeval, Vec<u8>)]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for (ts, payload) in records {
        Record::new(*ts, payload.clone())
            .write_to(file.as_file_mut())
            .unwrap();
    }
    file
}

/// Input source that replays a fixed script of key events.
///
/// A `None` step (and an exhausted script) sleeps out the requested
/// timeout like an idle keyboard.
pub(crate) struct ScriptedInput {
    steps: VecDeque<Option<KeyEvent>>,
}

pub(crate) fn script(steps: &[Option<KeyEvent>]) -> ScriptedInput {
    ScriptedInput {
        steps: steps.iter().cloned().collect(),
    }
}

impl InputSource for ScriptedInput {
    fn wait_key(&mut self, timeout: Option<Duration>) -> Result<Option<KeyEvent>> {
        match self.steps.pop_front() {
            Some(Some(key)) => Ok(Some(key)),
            Some(None) | None => {
                if let Some(limit) = timeout {
                    thread::sleep(limit);
                }
                Ok(None)
            }
        }
    }
}
