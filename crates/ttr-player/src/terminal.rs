// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Terminal adapter: raw mode with guaranteed restoration
//!
//! Playback needs single-byte keyboard reads with echo off, and the
//! terminal must be restored on every exit path: normal return, fatal
//! error, SIGINT, and panic. Restoration is a single idempotent function
//! wired to all four.

use std::env;
use std::io::{self, Write};
use std::panic;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::terminal;
use tracing::debug;

use crate::error::Result;

/// Character mapping selected before playback begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Default,
    Utf8,
    EightBit,
}

const UTF8_CHARSET: &[u8] = b"\x1b%G";
const EIGHT_BIT_CHARSET: &[u8] = b"\x1b%@";

static RAW_MODE_ENABLED: AtomicBool = AtomicBool::new(false);
static RESTORE_DONE: AtomicBool = AtomicBool::new(false);

/// Puts the controlling terminal into raw mode for the guard's lifetime.
pub struct TerminalGuard {
    _private: (),
}

impl TerminalGuard {
    pub fn new(charset: Charset) -> Result<Self> {
        if env::var_os("TERM").is_none() {
            env::set_var("TERM", "xterm");
        }

        match terminal::enable_raw_mode() {
            Ok(()) => {
                RAW_MODE_ENABLED.store(true, Ordering::SeqCst);
                RESTORE_DONE.store(false, Ordering::SeqCst);
            }
            // Not a terminal (piped playback); single-byte reads are
            // simply unavailable.
            Err(e) => debug!(error = %e, "raw mode unavailable"),
        }

        let mut stdout = io::stdout();
        let escape = match charset {
            Charset::Utf8 => Some(UTF8_CHARSET),
            Charset::EightBit => Some(EIGHT_BIT_CHARSET),
            Charset::Default => None,
        };
        if let Some(escape) = escape {
            stdout.write_all(escape)?;
            stdout.flush()?;
        }

        // Raw mode disables terminal-generated SIGINT, but an externally
        // delivered one must still leave a usable terminal behind.
        ctrlc::set_handler(|| {
            restore_terminal();
            process::exit(130);
        })
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        let default_panic = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_terminal();
            default_panic(info);
        }));

        Ok(TerminalGuard { _private: () })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

/// Restore the saved terminal attributes. Safe to call more than once
/// and from the signal handler.
pub fn restore_terminal() {
    if RESTORE_DONE.swap(true, Ordering::SeqCst) {
        return;
    }
    if RAW_MODE_ENABLED.swap(false, Ordering::SeqCst) {
        let _ = terminal::disable_raw_mode();
    }
}
