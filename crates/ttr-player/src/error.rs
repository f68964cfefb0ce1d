// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the replay engine

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Errors that can occur while indexing or replaying a recording
#[derive(Debug, Error)]
pub enum PlayerError {
    /// A record declared more payload bytes than the stream contains.
    #[error("corrupt recording: payload truncated, expected {expected} bytes")]
    ShortRead { expected: usize },

    /// A record header declared a payload beyond the supported maximum.
    #[error("record payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: u32, max: usize },

    #[error("cannot open {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
