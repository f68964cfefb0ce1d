// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

// Command-line entry point for the ttyrec player
//
// Parses arguments, sets up logging and the raw terminal, and dispatches
// to indexed playback, stdin playback, or peek mode. Fatal errors exit
// non-zero after the terminal guard has restored the saved attributes.

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ttr_player::{peek, Charset, Pacing, Player, TerminalGuard, TerminalInput};

/// Play back ttyrec terminal session recordings interactively
#[derive(Parser, Debug)]
#[command(name = "ttr", version)]
struct Args {
    /// Playback speed multiplier
    #[arg(short = 's', long = "speed", value_name = "SPEED", default_value_t = 1.0)]
    speed: f64,

    /// Emit records back to back without honoring inter-record delays
    #[arg(short = 'n', long = "no-wait")]
    no_wait: bool,

    /// Skip existing records, then follow the last file as it grows
    #[arg(short = 'p', long = "peek")]
    peek: bool,

    /// Select UTF-8 terminal character mapping before playback
    #[arg(short = 'u', long = "utf8", conflicts_with = "eight_bit")]
    utf8: bool,

    /// Select 8-bit terminal character mapping before playback
    #[arg(short = '8', long = "eight-bit")]
    eight_bit: bool,

    /// Recording files, played in command-line order; stdin when omitted
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,
}

impl Args {
    fn charset(&self) -> Charset {
        if self.utf8 {
            Charset::Utf8
        } else if self.eight_bit {
            Charset::EightBit
        } else {
            Charset::Default
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    if args.speed <= 0.0 || !args.speed.is_finite() {
        bail!("speed must be a positive number, got {}", args.speed);
    }
    tracing::debug!(?args, "starting player");

    let guard = TerminalGuard::new(args.charset()).context("failed to set up the terminal")?;
    let outcome = run(&args);
    // Restore before anyhow prints a diagnostic to the (cooked) terminal.
    drop(guard);
    outcome
}

fn run(args: &Args) -> Result<()> {
    let pacing = if args.no_wait {
        Pacing::NoWait
    } else {
        Pacing::Timed
    };
    let stdout = io::stdout();

    if args.peek {
        let Some(last) = args.files.last() else {
            bail!("peek mode requires a recording file to follow");
        };
        let mut out = stdout;
        peek(last, &mut TerminalInput, &mut out)
            .with_context(|| format!("cannot follow {}", last.display()))?;
    } else if !args.files.is_empty() {
        Player::over_files(&args.files, TerminalInput, stdout, args.speed, pacing)
            .context("cannot index recordings")?
            .run()
            .context("playback failed")?;
    } else {
        Player::over_stdin(TerminalInput, stdout, args.speed, pacing)
            .run()
            .context("playback from stdin failed")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_speed_and_files() {
        let args =
            Args::try_parse_from(["ttr", "-s", "2.5", "-n", "a.tty", "b.tty"]).unwrap();
        assert_eq!(args.speed, 2.5);
        assert!(args.no_wait);
        assert_eq!(args.files, vec![PathBuf::from("a.tty"), PathBuf::from("b.tty")]);
        assert_eq!(args.charset(), Charset::Default);
    }

    #[test]
    fn defaults_to_stdin_at_unit_speed() {
        let args = Args::try_parse_from(["ttr"]).unwrap();
        assert_eq!(args.speed, 1.0);
        assert!(args.files.is_empty());
        assert!(!args.peek);
    }

    #[test]
    fn charset_flags_are_exclusive() {
        let args = Args::try_parse_from(["ttr", "-8", "x.tty"]).unwrap();
        assert_eq!(args.charset(), Charset::EightBit);

        let args = Args::try_parse_from(["ttr", "-u", "x.tty"]).unwrap();
        assert_eq!(args.charset(), Charset::Utf8);

        assert!(Args::try_parse_from(["ttr", "-u", "-8", "x.tty"]).is_err());
    }
}
