//! Log output setup

use clap::ValueEnum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable, ANSI colours (stderr)
    Coloured,
    /// Human readable, no colours (stderr)
    Plain,
    /// One JSON object per line (stdout)
    Json,
}

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Level for our own crates: info, one step per `-v` up, per `-q` down
pub fn level(verbose: u8, quiet: u8) -> &'static str {
    let index = (2 + i32::from(verbose) - i32::from(quiet)).clamp(0, 4);
    LEVELS[index as usize]
}

/// Install the global subscriber. `RUST_LOG` overrides the verbosity flags.
pub fn init(format: LogFormat, verbose: u8, quiet: u8) {
    let level = level(verbose, quiet);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("warn,ducd={0},duc_client={0},duc_bridge={0}", level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Coloured => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Plain => registry
            .with(fmt::layer().with_ansi(false).with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}
