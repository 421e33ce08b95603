//! Stderr logging for the command-line tool
//!
//! The engine logs through the `log` facade; the subscriber installed here
//! bridges those records into `tracing_subscriber`. Filter directives come
//! from `OLAPCALC_LOG` when it is set and valid, otherwise from the number
//! of `--verbose` flags.

use anyhow::{Result, anyhow};
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

pub const ENV_VAR: &str = "OLAPCALC_LOG";

const ENGINE_TARGETS: [&str; 4] = ["olapcalc", "olapcalc_eval", "olapcalc_model", "olapcalc_types"];

/// Directives for `verbose` flags: warnings everywhere, more detail for
/// the engine crates
pub fn default_directives(verbose: u8) -> String {
    let level = match verbose {
        0 => return "warn".to_string(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    std::iter::once("warn".to_string())
        .chain(ENGINE_TARGETS.iter().map(|t| format!("{t}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Filter from an `OLAPCALC_LOG` value, falling back to the verbosity
pub fn filter(verbose: u8, env: Option<&str>) -> EnvFilter {
    env.and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directives(verbose)))
}

/// Install the subscriber; fails if another one is already installed
pub fn init(verbose: u8) -> Result<()> {
    let env = std::env::var(ENV_VAR).ok();
    tracing_subscriber::fmt()
        .with_env_filter(filter(verbose, env.as_deref()))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init()
        .map_err(|e| anyhow!("Failed to install logger: {e}"))
}
