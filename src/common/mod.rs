//! Common functionality shared across sub commands.

pub mod io;

use byte_unit::Byte;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program.
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Helper to print the current memory resident set size via `tracing`.
pub fn trace_rss_now() {
    let Ok(me) = procfs::process::Process::myself() else {
        return;
    };
    let page_size = match procfs::page_size() {
        Ok(size) => size,
        Err(_) => return,
    };
    if let Ok(stat) = me.stat() {
        tracing::debug!(
            "RSS now: {}",
            Byte::from_bytes((stat.rss * page_size) as u128).get_appropriate_unit(true)
        );
    }
}

/// Version of the `macsy-worker` crate, `x.y.z` in tests for reproducible snapshots.
pub fn worker_version() -> &'static str {
    if cfg!(test) {
        "x.y.z"
    } else {
        env!("CARGO_PKG_VERSION")
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn trace_rss_now_smoke() {
        super::trace_rss_now();
    }
}
