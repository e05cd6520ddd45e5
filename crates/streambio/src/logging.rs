// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging initialization.
//!
//! The crate logs through the `log` facade with bracketed subsystem tags
//! (`[BRIDGE]`, `[SLOT]`, `[ENDPOINT]`, `[CHAIN]`, `[PAIR]`, `[TLS]`). These
//! helpers install `env_logger` for binaries and tests that do not bring
//! their own logger.

use log::LevelFilter;

/// Install a console logger at `level`.
///
/// Returns `false` if a logger was already installed.
pub fn init(level: LevelFilter) -> bool {
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}

/// Install a console logger honouring `RUST_LOG`, falling back to `default_level`.
///
/// Returns `false` if a logger was already installed.
pub fn init_from_env(default_level: LevelFilter) -> bool {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level.to_string()),
    )
    .format_timestamp_millis()
    .try_init()
    .is_ok()
}

/// Install a console logger with an explicit filter string (e.g. `"streambio=trace"`).
///
/// Returns `false` if a logger was already installed.
pub fn init_with_filter(filter: &str) -> bool {
    env_logger::Builder::new()
        .parse_filters(filter)
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_already_installed() {
        // Another test may have installed a logger first; either way the
        // second attempt must fail.
        let _ = init(LevelFilter::Debug);
        assert!(!init(LevelFilter::Trace));
        assert!(!init_from_env(LevelFilter::Info));
        assert!(!init_with_filter("streambio=trace"));
    }
}
