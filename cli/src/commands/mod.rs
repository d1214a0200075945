// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the DFIR console CLI

pub mod client;
pub mod config;
pub mod flow;
pub mod hunt;
pub mod path;
pub mod vfs;

pub use self::client::ClientCommand;
pub use self::config::ConfigCommand;
pub use self::flow::FlowCommand;
pub use self::hunt::HuntCommand;
pub use self::path::PathCommand;
pub use self::vfs::VfsCommand;

use chrono::{DateTime, Utc};
use console_core::domain::api::micros_to_datetime;

/// Render a microsecond timestamp, `-` when unset.
pub(crate) fn format_micros(micros: u64) -> String {
    micros_to_datetime(micros)
        .map(|time| format_time(&time))
        .unwrap_or_else(|| "-".to_string())
}

pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_format_micros_unset() {
        assert_eq!(format_micros(0), "-");
        assert_eq!(format_micros(1_700_000_000_000_000), "2023-11-14 22:13:20 UTC");
    }
}
