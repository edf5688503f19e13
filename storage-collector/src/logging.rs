// SPDX-License-Identifier: GPL-3.0-only

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingLevel;

/// Log to stderr. `RUST_LOG` takes precedence over the configured level.
pub(crate) fn init(level: LoggingLevel) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_directives(level: LoggingLevel) -> String {
    let level = level.as_directive();
    format!("warn,logical_disk_collector={level},storage_sys={level}")
}
