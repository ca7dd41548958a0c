//! Console logging setup.

use std::io::Write;

use chrono::Local;
use env_logger::{Builder, Env};

/// Filter used when `RUST_LOG` is not set.
pub(crate) fn default_filter(verbose: bool, configured: Option<&str>) -> &str {
    if verbose {
        "debug"
    } else {
        configured.unwrap_or("info")
    }
}

/// Initialize the global logger. `RUST_LOG` overrides everything.
pub(crate) fn init_logging(verbose: bool, configured: Option<&str>) {
    let env = Env::default().default_filter_or(default_filter(verbose, configured));

    Builder::from_env(env)
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} {}: {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
