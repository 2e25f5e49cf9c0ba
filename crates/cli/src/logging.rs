//! Process-wide logger setup.

use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "offscreen_gl_core=debug"). When unset, `RUST_LOG` is used, then `info`.
#[derive(Debug)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    pub target: env_logger::Target,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            target: env_logger::Target::Stdout,
        }
    }
}

impl LoggingConfig {
    /// Config for `--json` runs, where stdout carries the report.
    pub fn for_json(env_filter: Option<String>) -> Self {
        Self {
            env_filter,
            target: env_logger::Target::Stderr,
            ..Self::default()
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once; later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }

        builder.write_style(config.write_style);
        builder.target(config.target);
        builder.init();

        log::debug!("logging initialized");
    });
}
