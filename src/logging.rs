//! Logger initialization
//!
//! The engine logs through the `log` facade only. Applications that want output
//! call [`init_logging`] once, early in `main`; [`SketchApp`](crate::app::SketchApp)
//! does it for them.

use std::sync::Once;

/// Logger configuration
///
/// `env_filter` follows the `env_logger` filter syntax, e.g.
/// `"sketch_engine=debug,wgpu_core=warn"`. When it is `None` the `RUST_LOG`
/// environment variable is used, falling back to `info`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once; later calls are ignored
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
            // wgpu is very chatty at info
            builder.filter_module("wgpu_core", log::LevelFilter::Warn);
            builder.filter_module("wgpu_hal", log::LevelFilter::Warn);
            builder.filter_module("naga", log::LevelFilter::Warn);
        }

        builder.write_style(config.write_style);

        // A test harness may already have installed a logger
        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}
