use std::sync::Once;

use env_logger::{Builder, WriteStyle};
use log::LevelFilter;

/// GPU backend modules held at warn under the default filter.
const QUIET_MODULES: &[&str] = &["wgpu_core", "wgpu_hal", "naga"];

/// How the node's logger is set up.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directives in `env_logger` syntax, e.g. "info,selfmask_engine=debug".
    /// Wins over `RUST_LOG` when set.
    pub filter: Option<String>,
    pub write_style: WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            write_style: WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    /// Uses `filter` from the `[logging]` table, if any.
    pub fn with_filter(filter: Option<String>) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// The directives to parse given the value of `RUST_LOG`; `None` means
    /// the built-in default. Blank strings count as unset.
    fn directives(&self, rust_log: Option<String>) -> Option<String> {
        let set = |d: &String| !d.trim().is_empty();
        self.filter.clone().filter(set).or_else(|| rust_log.filter(set))
    }

    fn builder(&self, rust_log: Option<String>) -> Builder {
        let mut builder = Builder::new();
        match self.directives(rust_log) {
            Some(directives) => {
                builder.parse_filters(&directives);
            }
            None => {
                builder.filter_level(LevelFilter::Info);
                for module in QUIET_MODULES {
                    builder.filter_module(module, LevelFilter::Warn);
                }
            }
        }
        builder.write_style(self.write_style);
        builder
    }
}

static INIT: Once = Once::new();

/// Installs the global logger.
///
/// Only the first call does anything. A logger already installed by the
/// host process is left in place.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let rust_log = std::env::var("RUST_LOG").ok();
        if config.builder(rust_log).try_init().is_ok() {
            log::debug!("logger installed");
        }
    });
}
