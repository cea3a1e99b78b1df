use env_logger::{Builder, WriteStyle};
use log::LevelFilter;
use newengine_core::{EngineError, EngineResult, LogConfig, Module, ModuleCtx};

use std::io::Write;

#[derive(Debug, Clone)]
pub struct ConsoleLoggerConfig {
    pub level: LevelFilter,
    pub colors: bool,
    pub include_module: bool,
}

impl ConsoleLoggerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::from_log_config(&LogConfig::default());

        let level = std::env::var("NEWENGINE_LOG")
            .ok()
            .and_then(|v| v.parse::<LevelFilter>().ok())
            .unwrap_or(defaults.level);
        let colors = std::env::var("NEWENGINE_LOG_COLORS")
            .ok()
            .map(|v| v != "0")
            .unwrap_or(defaults.colors);
        let include_module = std::env::var("NEWENGINE_LOG_MODULE")
            .ok()
            .map(|v| v != "0")
            .unwrap_or(defaults.include_module);

        Self {
            level,
            colors,
            include_module,
        }
    }

    /// Builds the logger config from the engine config's `log` section.
    /// An unknown level name falls back to `info`.
    pub fn from_log_config(cfg: &LogConfig) -> Self {
        Self {
            level: cfg.level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info),
            colors: cfg.colors,
            include_module: cfg.include_module,
        }
    }
}

impl Default for ConsoleLoggerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Installs an `env_logger` backend for the `log` facade on `init`.
///
/// Passing `None` reads the `log` section of the engine config at init time.
pub struct ConsoleLoggerModule {
    config: Option<ConsoleLoggerConfig>,
    initialized: bool,
}

impl ConsoleLoggerModule {
    #[inline]
    pub fn new(config: ConsoleLoggerConfig) -> Self {
        Self {
            config: Some(config),
            initialized: false,
        }
    }

    #[inline]
    pub fn from_engine_config() -> Self {
        Self {
            config: None,
            initialized: false,
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl Module for ConsoleLoggerModule {
    fn id(&self) -> &'static str {
        "console-logger"
    }

    fn init(&mut self, ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        if self.initialized {
            return Ok(());
        }

        let config = self
            .config
            .clone()
            .unwrap_or_else(|| ConsoleLoggerConfig::from_log_config(&ctx.config().log));

        let mut builder = Builder::new();
        builder.filter_level(config.level);
        builder.write_style(if config.colors {
            WriteStyle::Auto
        } else {
            WriteStyle::Never
        });

        let include_module = config.include_module;
        builder.format(move |buf, record| {
            let level_style = buf.default_level_style(record.level());

            if include_module {
                writeln!(
                    buf,
                    "[{level_style}{:<5}{level_style:#}] {:<25} {}",
                    record.level(),
                    record.target(),
                    record.args()
                )
            } else {
                writeln!(
                    buf,
                    "[{level_style}{:<5}{level_style:#}] {}",
                    record.level(),
                    record.args()
                )
            }
        });

        builder
            .try_init()
            .map_err(|e| EngineError::Other(format!("logger init failed: {e}")))?;

        self.initialized = true;
        log::debug!("console logger ready (level={})", config.level);
        Ok(())
    }
}
