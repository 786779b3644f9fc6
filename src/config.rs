//! Persistent application configuration model and defaults.

use std::time::Duration;

/// Root configuration persisted to `songdeck.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Engine command behavior.
    pub engine: EngineConfig,
    #[serde(default)]
    /// Song list presentation preferences.
    pub ui: UiConfig,
    #[serde(default)]
    /// Log output preferences.
    pub logging: LoggingConfig,
}

/// Engine command behavior.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct EngineConfig {
    /// Upper bound for a single engine command. `0` waits indefinitely.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

impl EngineConfig {
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_ms > 0).then(|| Duration::from_millis(self.command_timeout_ms))
    }
}

/// Song list presentation preferences.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct UiConfig {
    #[serde(default = "default_true")]
    pub show_artist: bool,
    #[serde(default = "default_true")]
    pub show_album: bool,
    /// Capacity of the user notice bus.
    #[serde(default = "default_notice_capacity")]
    pub notice_capacity: usize,
}

/// Log output preferences.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_artist: true,
            show_album: true,
            notice_capacity: default_notice_capacity(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_command_timeout_ms() -> u64 {
    10_000
}

fn default_notice_capacity() -> usize {
    64
}

/// Clamps values loaded from disk into workable ranges.
pub fn sanitize_config(config: Config) -> Config {
    let command_timeout_ms = match config.engine.command_timeout_ms {
        0 => 0,
        value => value.clamp(100, 120_000),
    };
    Config {
        engine: EngineConfig { command_timeout_ms },
        ui: UiConfig {
            notice_capacity: config.ui.notice_capacity.clamp(1, 4096),
            ..config.ui
        },
        logging: config.logging,
    }
}
