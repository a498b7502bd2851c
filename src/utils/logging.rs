//! Logging setup
//!
//! One `tracing` subscriber for both the service and the CLI tools. The
//! level applies to this crate; the MongoDB driver and hyper are capped at
//! `warn` unless verbose logging is requested.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Dependencies that log connection chatter at `info`/`debug`
const NOISY_TARGETS: [&str; 2] = ["mongodb", "hyper"];

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    /// Let dependencies log at `level` too
    pub include_dependencies: bool,
    pub include_target: bool,
    pub include_thread_ids: bool,
    pub ansi_colors: bool,
}

impl LogConfig {
    /// Info level; colors only when writing to a terminal
    pub fn for_output(is_terminal: bool) -> Self {
        Self {
            level: Level::INFO,
            include_dependencies: false,
            include_target: false,
            include_thread_ids: false,
            ansi_colors: is_terminal,
        }
    }

    /// Debug level with targets, thread ids and dependency logs
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            include_dependencies: true,
            include_target: true,
            include_thread_ids: true,
            ansi_colors: true,
        }
    }

    /// Override the level from a string such as the `LOG_LEVEL` env var.
    /// Unknown names leave the level unchanged.
    pub fn with_level(mut self, level: &str) -> Self {
        if let Ok(level) = Level::from_str(level.trim()) {
            self.level = level;
        }
        self
    }

    /// Filter directives, e.g. `info,mongodb=warn,hyper=warn`
    pub fn directives(&self) -> String {
        let mut directives = self.level.to_string().to_lowercase();
        if !self.include_dependencies {
            for target in NOISY_TARGETS {
                directives.push_str(&format!(",{}=warn", target));
            }
        }
        directives
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::for_output(true)
    }
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(config.directives()))
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_override() {
        let config = LogConfig::default().with_level("WARN");
        assert_eq!(config.level, Level::WARN);

        let config = LogConfig::default().with_level("loud");
        assert_eq!(config.level, Level::INFO);
    }

    #[test]
    fn test_colors_follow_terminal() {
        assert!(LogConfig::for_output(true).ansi_colors);
        assert!(!LogConfig::for_output(false).ansi_colors);
    }

    #[test]
    fn test_directives_quiet_dependencies() {
        assert_eq!(LogConfig::default().directives(), "info,mongodb=warn,hyper=warn");
        assert_eq!(LogConfig::verbose().directives(), "debug");
        assert_eq!(
            LogConfig::for_output(false).with_level("error").directives(),
            "error,mongodb=warn,hyper=warn"
        );
    }
}
