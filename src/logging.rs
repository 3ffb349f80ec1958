// Logging setup. Records go to stderr so stdout stays free for the
// player's status line.

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Console,
    Json,
}

/// Level and format after validation, plus warnings for anything that had
/// to fall back. Warnings are emitted once the subscriber is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: Level,
    pub format: LogFormat,
    pub caller: bool,
    pub warnings: Vec<String>,
}

pub fn resolve(cfg: &LogConfig) -> LogSettings {
    let mut warnings = Vec::new();

    let level = match cfg.level.trim().parse::<Level>() {
        Ok(level) => level,
        Err(_) => {
            warnings.push(format!("unrecognized log level '{}', falling back to 'info'", cfg.level));
            Level::INFO
        }
    };

    let format = match cfg.format.trim().to_ascii_lowercase().as_str() {
        "console" => LogFormat::Console,
        "json" => LogFormat::Json,
        _ => {
            warnings.push(format!("unrecognized log format '{}', falling back to 'console'", cfg.format));
            LogFormat::Console
        }
    };

    LogSettings {
        level,
        format,
        caller: cfg.caller,
        warnings,
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(cfg: &LogConfig) -> Result<()> {
    let settings = resolve(cfg);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.to_string().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(settings.caller)
        .with_line_number(settings.caller);

    match settings.format {
        LogFormat::Console => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;

    for warning in &settings.warnings {
        tracing::warn!("{warning}");
    }
    Ok(())
}
