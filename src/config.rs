//! Configuration loading.
//!
//! Values come from, lowest precedence first: built-in defaults, the TOML
//! config file, `STREAM_PLAYER_*` environment variables, command line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::app::queue::PlayOrder;
use crate::catalog::{CatalogConfig, DEFAULT_API_BASE};
use crate::cli::{Args, Command};
use crate::player::controller::DEFAULT_TICK_INTERVAL;

pub const ENV_TOKEN: &str = "STREAM_PLAYER_TOKEN";
pub const ENV_URL: &str = "STREAM_PLAYER_URL";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog API token.
    pub token: Option<String>,
    /// Playlist to play when `play` is run without `--url`.
    pub playlist_url: Option<String>,
    pub order: PlayOrder,
    /// Position tick period in milliseconds.
    pub tick_interval_ms: u64,
    pub api_base_url: String,
    /// Timeout for catalog JSON requests. Audio streams have none.
    pub http_timeout_secs: u64,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// `console` or `json`.
    pub format: String,
    /// Include file and line in every record.
    pub caller: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            playlist_url: None,
            order: PlayOrder::default(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            api_base_url: DEFAULT_API_BASE.to_string(),
            http_timeout_secs: 15,
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "console".to_string(),
            caller: false,
        }
    }
}

impl Config {
    /// Load the file at `path`, or the default location when `path` is
    /// `None`. A missing default file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        let raw =
            std::fs::read_to_string(&path).with_context(|| format!("read config {:?}", path))?;
        Self::from_toml_str(&raw).with_context(|| format!("parse config {:?}", path))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// `<config dir>/stream-player/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stream-player").join("config.toml"))
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in practice.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.token = Some(token);
        }
        if let Some(url) = lookup(ENV_URL).filter(|v| !v.trim().is_empty()) {
            self.playlist_url = Some(url);
        }
    }

    pub fn apply_cli(&mut self, args: &Args) {
        if let Some(token) = &args.token {
            self.token = Some(token.clone());
        }
        if let Some(level) = &args.log_level {
            self.log.level = level.clone();
        }
        if let Some(format) = &args.log_format {
            self.log.format = format.clone();
        }
        if args.log_caller {
            self.log.caller = true;
        }
        match &args.cmd {
            Command::Play { url, order, .. } => {
                if let Some(url) = url {
                    self.playlist_url = Some(url.clone());
                }
                if let Some(order) = order {
                    self.order = *order;
                }
            }
            Command::Probe { url: Some(url), .. } => self.playlist_url = Some(url.clone()),
            Command::Probe { url: None, .. } | Command::Whoami => {}
        }
    }

    pub fn catalog(&self) -> Result<CatalogConfig> {
        let token = self
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .with_context(|| {
                format!("no API token configured (set {ENV_TOKEN}, --token or `token` in the config file)")
            })?;
        Ok(CatalogConfig {
            base_url: self.api_base_url.clone(),
            token,
            timeout: Duration::from_secs(self.http_timeout_secs),
        })
    }

    pub fn playlist_url(&self) -> Result<&str> {
        self.playlist_url.as_deref().with_context(|| {
            format!("no playlist URL (pass --url, set {ENV_URL} or `playlist_url` in the config file)")
        })
    }

    /// Zero falls back to the default period.
    pub fn tick_interval(&self) -> Duration {
        match self.tick_interval_ms {
            0 => DEFAULT_TICK_INTERVAL,
            ms => Duration::from_millis(ms),
        }
    }
}
