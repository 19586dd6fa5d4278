//! Application configuration.
//!
//! Values come from built-in defaults, then `./inksight.ron` (or `--config`),
//! then environment variables and command-line flags. Clap folds the last two
//! together, so [`AppConfig::apply_cli`] sees the winner of env vs flag.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use inksight_engine::{ChatSettings, EngineConfig, StatusSettings};
use inksight_logging::ink_info;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use super::cli::Cli;

pub const DEFAULT_CONFIG_PATH: &str = "./inksight.ron";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub socket_url: String,
    pub chat_url: String,
    pub model: Option<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: Option<u64>,
    pub max_line_bytes: usize,
    pub log_level: String,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let status = StatusSettings::default();
        let chat = ChatSettings::default();
        Self {
            socket_url: status.url,
            chat_url: chat.endpoint,
            model: None,
            connect_timeout_secs: chat.connect_timeout.as_secs(),
            request_timeout_secs: None,
            max_line_bytes: chat.max_line_bytes,
            log_level: "info".to_string(),
            log_file: PathBuf::from("./inksight.log"),
        }
    }
}

impl AppConfig {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()))
            }
        };
        ron::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Full resolution for a parsed command line.
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = Self::load(&cli.config)?;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(url) = &cli.socket_url {
            self.socket_url = url.clone();
        }
        if let Some(url) = &cli.chat_url {
            self.chat_url = url.clone();
        }
        if let Some(model) = &cli.model {
            self.model = Some(model.clone());
        }
        if cli.verbose {
            self.log_level = "debug".to_string();
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        check_url("socket_url", &self.socket_url, &["ws", "wss"])?;
        check_url("chat_url", &self.chat_url, &["http", "https"])?;
        if inksight_logging::parse_level(&self.log_level).is_none() {
            bail!("log_level {:?} is not a known level", self.log_level);
        }
        Ok(())
    }

    pub fn level_filter(&self) -> LevelFilter {
        inksight_logging::parse_level(&self.log_level).unwrap_or(LevelFilter::Info)
    }

    pub fn engine_config(&self) -> EngineConfig {
        let connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        EngineConfig {
            status: StatusSettings {
                url: self.socket_url.clone(),
                connect_timeout,
            },
            chat: ChatSettings {
                endpoint: self.chat_url.clone(),
                connect_timeout,
                request_timeout: self.request_timeout_secs.map(Duration::from_secs),
                max_line_bytes: self.max_line_bytes,
            },
        }
    }

    pub fn log_summary(&self) {
        ink_info!(
            "Config socket_url={} chat_url={} model={:?} log_level={}",
            self.socket_url,
            self.chat_url,
            self.model,
            self.log_level
        );
    }
}

fn check_url(field: &str, value: &str, schemes: &[&str]) -> anyhow::Result<()> {
    let url = url::Url::parse(value).with_context(|| format!("{field} {value:?} is not a URL"))?;
    if !schemes.contains(&url.scheme()) {
        bail!(
            "{field} must use one of {:?}, got {:?}",
            schemes,
            url.scheme()
        );
    }
    Ok(())
}
