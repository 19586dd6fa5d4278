use std::path::PathBuf;

use clap::Parser;

use super::config::DEFAULT_CONFIG_PATH;

/// Terminal companion for an Inksight scanner: live scan status, then chat
/// with the scanned document.
#[derive(Debug, Parser)]
#[command(name = "inksight", author, version, about, long_about = None)]
pub struct Cli {
    /// RON configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Status socket URL (ws:// or wss://)
    #[arg(long, env = "INKSIGHT_SOCKET_URL")]
    pub socket_url: Option<String>,

    /// Chat endpoint URL (http:// or https://)
    #[arg(long, env = "INKSIGHT_CHAT_URL")]
    pub chat_url: Option<String>,

    /// Model name forwarded to the chat backend
    #[arg(long, env = "INKSIGHT_MODEL")]
    pub model: Option<String>,

    /// Skip the status screen and start in chat
    #[arg(long)]
    pub chat: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write logs to stderr
    #[arg(long)]
    pub log_to_terminal: bool,
}
