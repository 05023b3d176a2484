use std::path::PathBuf;

use clap::Parser;

/// Warden: a tool-calling chat assistant, driven from the console.
#[derive(Parser, Debug)]
#[command(name = "warden", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// User id to chat as.
    #[arg(short, long, default_value = "console")]
    pub user: String,

    /// Use the voice session profile instead of text.
    #[arg(long)]
    pub voice: bool,

    /// Log filter directive override (e.g. "debug" or "warden_ai=trace").
    #[arg(long)]
    pub log_level: Option<String>,

    /// Directory to copy delivered attachments into.
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Community rule returned by the `get_rules` tool. Repeatable.
    #[arg(long = "rule")]
    pub rules: Vec<String>,

    /// Drop sessions idle for longer than this many seconds.
    #[arg(long, default_value_t = 1800)]
    pub session_ttl: u64,
}

pub fn parse() -> Args {
    Args::parse()
}
