use std::path::PathBuf;

use clap::Parser;

/// Rollcall: keeps one user's presence record live on a realtime channel.
#[derive(Parser, Debug)]
#[command(name = "rollcall", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// User to sign in as.
    #[arg(short, long)]
    pub user_id: String,

    /// Display name for the user. Defaults to the user id.
    #[arg(long)]
    pub display_name: Option<String>,

    /// Channel access token.
    #[arg(long, env = "ROLLCALL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Realtime endpoint override. Without one the in-memory store is used.
    #[arg(long)]
    pub url: Option<String>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
