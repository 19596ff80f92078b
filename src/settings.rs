use clap::Parser;
use std::convert::Infallible;
use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 7577;

/// Process settings. Each flag falls back to its environment variable, then
/// to the built-in default.
#[derive(Parser, Debug, Clone)]
#[command(name = "noteports", version, about = "NotePorts - local TCP port monitor")]
pub struct Settings {
    /// Listen address
    #[arg(long, env = "NOTEPORTS_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Web port
    #[arg(short, long, env = "NOTEPORTS_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Debug logging
    #[arg(
        long,
        env = "NOTEPORTS_DEBUG",
        action = clap::ArgAction::SetTrue,
        value_parser = parse_debug_flag
    )]
    pub debug: bool,

    /// Service mapping file
    #[arg(long, env = "NOTEPORTS_CONFIG", default_value = "config/config.json")]
    pub config: PathBuf,
}

/// Only `true`, `1` and `yes` turn debug logging on; any other value leaves
/// it off instead of failing startup.
fn parse_debug_flag(raw: &str) -> Result<bool, Infallible> {
    Ok(matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    ))
}
