//! CLI flag definitions using clap.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// provider-matrix - reconcile Matrix users, rooms, spaces, power levels
/// and aliases
#[derive(Parser, Debug, Clone)]
#[command(name = "provider-matrix")]
#[command(version)]
#[command(
    about = "Reconciles declarative Matrix resources against a homeserver"
)]
#[command(long_about = "Loads User, Room, Space, PowerLevel, RoomAlias and ProviderConfig \
                        manifests from a directory and keeps the homeserver in line with them.")]
pub struct Cli {
    /// Run with debug logging
    #[arg(short, long, env = "DEBUG", default_value_t = false)]
    pub debug: bool,

    /// Directory holding the manifests
    #[arg(short, long, env = "MANIFESTS_DIR", default_value = "manifests")]
    pub manifests: PathBuf,

    /// File recording external names and status across restarts
    /// [default: <manifests>.state.yaml beside the manifest directory]
    #[arg(long, env = "STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// How often to check every object for drift
    #[arg(long, env = "POLL_INTERVAL", default_value = "1m", value_parser = parse_duration)]
    pub poll: Duration,

    /// How often to reload manifests and provider configs
    #[arg(long, env = "SYNC_INTERVAL", default_value = "1h", value_parser = parse_duration)]
    pub sync: Duration,

    /// Maximum reconciles per second
    #[arg(
        long,
        env = "MAX_RECONCILE_RATE",
        default_value_t = 100,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_reconcile_rate: u32,

    /// Address the health probes listen on
    #[arg(long, env = "PROBE_ADDR", default_value = "0.0.0.0:8081")]
    pub probe_addr: SocketAddr,
}

/// Parse `90`, `30s`, `5m` or `1h`.
///
/// # Errors
///
/// Returns a message if the value is not a whole number with an optional
/// `s`, `m` or `h` suffix, or is zero.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let (number, unit) = value
        .find(|c: char| !c.is_ascii_digit())
        .map_or((value, "s"), |at| value.split_at(at));

    let amount: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration '{value}'"))?;
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        other => return Err(format!("unknown duration unit '{other}' in '{value}'")),
    };

    match amount.checked_mul(multiplier) {
        Some(0) => Err(format!("duration '{value}' must be positive")),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Err(format!("duration '{value}' is too large")),
    }
}
