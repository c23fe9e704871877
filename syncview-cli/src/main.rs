mod app;

use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use syncview_core::prefs::prefs_path_in;
use syncview_core::{ChannelConfig, EngineConfig, RetryBackoff};
use tracing_subscriber::EnvFilter;

use app::Action;

/// syncview - live file list of a remote sync server
#[derive(Parser, Debug)]
#[command(name = "syncview")]
#[command(about = "Watch a sync server's file list and run commands against it")]
#[command(version)]
struct Args {
    /// Base URL of the server
    #[arg(short, long, default_value = "http://localhost:8800")]
    server: String,

    /// Reconnect when the stream is silent for this long
    #[arg(long, default_value_t = 30)]
    idle_timeout_secs: u64,

    /// Wait this long before reconnecting
    #[arg(long, default_value_t = 3)]
    retry_delay_secs: u64,

    /// Double the reconnect delay after each failure, up to this many seconds
    #[arg(long)]
    max_retry_delay_secs: Option<u64>,

    /// Neither load nor save view preferences
    #[arg(long)]
    no_prefs: bool,

    #[command(subcommand)]
    action: Action,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = engine_config(&args);
    app::run(config, args.action)
}

fn engine_config(args: &Args) -> EngineConfig {
    let backoff = match args.max_retry_delay_secs {
        Some(max) => RetryBackoff::Exponential {
            max_delay: Duration::from_secs(max),
        },
        None => RetryBackoff::Fixed,
    };
    let channel = ChannelConfig {
        idle_timeout: Duration::from_secs(args.idle_timeout_secs),
        retry_delay: Duration::from_secs(args.retry_delay_secs),
        backoff,
        ..ChannelConfig::default()
    };

    let prefs_path = if args.no_prefs {
        None
    } else {
        dirs::config_dir().map(|d| prefs_path_in(&d))
    };

    EngineConfig {
        server_url: args.server.clone(),
        channel,
        prefs_path,
        ..EngineConfig::default()
    }
}
