//! tvlink: command-line remote for legacy TVs.
//!
//! ```text
//! tvlink KEY_VOLUP KEY_VOLUP       Send keys using tvlink.toml
//! tvlink --config <path> KEY_MUTE  Load a custom config TOML
//! tvlink --power-off               Switch the TV off
//! tvlink --gen-config              Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tvlink_cli::config::CliConfig;
use tvlink_core::RemoteLegacy;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tvlink", about = "Remote control for legacy TVs")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "tvlink.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Switch the TV off after sending the keys.
    #[arg(long)]
    power_off: bool,

    /// Keys to send in order, e.g. KEY_VOLUP.
    keys: Vec<String>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&CliConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = CliConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("tvlink v{}", env!("CARGO_PKG_VERSION"));
    info!("TV: {}:{}", config.tv.host, config.tv.port);

    let remote = RemoteLegacy::with_options(config.to_endpoint(), config.to_options());

    if !remote.open().await? {
        eprintln!("not connected: the TV at {} appears to be off", config.tv.host);
        return Ok(());
    }

    // Remember the pairing so the next run can tell "off" from "unknown".
    if !config.tv.paired && remote.config().is_paired() {
        config.tv.paired = true;
        if let Err(e) = config.save(&cli.config) {
            warn!("could not save pairing to {}: {e}", cli.config.display());
        }
    }

    for key in &cli.keys {
        if !remote.control(key).await? {
            warn!(%key, "key not acknowledged");
        }
    }

    if cli.power_off {
        remote.set_power(false).await?;
        info!("TV switched off");
    }

    remote.close().await;
    Ok(())
}
