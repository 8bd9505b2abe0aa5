//! CLI entry point for Fetchmill
//!
//! Parses command line arguments, loads configuration, and starts the
//! conversion api server.

use clap::Parser;
use fetchmill::{Config, ExternalMediaOps, Orchestrator};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Fetchmill - remote media fetching and conversion service
#[derive(Parser, Debug)]
#[command(name = "fetchmill")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (config.toml)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Working directory for fetched media and converted outputs
    #[arg(short, long)]
    temp_dir: Option<PathBuf>,

    /// Address to serve the api on, e.g. 127.0.0.1:7878
    #[arg(short, long)]
    bind: Option<String>,

    /// Skip startup checks (yt-dlp, ffmpeg). For testing only.
    #[arg(long, default_value = "false")]
    skip_checks: bool,
}

fn load_config(args: &Args) -> Result<Config, fetchmill::config::ConfigError> {
    let mut config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    };

    if let Some(temp_dir) = &args.temp_dir {
        config.paths.temp_dir = temp_dir.clone();
    }
    if let Some(bind) = &args.bind {
        config.server.bind_addr = bind.clone();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Respect RUST_LOG if set, otherwise default to info for our crates
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "fetchmill=info,fetchmill_cli=info".to_string());
    tracing_subscriber::fmt().with_env_filter(&env_filter).init();

    println!("Fetchmill starting...");
    println!("Config file: {}", args.config.display());

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Temp directory: {}", config.paths.temp_dir.display());

    if args.skip_checks {
        println!("WARNING: Skipping startup checks (--skip-checks enabled)");
    } else if let Err(e) = fetchmill::run_startup_checks(&config) {
        eprintln!("Startup checks failed: {}", e);
        return ExitCode::FAILURE;
    }

    let addr: SocketAddr = match config.server.bind_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!(
                "Invalid bind address '{}': {}",
                config.server.bind_addr, e
            );
            return ExitCode::FAILURE;
        }
    };

    let media = Arc::new(ExternalMediaOps::new(&config));
    let orchestrator = Orchestrator::new(media, &config);

    println!("Starting api server on http://{}", addr);
    if let Err(e) = fetchmill::run_server(orchestrator, addr).await {
        eprintln!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
