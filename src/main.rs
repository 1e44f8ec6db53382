//! SoundNav - browse the SoundCloud catalog by path
//!
//! Resolves a navigation path such as `/explore/trending/music/` into a list
//! of items and prints it as JSON, for a media-center host to render.

mod cache;
mod catalog;
mod config;
mod error;
mod item;
mod provider;
mod routing;

use anyhow::{anyhow, Result};
use std::env;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use cache::FunctionCache;
use catalog::SoundCloudClient;
use config::Settings;
use error::NavError;
use provider::Provider;
use routing::{split_uri, Params};

/// CLI command
#[derive(Debug)]
enum Command {
    /// Resolve a path and print the resulting items (default)
    Navigate { path: String, params: Params },
    /// Delete expired cache entries
    Purge,
    /// Show help
    Help,
}

fn print_help() {
    eprintln!(
        r#"SoundNav - Browse the SoundCloud catalog by navigation path

USAGE:
    soundnav [nav] <path> [key=value ...]
    soundnav purge
    soundnav help

COMMANDS:
    nav     Resolve a path and print its items as JSON (default)
    purge   Delete expired entries from the remote call cache
    help    Show this help message

EXAMPLES:
    # Top-level menu
    soundnav /

    # Second page of trending music
    soundnav /explore/trending/music/ page=2

    # Search, query given inline
    soundnav '/search/query/?q=deep%20house'

    # Resolve a track's playback location
    soundnav /play/ id=123456

ENVIRONMENT:
    SOUNDNAV_CLIENT_ID       Application client id
    SOUNDNAV_ACCESS_TOKEN    Access token of a signed-in user
    SOUNDNAV_API_URL         Public API base URL
    SOUNDNAV_MOBILE_API_URL  Mobile API base URL
    SOUNDNAV_CACHE_DIR       Remote call cache directory
    SOUNDNAV_FANART          Background image attached to every item
    SOUNDNAV_UNKNOWN_KINDS   skip or fail on unknown record kinds
    RUST_LOG                 Log level (trace, debug, info, warn, error)
"#
    );
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().skip(1).collect();

    let rest = match args.first().map(String::as_str) {
        None => return Ok(Command::Navigate { path: "/".to_string(), params: Params::new() }),
        Some("purge") => return Ok(Command::Purge),
        Some("help" | "--help" | "-h") => return Ok(Command::Help),
        Some("nav") => &args[1..],
        Some(_) => &args[..],
    };

    let Some((uri, pairs)) = rest.split_first() else {
        return Err(anyhow!("Usage: soundnav nav <path> [key=value ...]"));
    };

    let (path, mut params) = split_uri(uri);
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected key=value, got '{}'", pair))?;
        params.insert(key.to_string(), value.to_string());
    }

    Ok(Command::Navigate { path, params })
}

/// Exit code for a failed navigation: 2 for a bad request, 1 otherwise
fn exit_code(err: &NavError) -> i32 {
    if err.is_request_error() {
        2
    } else {
        1
    }
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON result
    let log_level = env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let command = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(2);
        }
    };

    match command {
        Command::Navigate { path, params } => {
            let settings = Settings::load()?;
            info!(path = %path, signed_in = settings.is_signed_in(), "Resolving navigation request");

            // The client blocks on this runtime from the calling thread
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            let client = SoundCloudClient::new(&settings, runtime.handle().clone())?;
            let cache = FunctionCache::open(&settings.cache_dir)?;
            let provider = Provider::new(
                client,
                cache,
                settings.unknown_kinds,
                settings.fanart.clone(),
            )?;

            let outcome = provider.navigate(&path, &params);
            provider.close()?;

            match outcome {
                Ok(nav) => {
                    println!("{}", serde_json::to_string_pretty(&nav.into_items())?);
                }
                Err(e) => {
                    error!(path = %path, error = %e, "Navigation failed");
                    eprintln!("Error: {}", e);
                    std::process::exit(exit_code(&e));
                }
            }
        }
        Command::Purge => {
            let settings = Settings::load()?;
            let cache = FunctionCache::open(&settings.cache_dir)?;
            let removed = cache.purge_expired()?;
            println!("Removed {} expired cache entries.", removed);
            cache.close()?;
        }
        Command::Help => {
            print_help();
        }
    }

    Ok(())
}
