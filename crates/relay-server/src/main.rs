//! Messaging relay server binary.
//!
//! Start the server with:
//! ```bash
//! RELAY_GATEWAY_URL=http://127.0.0.1:3001 cargo run -p relay-server -- --restore
//! ```

mod paths;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use relay_api::{serve, ApiConfig, AppState};
use relay_bot::{BotConfig, CommandDispatcher};
use relay_persistence::FileCredentialStore;
use relay_runtime::retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use relay_runtime::{GatewayClient, RetryPolicy, RuntimeConfig, SessionManager};
use tracing_subscriber::EnvFilter;

/// Relay server - pair phone numbers and answer prefix commands on every session
#[derive(Parser, Debug)]
#[command(name = "relay-server")]
#[command(about = "Multi-tenant messaging relay with a command bot and an HTTP control API")]
struct Args {
    /// Host to bind the HTTP API to
    #[arg(long, env = "HOST", default_value = relay_api::config::DEFAULT_HOST)]
    host: String,

    /// Port to bind the HTTP API to
    #[arg(short, long, env = "PORT", default_value_t = relay_api::config::DEFAULT_PORT)]
    port: u16,

    /// Directory holding one credential folder per paired number
    #[arg(long, env = "RELAY_SESSIONS_DIR")]
    sessions_dir: Option<String>,

    /// Base URL of the protocol gateway
    #[arg(long, env = "RELAY_GATEWAY_URL", default_value = "http://127.0.0.1:3001")]
    gateway_url: String,

    /// Consecutive reconnect attempts before giving up (0 = never give up)
    #[arg(long, env = "RELAY_MAX_RETRIES", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_retries: u32,

    /// Start every paired session found in the sessions directory
    #[arg(long, env = "RELAY_RESTORE")]
    restore: bool,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Environment must be loaded before clap reads its env fallbacks
    let _ = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv());
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "relay_server=info,relay_api=info,relay_runtime=info,relay_bot=info,tower_http=warn",
        1 => "relay_server=debug,relay_api=debug,relay_runtime=debug,relay_bot=debug,tower_http=info",
        2 => "relay_server=trace,relay_api=trace,relay_runtime=trace,relay_bot=trace,tower_http=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(filter))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let sessions_dir = paths::sessions_dir(args.sessions_dir.as_deref());
    std::fs::create_dir_all(&sessions_dir)?;

    let bot_config = BotConfig::from_env();
    let max_attempts = (args.max_retries > 0).then_some(args.max_retries);
    let retry_policy = RetryPolicy::fixed(DEFAULT_RETRY_DELAY).with_max_attempts(max_attempts);
    let runtime_config = RuntimeConfig::default()
        .with_display_name(bot_config.bot_name.clone())
        .with_retry_policy(retry_policy);

    let client = GatewayClient::new(&args.gateway_url)?;
    let store = FileCredentialStore::new(&sessions_dir);
    let dispatcher = CommandDispatcher::new(bot_config);
    let prefix = dispatcher.config().prefix.clone();

    let manager = SessionManager::new(
        runtime_config,
        Arc::new(client),
        Arc::new(store),
        Arc::new(dispatcher),
    );

    if args.restore {
        match manager.restore_sessions().await {
            Ok(count) => tracing::info!(count, "Restored stored sessions"),
            Err(e) => tracing::warn!(error = %e, "Failed to restore sessions"),
        }
    }

    let api_config = ApiConfig::new(args.host, args.port);
    println!("\n[relay] Messaging relay");
    println!("   API: http://{}", api_config.bind_address());
    println!("   Gateway: {}", args.gateway_url);
    println!("   Sessions: {}", sessions_dir.display());
    println!("   Command prefix: {}", prefix);
    println!("   Press Ctrl+C to stop\n");

    let state = AppState::new(api_config, manager.clone());
    serve(state, shutdown_signal()).await?;

    tracing::info!("Closing sessions");
    // Bound how long a hung transport can hold up exit
    if tokio::time::timeout(Duration::from_secs(10), manager.shutdown())
        .await
        .is_err()
    {
        tracing::warn!("Timed out closing sessions");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
