use clap::Parser;
use log::{error, info, warn};
use server::config::ServerConfig;
use server::network::Server;
use server::recorder::LogRecorder;
use server::registry::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Seconds a disconnected player has to reconnect before forfeiting
    #[arg(short, long, default_value = "30")]
    grace_secs: u64,

    /// Seconds of silence after which a connection is dropped
    #[arg(long, default_value = "15")]
    idle_timeout_secs: u64,

    /// Seconds a new session waits for both players
    #[arg(long, default_value = "120")]
    join_timeout_secs: u64,

    /// Points needed to win when the session settings do not say otherwise
    #[arg(long, default_value = "11")]
    target_score: u32,

    /// Pause before each serve, in milliseconds
    #[arg(long, default_value = "1000")]
    serve_delay_ms: u64,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            tick_rate: self.tick_rate.max(1),
            grace_period: Duration::from_secs(self.grace_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            join_timeout: Duration::from_secs(self.join_timeout_secs),
            default_target_score: self.target_score.max(1),
            serve_delay: Duration::from_millis(self.serve_delay_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();
    info!(
        "Starting session server: {} Hz, grace period {:?}",
        config.tick_rate, config.grace_period
    );

    let registry = SessionRegistry::new(config, Arc::new(LogRecorder));
    let server = Server::bind(Arc::clone(&registry)).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    registry.shutdown_all().await;
    if !registry.wait_idle(Duration::from_secs(2)).await {
        warn!("Some sessions did not finish before exit");
    }

    Ok(())
}
