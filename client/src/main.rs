use clap::Parser;
use client::network::{Client, ClientConfig};
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Frame cap (updates per second)
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Send idle input instead of driving the player headlessly
    #[arg(long)]
    no_autopilot: bool,

    /// Autopilot seed
    #[arg(long, default_value = "0")]
    seed: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let config = ClientConfig {
        tick_duration: Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64),
        autopilot: !args.no_autopilot,
        seed: args.seed,
        ..ClientConfig::default()
    };

    let mut client = Client::new(&args.server, config).await?;

    tokio::select! {
        result = client.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
