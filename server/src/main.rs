use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use std::path::PathBuf;
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

    /// Tick rate (simulation updates per second)
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Maximum participants in the session
    #[arg(short, long, default_value = "12")]
    max_participants: usize,

    /// Participants required before a match can start
    #[arg(short, long, default_value = "2")]
    required_participants: usize,

    /// Bot participants to add when the session is created
    #[arg(short, long, default_value = "0")]
    bots: usize,

    /// JSON file with pre-authored bot paths
    #[arg(long)]
    path_file: Option<PathBuf>,

    /// Seed for the authoritative rng (random when omitted)
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);
    let seed = args.seed.unwrap_or_else(rand::random);

    info!("Starting server on {} at {}Hz", addr, args.tick_rate);
    info!(
        "Session: {} max, {} required, {} bots, seed {}",
        args.max_participants, args.required_participants, args.bots, seed
    );

    let config = ServerConfig {
        tick_duration: Duration::from_secs_f32(1.0 / args.tick_rate.max(1) as f32),
        max_participants: args.max_participants,
        required_participants: args.required_participants,
        bot_count: args.bots,
        seed,
        path_file: args.path_file,
    };

    let mut server = Server::new(&addr, config).await?;
    server.run().await?;

    Ok(())
}
