mod game;
mod lobby;
mod network;
mod turn;

use clap::Parser;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name announced to the session
    #[arg(short = 'n', long, default_value = "player")]
    name: String,

    /// Create a session with this name instead of joining one
    #[arg(short = 'c', long)]
    create: Option<String>,

    /// Make the created session private
    #[arg(long, default_value = "false")]
    private: bool,

    /// Join an existing session by code
    #[arg(short = 'j', long)]
    join: Option<String>,

    /// Mark ready automatically once in the lobby
    #[arg(short = 'r', long, default_value = "false")]
    ready: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let config = network::ClientConfig {
        display_name: args.name,
        create_session: args.create.map(|name| (name, args.private)),
        join_code: args.join,
        auto_ready: args.ready,
    };

    let mut client = network::Client::new(&args.server, config).await?;
    client.run().await?;

    Ok(())
}
