mod display;
mod network;

use clap::Parser;
use log::info;
use shared::{Wire, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Line encoding: plain or json
    #[arg(short, long, default_value_t = Wire::Plain)]
    wire: Wire,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Launching Brain Client...");
    info!("Type to chat, press Enter on an empty line to buzz, ':' starts a command");

    let mut client = network::Client::connect(&args.server, args.wire).await?;
    client.run().await?;

    Ok(())
}
