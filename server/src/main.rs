use clap::Parser;
use log::info;
use server::game::GameConfig;
use server::network::Server;
use shared::{Wire, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_ROUND_TIMEOUT};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Default countdown length for `:time` in seconds
    #[arg(short = 't', long, default_value_t = DEFAULT_ROUND_TIMEOUT)]
    round_timeout: u64,

    /// Line encoding: plain or json
    #[arg(short, long, default_value_t = Wire::Plain)]
    wire: Wire,

    /// Echo the audit stream (broadcasts, whispers, system notices) to the log
    #[arg(long)]
    audit: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let audit = if args.audit {
        let (audit_tx, mut audit_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(line) = audit_rx.recv().await {
                info!("{}", line);
            }
        });
        Some(audit_tx)
    } else {
        None
    };

    info!("Launching Brain Server...");
    let address = format!("{}:{}", args.host, args.port);
    let config = GameConfig {
        round_timeout: args.round_timeout,
    };
    let server = Server::bind(&address, args.wire, config, audit).await?;

    server
        .run(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, shutting down gracefully...");
            }
        })
        .await?;

    Ok(())
}
