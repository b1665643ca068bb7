use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use colored::*;
use parley_relay::RelayService;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "parley")]
#[command(bin_name = "parley")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the first-contact relay over WebSocket.
    Relay {
        #[arg(long, env = "PARLEY_RELAY_HOST", default_value = "0.0.0.0")]
        host: String,

        #[arg(short, long, env = "PARLEY_RELAY_PORT", default_value_t = 7071)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Relay { host, port } => {
            let addr = format!("{host}:{port}");
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;

            println!("{}", "📡 Parley relay running".green().bold());
            println!("   🔌 ws://{}/", listener.local_addr()?);

            parley_relay::serve(listener, RelayService::new()).await?;
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow!(e))
}
