//! barbershop CLI: run the queue daemon or talk to one.

use barbershop::client::Client;
use barbershop::config::{Config, DEFAULT_PORT};
use barbershop::engine::Engine;
use barbershop::model::ItemId;
use barbershop::server::{self, Server};
use barbershop::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "barbershop", about = "Coalescing priority work-queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the queue daemon
    Serve {
        /// TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Listen address (overrides config and BARBERSHOP_BIND)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Add a score delta to an item
    Update {
        id: i64,
        #[arg(allow_hyphen_values = true)]
        delta: i64,
        #[command(flatten)]
        target: Target,
    },
    /// Dequeue the highest-scoring item
    Next {
        #[command(flatten)]
        target: Target,
    },
    /// Show server counters
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        target: Target,
    },
}

#[derive(clap::Args)]
struct Target {
    /// Server address
    #[arg(long, default_value_t = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, bind } => cmd_serve(config, bind).await,
        Command::Update { id, delta, target } => {
            let mut client = Client::connect(target.addr).await?;
            client.update(ItemId(id), delta).await?;
            println!("OK");
            Ok(())
        }
        Command::Next { target } => {
            let mut client = Client::connect(target.addr).await?;
            match client.next().await? {
                Some(id) => println!("{id}"),
                None => println!("queue empty"),
            }
            Ok(())
        }
        Command::Stats { json, target } => {
            let mut client = Client::connect(target.addr).await?;
            let stats = client.stats().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                for (name, value) in stats.entries() {
                    println!("{name:<10}  {value}");
                }
            }
            Ok(())
        }
    }
}

async fn cmd_serve(config_path: Option<PathBuf>, bind: Option<SocketAddr>) -> anyhow::Result<()> {
    let mut config = Config::load(config_path.as_deref())?;
    if let Some(bind) = bind {
        config.bind = bind;
    }

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "barbershop".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let server = Server::bind(&config, server::shared(Engine::new())).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        shutdown.shutdown();
    });

    server.run().await?;
    Ok(())
}
