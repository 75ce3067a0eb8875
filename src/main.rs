use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use content_router::config::{load_config, AppConfig};
use content_router::lifecycle::{build_context, signals, Shutdown};
use content_router::observability::{logging, metrics};
use content_router::HttpServer;

#[derive(Parser)]
#[command(name = "content-router")]
#[command(about = "Path-driven content router with declarative route meta", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot the engine and serve HTTP (default)
    Serve,
    /// Print the registered route table and exit
    Routes,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        bind_address = %config.listener.bind_address,
        theme = %config.theme.active,
        live = config.debug.live,
        "content-router starting"
    );

    let booted = build_context(config)?;
    let app = booted.app;

    if let Some(Commands::Routes) = cli.command {
        for route in app.table.list() {
            println!(
                "{:<40} {:<10} {:<40} {}",
                route.path(),
                route.kind.as_str(),
                route.handler.key().as_str(),
                route.site
            );
        }
        return Ok(());
    }

    if app.config.observability.metrics_enabled {
        match app.config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %app.config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    let receiver = shutdown.subscribe();
    let trigger = shutdown.clone();
    tokio::spawn(async move { signals::shutdown_on_signal(&trigger).await });

    let addr: SocketAddr = app.config.listener.bind_address.parse()?;
    let tls = app.config.listener.tls.clone();
    let server = HttpServer::new(app);

    match tls {
        Some(tls) => server.run_tls(addr, &tls, receiver).await?,
        None => {
            let listener = TcpListener::bind(addr).await?;
            server.run(listener, receiver).await?;
        }
    }

    drop(booted.watcher);
    tracing::info!("Shutdown complete");
    Ok(())
}
