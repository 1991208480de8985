use anyhow::Result;
use axum::Router;
use clap::Parser;
use materials_server::{build_app, ServerConfig};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Catalog directory path
    #[arg(long, default_value = "./catalog")]
    catalog: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let app: Router = build_app(args.catalog.clone(), ServerConfig::from_env())?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, catalog = %args.catalog, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
