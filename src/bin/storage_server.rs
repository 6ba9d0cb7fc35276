//! The storage server binary: serves a local root directory over the data
//! and command interfaces, registers with a naming server at startup, and
//! runs until interrupted (spec §4.E/§6).

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use dfs::storage::service::StorageServer;

const DEFAULT_BIND_HOST: &str = "0.0.0.0";
const DEFAULT_HOSTNAME: &str = "127.0.0.1";

#[derive(Parser, Debug)]
#[command(name = "storage-server", about = "Storage server for the distributed filesystem")]
struct Args {
    /// Local directory this server serves files from.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Address of the naming server's registration service.
    #[arg(long)]
    naming_addr: Option<SocketAddr>,

    /// Externally visible hostname used when building the stubs this
    /// server sends to the naming server.
    #[arg(long)]
    hostname: Option<String>,

    /// Address the two skeletons bind to.
    #[arg(long)]
    bind_host: Option<IpAddr>,

    /// Port for the client-facing data interface. Defaults to an
    /// OS-chosen ephemeral port.
    #[arg(long)]
    data_port: Option<u16>,

    /// Port for the naming-facing command interface. Defaults to an
    /// OS-chosen ephemeral port.
    #[arg(long)]
    command_port: Option<u16>,

    /// Optional TOML config file; CLI flags take precedence over it.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    root: Option<PathBuf>,
    naming_addr: Option<SocketAddr>,
    hostname: Option<String>,
    bind_host: Option<IpAddr>,
    data_port: Option<u16>,
    command_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let file_config = match &args.config {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        }
        None => FileConfig::default(),
    };

    let root = args
        .root
        .or(file_config.root)
        .ok_or("--root (or config's `root`) is required")?;
    let naming_addr = args
        .naming_addr
        .or(file_config.naming_addr)
        .ok_or("--naming-addr (or config's `naming_addr`) is required")?;
    let hostname = args
        .hostname
        .or(file_config.hostname)
        .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string());
    let bind_host: IpAddr = args
        .bind_host
        .or(file_config.bind_host)
        .unwrap_or_else(|| DEFAULT_BIND_HOST.parse().expect("valid default bind host"));
    let data_port = args.data_port.or(file_config.data_port).unwrap_or(0);
    let command_port = args.command_port.or(file_config.command_port).unwrap_or(0);

    let server = StorageServer::new(
        root,
        SocketAddr::new(bind_host, data_port),
        SocketAddr::new(bind_host, command_port),
    );

    let (data_addr, command_addr) = server.start(&hostname, naming_addr).await?;
    tracing::info!(%data_addr, %command_addr, %naming_addr, "storage server registered and listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    server.stop().await;
    Ok(())
}
