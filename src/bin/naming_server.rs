//! The naming server binary: binds the naming service and the
//! registration service on their two well-known ports and runs until
//! interrupted (spec §6).

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use dfs::naming;
use dfs::naming::registration::RegistrationServiceImpl;
use dfs::naming::service::NamingServiceImpl;
use dfs::rpc::skeleton::Skeleton;

const DEFAULT_BIND_HOST: &str = "0.0.0.0";
const DEFAULT_SERVICE_PORT: u16 = 7070;
const DEFAULT_REGISTRATION_PORT: u16 = 7071;

#[derive(Parser, Debug)]
#[command(name = "naming-server", about = "Naming server for the distributed filesystem")]
struct Args {
    /// Address the two skeletons bind to.
    #[arg(long)]
    bind_host: Option<IpAddr>,

    /// Port for the client-facing naming service.
    #[arg(long)]
    service_port: Option<u16>,

    /// Port for the storage-server-facing registration service.
    #[arg(long)]
    registration_port: Option<u16>,

    /// Optional TOML config file; CLI flags take precedence over it.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    bind_host: Option<IpAddr>,
    service_port: Option<u16>,
    registration_port: Option<u16>,
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

    let bind_host = args
        .bind_host
        .or(file_config.bind_host)
        .unwrap_or_else(|| DEFAULT_BIND_HOST.parse().expect("valid default bind host"));
    let service_port = args.service_port.or(file_config.service_port).unwrap_or(DEFAULT_SERVICE_PORT);
    let registration_port = args
        .registration_port
        .or(file_config.registration_port)
        .unwrap_or(DEFAULT_REGISTRATION_PORT);

    let state = naming::new_shared_state();

    let naming_skeleton = Arc::new(Skeleton::new(
        Arc::new(NamingServiceImpl::new(state.clone())),
        SocketAddr::new(bind_host, service_port),
    ));
    let registration_skeleton = Arc::new(Skeleton::new(
        Arc::new(RegistrationServiceImpl::new(state)),
        SocketAddr::new(bind_host, registration_port),
    ));

    let naming_addr = naming_skeleton.start().await?;
    let registration_addr = registration_skeleton.start().await?;
    tracing::info!(%naming_addr, %registration_addr, "naming server listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    naming_skeleton.stop().await;
    registration_skeleton.stop().await;
    Ok(())
}
