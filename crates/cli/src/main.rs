use clap::Parser;
use dnsgate_application::ports::TunnelProvider;
use dnsgate_domain::{CliOverrides, DomainError};
use dnsgate_infrastructure::gateway::GatewayLoop;
use std::sync::Arc;
use tracing::{error, info};

mod bootstrap;
mod tun;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "dnsgate")]
#[command(version)]
#[command(about = "Local DNS gateway: intercepts DNS in a tunnel and forwards it over UDP, DoH or DoQ")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Primary resolver (ip[:port], host[:port], https://..., quic://...)
    #[arg(short = 'p', long)]
    primary: Option<String>,

    /// Secondary resolver
    #[arg(short = 's', long)]
    secondary: Option<String>,

    /// Capture and drop all IPv6 traffic
    #[arg(long)]
    disable_ipv6: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// SO_MARK applied to upstream sockets
    #[arg(long)]
    fwmark: Option<u32>,

    /// Interface upstream sockets are bound to
    #[arg(long, value_name = "IFACE")]
    bind_interface: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,

    /// Write the effective configuration to FILE and exit
    #[arg(long, value_name = "FILE")]
    write_config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        primary: cli.primary.clone(),
        secondary: cli.secondary.clone(),
        disable_ipv6: cli.disable_ipv6,
        log_level: cli.log_level.clone(),
        fwmark: cli.fwmark,
        bind_interface: cli.bind_interface.clone(),
    };

    let loaded = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;
    let config = loaded.config;

    if let Some(path) = cli.write_config.as_deref() {
        config.save(path)?;
        println!("Configuration written to {}", path);
        return Ok(());
    }
    if cli.check {
        println!("Configuration OK");
        return Ok(());
    }

    bootstrap::init_logging(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = loaded.path.as_deref().unwrap_or("<defaults>"),
        "Starting dnsgate"
    );

    let provider: Arc<dyn TunnelProvider> =
        Arc::new(tun::HostTunProvider::new(tun::FwmarkProtector::new(&config.bypass)));
    let gateway = GatewayLoop::new(provider, &config)?;

    if let Err(e) = gateway.start(&config.profile).await {
        if e == DomainError::TunnelPermissionRequired {
            error!("Creating the tunnel requires root or CAP_NET_ADMIN");
        }
        return Err(e.into());
    }

    let outcome = bootstrap::run_until_shutdown(&gateway, loaded.path.as_deref()).await;
    gateway.stop().await;

    info!("dnsgate shutdown complete");
    outcome
}
