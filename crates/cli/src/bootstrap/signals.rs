use dnsgate_domain::Config;
use dnsgate_infrastructure::gateway::GatewayLoop;
use tracing::{error, info, warn};

/// Serves until SIGINT/SIGTERM or a gateway fault. SIGHUP re-reads the
/// rewrite rules from `config_path`.
#[cfg(unix)]
pub async fn run_until_shutdown(
    gateway: &GatewayLoop,
    config_path: Option<&str>,
) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                return Ok(());
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, shutting down");
                return Ok(());
            }
            _ = hangup.recv() => reload_rules(gateway, config_path),
            _ = gateway.closed() => return gateway_failed(gateway),
        }
    }
}

#[cfg(not(unix))]
pub async fn run_until_shutdown(
    gateway: &GatewayLoop,
    _config_path: Option<&str>,
) -> anyhow::Result<()> {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            Ok(())
        }
        _ = gateway.closed() => gateway_failed(gateway),
    }
}

fn gateway_failed(gateway: &GatewayLoop) -> anyhow::Result<()> {
    let reason = gateway
        .status()
        .last_error
        .unwrap_or_else(|| "unknown failure".to_string());
    error!(reason = %reason, "Gateway stopped unexpectedly");
    Err(anyhow::anyhow!("gateway stopped: {}", reason))
}

#[cfg_attr(not(unix), allow(dead_code))]
fn reload_rules(gateway: &GatewayLoop, config_path: Option<&str>) {
    let Some(path) = config_path else {
        warn!("Reload requested but no configuration file is in use");
        return;
    };

    match Config::from_file(path).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => {
            info!(path, rules = config.rewrites.len(), "Reloading rewrite rules");
            gateway.reload_rules(config.rewrites);
        }
        Err(e) => warn!(path, error = %e, "Reload failed, keeping current rules"),
    }
}
