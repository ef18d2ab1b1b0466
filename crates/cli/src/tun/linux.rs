use super::device::TunDevice;
use super::FwmarkProtector;
use async_trait::async_trait;
use dnsgate_application::ports::{SocketProtector, TunnelDevice, TunnelProvider, TunnelRequest};
use dnsgate_domain::DomainError;
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Linux interface names are limited to 15 bytes.
const MAX_IFNAME_LEN: usize = 15;

/// A route installed for the lifetime of one tunnel.
#[derive(Debug, Clone)]
struct HostRoute {
    family: &'static str,
    destination: String,
}

impl HostRoute {
    fn v4_host(ip: Ipv4Addr) -> Self {
        Self {
            family: "-4",
            destination: format!("{}/32", ip),
        }
    }

    fn v6_default() -> Self {
        Self {
            family: "-6",
            destination: "::/0".to_string(),
        }
    }
}

struct ActiveTunnel {
    name: String,
    routes: Vec<HostRoute>,
    _device: Arc<TunDevice>,
}

pub struct LinuxTunProvider {
    protector: Arc<FwmarkProtector>,
    active: Mutex<Option<ActiveTunnel>>,
}

impl LinuxTunProvider {
    pub fn new(protector: FwmarkProtector) -> Self {
        Self {
            protector: Arc::new(protector),
            active: Mutex::new(None),
        }
    }

    fn create_device(request: &TunnelRequest) -> Result<Option<TunDevice>, DomainError> {
        let name: String = request.session_name.chars().take(MAX_IFNAME_LEN).collect();

        let mut builder = tun_rs::DeviceBuilder::new()
            .name(&name)
            .ipv4(request.interface_address, request.prefix_len, None::<Ipv4Addr>)
            .mtu(request.mtu);
        if let Some((address, prefix)) = request.ipv6_blackhole {
            builder = builder.ipv6(address, prefix);
        }

        let device = match builder.build_async() {
            Ok(device) => device,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => return Ok(None),
            Err(e) => {
                return Err(DomainError::TunnelUnavailable(format!(
                    "failed to create {}: {}",
                    name, e
                )))
            }
        };

        let name = device.name().unwrap_or(name);
        Ok(Some(TunDevice::new(device, name)))
    }

    async fn ip_route(action: &str, route: &HostRoute, device: &str) -> io::Result<()> {
        let output = Command::new("ip")
            .args([route.family, "route", action, &route.destination, "dev", device])
            .output()
            .await?;

        if !output.status.success() {
            return Err(io::Error::other(format!(
                "ip route {} {} failed: {}",
                action,
                route.destination,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn remove_routes(name: &str, routes: &[HostRoute]) {
        for route in routes {
            if let Err(e) = Self::ip_route("del", route, name).await {
                debug!(error = %e, "Route already gone");
            }
        }
    }
}

#[async_trait]
impl TunnelProvider for LinuxTunProvider {
    async fn establish(
        &self,
        request: &TunnelRequest,
    ) -> Result<Option<Arc<dyn TunnelDevice>>, DomainError> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            Self::remove_routes(&previous.name, &previous.routes).await;
        }

        let Some(device) = Self::create_device(request)? else {
            warn!("Not permitted to create a TUN device");
            return Ok(None);
        };
        let device = Arc::new(device);
        let name = device.name().to_string();

        let mut routes: Vec<HostRoute> =
            request.dns_servers.iter().copied().map(HostRoute::v4_host).collect();
        if request.ipv6_blackhole.is_some() {
            routes.push(HostRoute::v6_default());
        }

        for (installed, route) in routes.iter().enumerate() {
            if let Err(e) = Self::ip_route("replace", route, &name).await {
                Self::remove_routes(&name, &routes[..installed]).await;
                return Err(DomainError::TunnelUnavailable(e.to_string()));
            }
        }

        info!(
            device = %name,
            address = %request.interface_address,
            mtu = request.mtu,
            resolvers = ?request.dns_servers,
            ipv6_blackhole = request.ipv6_blackhole.is_some(),
            "Tunnel established"
        );

        *active = Some(ActiveTunnel {
            name,
            routes,
            _device: Arc::clone(&device),
        });
        Ok(Some(device))
    }

    async fn release(&self) {
        if let Some(tunnel) = self.active.lock().await.take() {
            Self::remove_routes(&tunnel.name, &tunnel.routes).await;
            info!(device = %tunnel.name, "Tunnel released");
        }
    }

    fn protector(&self) -> Arc<dyn SocketProtector> {
        self.protector.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_routes() {
        let route = HostRoute::v4_host(Ipv4Addr::new(192, 0, 2, 2));
        assert_eq!(route.family, "-4");
        assert_eq!(route.destination, "192.0.2.2/32");
        assert_eq!(HostRoute::v6_default().destination, "::/0");
    }
}
