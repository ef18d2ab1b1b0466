use async_trait::async_trait;
use dnsgate_domain::config::TunnelConfig;
use dnsgate_domain::{DomainError, Profile};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use super::SocketProtector;

/// Interface the gateway asks the host to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelRequest {
    pub session_name: String,
    pub interface_address: Ipv4Addr,
    pub prefix_len: u8,
    pub mtu: u16,
    /// Synthetic resolver addresses; each gets a /32 route into the tunnel.
    pub dns_servers: Vec<Ipv4Addr>,
    /// Address and prefix that capture (and drop) all IPv6 traffic.
    pub ipv6_blackhole: Option<(Ipv6Addr, u8)>,
}

impl TunnelRequest {
    /// The secondary synthetic address is only requested when the profile
    /// carries a secondary resolver.
    pub fn for_profile(tunnel: &TunnelConfig, profile: &Profile) -> Self {
        let mut dns_servers = vec![tunnel.primary_dns];
        if matches!(profile.secondary_endpoint(), Ok(Some(_))) {
            dns_servers.push(tunnel.secondary_dns);
        }

        Self {
            session_name: tunnel.session_name.clone(),
            interface_address: tunnel.interface_address,
            prefix_len: tunnel.prefix_len,
            mtu: tunnel.mtu,
            dns_servers,
            ipv6_blackhole: profile
                .ipv6_disabled
                .then_some((tunnel.ipv6_blackhole_address, tunnel.ipv6_blackhole_prefix)),
        }
    }
}

/// Raw IPv4 packet handle. Reads and writes carry exactly one packet.
#[async_trait]
pub trait TunnelDevice: Send + Sync {
    /// Returns 0 once the device is closed.
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    async fn send(&self, packet: &[u8]) -> io::Result<usize>;
}

/// Host collaborator that provisions and tears down the tunnel.
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    /// `Ok(None)` means the host refused because authorization is missing.
    async fn establish(
        &self,
        request: &TunnelRequest,
    ) -> Result<Option<Arc<dyn TunnelDevice>>, DomainError>;

    async fn release(&self);

    fn protector(&self) -> Arc<dyn SocketProtector>;
}
