use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};

pub const MIN_MTU: u16 = 576;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TunnelConfig {
    #[serde(default = "default_session_name")]
    pub session_name: String,

    #[serde(default = "default_interface_address")]
    pub interface_address: Ipv4Addr,

    #[serde(default = "default_prefix_len")]
    pub prefix_len: u8,

    #[serde(default = "default_mtu")]
    pub mtu: u16,

    /// Synthetic resolver address handed to the OS as primary DNS.
    #[serde(default = "default_primary_dns")]
    pub primary_dns: Ipv4Addr,

    #[serde(default = "default_secondary_dns")]
    pub secondary_dns: Ipv4Addr,

    #[serde(default = "default_ipv6_blackhole_address")]
    pub ipv6_blackhole_address: Ipv6Addr,

    #[serde(default = "default_ipv6_blackhole_prefix")]
    pub ipv6_blackhole_prefix: u8,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            session_name: default_session_name(),
            interface_address: default_interface_address(),
            prefix_len: default_prefix_len(),
            mtu: default_mtu(),
            primary_dns: default_primary_dns(),
            secondary_dns: default_secondary_dns(),
            ipv6_blackhole_address: default_ipv6_blackhole_address(),
            ipv6_blackhole_prefix: default_ipv6_blackhole_prefix(),
        }
    }
}

fn default_session_name() -> String {
    "dnsgate".to_string()
}

fn default_interface_address() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 50, 1)
}

fn default_prefix_len() -> u8 {
    24
}

fn default_mtu() -> u16 {
    1500
}

fn default_primary_dns() -> Ipv4Addr {
    Ipv4Addr::new(192, 0, 2, 2)
}

fn default_secondary_dns() -> Ipv4Addr {
    Ipv4Addr::new(192, 0, 2, 3)
}

fn default_ipv6_blackhole_address() -> Ipv6Addr {
    Ipv6Addr::new(0xfdfe, 0xdcba, 0x9876, 0, 0, 0, 0, 1)
}

fn default_ipv6_blackhole_prefix() -> u8 {
    126
}
