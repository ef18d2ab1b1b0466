pub mod ipv4_udp;

pub use ipv4_udp::{UdpDatagram, DNS_PORT};
