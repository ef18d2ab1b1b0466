pub mod socket_protector;
pub mod tunnel;

pub use socket_protector::{NoopProtector, SocketProtector};
pub use tunnel::{TunnelDevice, TunnelProvider, TunnelRequest};
