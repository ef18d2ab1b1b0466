use std::io;

/// Exempts an outbound socket from the tunnel's own routing.
///
/// Invoked on every socket the gateway opens toward an upstream resolver
/// before its first use. Without it the gateway's own traffic would re-enter
/// the tunnel.
pub trait SocketProtector: Send + Sync {
    fn protect(&self, socket: &socket2::Socket) -> io::Result<()>;
}

/// Leaves sockets untouched. Used when the host routes upstream traffic
/// outside the tunnel on its own, and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProtector;

impl SocketProtector for NoopProtector {
    fn protect(&self, _socket: &socket2::Socket) -> io::Result<()> {
        Ok(())
    }
}
