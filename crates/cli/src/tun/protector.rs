use dnsgate_application::ports::SocketProtector;
use dnsgate_domain::config::BypassConfig;
use std::io;
use tracing::debug;

/// Keeps upstream sockets out of the tunnel with policy routing: an
/// `SO_MARK` the host's rules route around the tunnel, and/or
/// `SO_BINDTODEVICE` to the physical uplink.
#[derive(Debug, Clone, Default)]
pub struct FwmarkProtector {
    fwmark: Option<u32>,
    interface: Option<String>,
}

impl FwmarkProtector {
    pub fn new(config: &BypassConfig) -> Self {
        Self {
            fwmark: config.fwmark,
            interface: config.interface.clone(),
        }
    }
}

#[cfg(target_os = "linux")]
impl SocketProtector for FwmarkProtector {
    fn protect(&self, socket: &socket2::Socket) -> io::Result<()> {
        if let Some(mark) = self.fwmark {
            socket.set_mark(mark)?;
            debug!(mark, "Set routing mark");
        }
        if let Some(interface) = self.interface.as_deref() {
            socket.bind_device(Some(interface.as_bytes()))?;
            debug!(interface, "Bound socket to interface");
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl SocketProtector for FwmarkProtector {
    fn protect(&self, _socket: &socket2::Socket) -> io::Result<()> {
        if self.fwmark.is_some() || self.interface.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "SO_MARK and SO_BINDTODEVICE are Linux only",
            ));
        }
        debug!("No bypass configured");
        Ok(())
    }
}
