use async_trait::async_trait;
use dnsgate_application::ports::TunnelDevice;
use std::io;

/// `tun-rs` async device behind the gateway's tunnel port.
pub struct TunDevice {
    inner: tun_rs::AsyncDevice,
    name: String,
}

impl TunDevice {
    pub fn new(inner: tun_rs::AsyncDevice, name: String) -> Self {
        Self { inner, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl TunnelDevice for TunDevice {
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.recv(buf).await
    }

    async fn send(&self, packet: &[u8]) -> io::Result<usize> {
        self.inner.send(packet).await
    }
}

impl std::fmt::Debug for TunDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunDevice").field("name", &self.name).finish()
    }
}
