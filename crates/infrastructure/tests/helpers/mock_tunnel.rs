#![allow(dead_code)]
use async_trait::async_trait;
use dnsgate_application::ports::{
    NoopProtector, SocketProtector, TunnelDevice, TunnelProvider, TunnelRequest,
};
use dnsgate_domain::DomainError;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// In-memory tunnel: frames pushed through [`TunnelHandle::inject`] are read
/// by the gateway, frames the gateway writes land in [`TunnelHandle::written`].
pub struct MockTunnelDevice {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

#[async_trait]
impl TunnelDevice for MockTunnelDevice {
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inbound.lock().await.recv().await {
            Some(frame) => {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }

    async fn send(&self, packet: &[u8]) -> io::Result<usize> {
        let _ = self.outbound.send(packet.to_vec());
        Ok(packet.len())
    }
}

/// Test side of one established tunnel. Dropping `inject` closes the device.
pub struct TunnelHandle {
    pub inject: mpsc::UnboundedSender<Vec<u8>>,
    pub written: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl TunnelHandle {
    pub fn push(&self, frame: Vec<u8>) {
        self.inject.send(frame).unwrap();
    }

    pub async fn next_written(&mut self) -> Vec<u8> {
        tokio::time::timeout(Duration::from_secs(3), self.written.recv())
            .await
            .expect("no frame written to the tunnel")
            .expect("tunnel output closed")
    }

    pub async fn nothing_written(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.written.recv()).await.is_err()
    }
}

pub struct MockTunnelProvider {
    grant: bool,
    handles: Mutex<Vec<TunnelHandle>>,
    requests: Mutex<Vec<TunnelRequest>>,
    releases: AtomicUsize,
}

impl MockTunnelProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_grant(true))
    }

    /// Behaves like a host where the user never authorized the tunnel.
    pub fn denying() -> Arc<Self> {
        Arc::new(Self::with_grant(false))
    }

    fn with_grant(grant: bool) -> Self {
        Self {
            grant,
            handles: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            releases: AtomicUsize::new(0),
        }
    }

    /// Handle of the most recently established tunnel.
    pub fn take_handle(&self) -> TunnelHandle {
        self.handles.lock().unwrap().pop().expect("no tunnel established")
    }

    pub fn last_request(&self) -> Option<TunnelRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn establish_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TunnelProvider for MockTunnelProvider {
    async fn establish(
        &self,
        request: &TunnelRequest,
    ) -> Result<Option<Arc<dyn TunnelDevice>>, DomainError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.grant {
            return Ok(None);
        }

        let (inject, inbound) = mpsc::unbounded_channel();
        let (outbound, written) = mpsc::unbounded_channel();
        self.handles
            .lock()
            .unwrap()
            .push(TunnelHandle { inject, written });

        Ok(Some(Arc::new(MockTunnelDevice {
            inbound: tokio::sync::Mutex::new(inbound),
            outbound,
        })))
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn protector(&self) -> Arc<dyn SocketProtector> {
        Arc::new(NoopProtector)
    }
}
