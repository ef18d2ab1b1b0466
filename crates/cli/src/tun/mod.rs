//! Host tunnel provider for the binary
//!
//! On Linux the tunnel is a `tun-rs` device with host routes for the
//! synthetic resolver addresses. Other platforms report the tunnel as
//! unavailable.

mod protector;

#[cfg(target_os = "linux")]
mod device;
#[cfg(target_os = "linux")]
mod linux;

pub use protector::FwmarkProtector;

#[cfg(target_os = "linux")]
pub use linux::LinuxTunProvider as HostTunProvider;

#[cfg(not(target_os = "linux"))]
pub use unsupported::UnsupportedTunProvider as HostTunProvider;

#[cfg(not(target_os = "linux"))]
mod unsupported {
    use super::FwmarkProtector;
    use async_trait::async_trait;
    use dnsgate_application::ports::{SocketProtector, TunnelDevice, TunnelProvider, TunnelRequest};
    use dnsgate_domain::DomainError;
    use std::sync::Arc;

    pub struct UnsupportedTunProvider {
        protector: Arc<FwmarkProtector>,
    }

    impl UnsupportedTunProvider {
        pub fn new(protector: FwmarkProtector) -> Self {
            Self {
                protector: Arc::new(protector),
            }
        }
    }

    #[async_trait]
    impl TunnelProvider for UnsupportedTunProvider {
        async fn establish(
            &self,
            _request: &TunnelRequest,
        ) -> Result<Option<Arc<dyn TunnelDevice>>, DomainError> {
            Err(DomainError::TunnelUnavailable(
                "TUN devices are only supported on Linux".to_string(),
            ))
        }

        async fn release(&self) {}

        fn protector(&self) -> Arc<dyn SocketProtector> {
            self.protector.clone()
        }
    }
}
