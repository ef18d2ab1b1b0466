use serde::{Deserialize, Serialize};

/// How outbound sockets escape the tunnel on hosts where the gateway owns the
/// default route. Both knobs are optional; with neither set, sockets are left
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BypassConfig {
    /// `SO_MARK` applied to every protected socket.
    #[serde(default)]
    pub fwmark: Option<u32>,

    /// `SO_BINDTODEVICE` target for every protected socket.
    #[serde(default)]
    pub interface: Option<String>,
}
