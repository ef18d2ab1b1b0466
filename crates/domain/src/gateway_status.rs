use serde::Serialize;
use std::fmt;

/// Lifecycle of the gateway loop: Stopped → Starting → Running → Stopping → Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum GatewayState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl GatewayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot consumed by reporting surfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatewayStatus {
    pub state: GatewayState,
    pub provider_name: Option<String>,
    pub transport_label: Option<&'static str>,
    pub last_error: Option<String>,
}

impl GatewayStatus {
    pub fn is_running(&self) -> bool {
        self.state == GatewayState::Running
    }
}
