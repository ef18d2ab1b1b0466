use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Per-query timeout for every transport.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Plain resolver used to look up upstream hostnames outside the tunnel.
    #[serde(default = "default_bootstrap_resolver")]
    pub bootstrap_resolver: String,

    #[serde(default = "default_bootstrap_timeout_secs")]
    pub bootstrap_timeout_secs: u64,

    /// Age after which an unanswered query is dropped from the pending table.
    #[serde(default = "default_pending_window_secs")]
    pub pending_window_secs: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_secs)
    }

    pub fn pending_window(&self) -> Duration {
        Duration::from_secs(self.pending_window_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            bootstrap_resolver: default_bootstrap_resolver(),
            bootstrap_timeout_secs: default_bootstrap_timeout_secs(),
            pending_window_secs: default_pending_window_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_bootstrap_resolver() -> String {
    "8.8.8.8:53".to_string()
}

fn default_bootstrap_timeout_secs() -> u64 {
    3
}

fn default_pending_window_secs() -> u64 {
    10
}
