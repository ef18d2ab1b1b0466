use serde::{Deserialize, Serialize};
use std::path::Path;

use super::bypass::BypassConfig;
use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::tunnel::{TunnelConfig, MIN_MTU};
use super::upstream::UpstreamConfig;
use crate::dns_protocol::parse_host_port;
use crate::{Profile, RewriteRule};

const LOCAL_CONFIG_PATH: &str = "dnsgate.toml";
const SYSTEM_CONFIG_PATH: &str = "/etc/dnsgate/config.toml";

/// Main configuration structure for dnsgate
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Resolver selection used at start
    #[serde(default)]
    pub profile: Profile,

    /// Tunnel interface and synthetic DNS addresses
    #[serde(default)]
    pub tunnel: TunnelConfig,

    /// Transport timeouts and bootstrap resolution
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Ordered rewrite rules; the first enabled match wins
    #[serde(default, rename = "rewrite")]
    pub rewrites: Vec<RewriteRule>,

    #[serde(default)]
    pub bypass: BypassConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. dnsgate.toml in current directory
    /// 3. /etc/dnsgate/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = match path.map(str::to_string).or_else(Self::get_config_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(primary) = overrides.primary {
            self.profile.primary = primary;
        }
        if let Some(secondary) = overrides.secondary {
            self.profile.secondary = Some(secondary);
        }
        if overrides.disable_ipv6 {
            self.profile.ipv6_disabled = true;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(mark) = overrides.fwmark {
            self.bypass.fwmark = Some(mark);
        }
        if let Some(interface) = overrides.bind_interface {
            self.bypass.interface = Some(interface);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.profile
            .primary_endpoint()
            .map_err(|e| ConfigError::Validation(format!("primary resolver: {}", e)))?;
        self.profile
            .secondary_endpoint()
            .map_err(|e| ConfigError::Validation(format!("secondary resolver: {}", e)))?;

        if self.tunnel.primary_dns == self.tunnel.secondary_dns {
            return Err(ConfigError::Validation(
                "Synthetic primary and secondary DNS addresses must differ".to_string(),
            ));
        }

        if self.tunnel.mtu < MIN_MTU {
            return Err(ConfigError::Validation(format!(
                "MTU {} is below the minimum of {}",
                self.tunnel.mtu, MIN_MTU
            )));
        }

        if self.tunnel.prefix_len > 32 || self.tunnel.ipv6_blackhole_prefix > 128 {
            return Err(ConfigError::Validation(
                "Interface prefix length out of range".to_string(),
            ));
        }

        if self.upstream.timeout_secs == 0
            || self.upstream.bootstrap_timeout_secs == 0
            || self.upstream.pending_window_secs == 0
        {
            return Err(ConfigError::Validation(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        if parse_host_port(&self.upstream.bootstrap_resolver, 53)
            .and_then(|(host, _)| host.parse::<std::net::IpAddr>().ok())
            .is_none()
        {
            return Err(ConfigError::Validation(format!(
                "Bootstrap resolver '{}' must be an IP address",
                self.upstream.bootstrap_resolver
            )));
        }

        if let Some(rule) = self.rewrites.iter().find(|r| !r.is_valid()) {
            return Err(ConfigError::Validation(format!(
                "Rewrite rule {} has an empty domain",
                rule.id
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, toml_string)
            .map_err(|e| ConfigError::FileWrite(path.to_string(), e.to_string()))?;
        Ok(())
    }

    /// Get the path to the configuration file being used
    pub fn get_config_path() -> Option<String> {
        [LOCAL_CONFIG_PATH, SYSTEM_CONFIG_PATH]
            .into_iter()
            .find(|p| Path::new(p).exists())
            .map(str::to_string)
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub disable_ipv6: bool,
    pub log_level: Option<String>,
    pub fwmark: Option<u32>,
    pub bind_interface: Option<String>,
}
