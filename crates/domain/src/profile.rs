use crate::{DomainError, UpstreamEndpoint};
use serde::{Deserialize, Serialize};

/// Resolver selection handed to the gateway at start/restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default = "default_provider_name")]
    pub provider_name: String,

    #[serde(default = "default_primary")]
    pub primary: String,

    #[serde(default)]
    pub secondary: Option<String>,

    #[serde(default)]
    pub ipv6_disabled: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            provider_name: default_provider_name(),
            primary: default_primary(),
            secondary: None,
            ipv6_disabled: false,
        }
    }
}

impl Profile {
    pub fn new(provider_name: impl Into<String>, primary: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            primary: primary.into(),
            ..Self::default()
        }
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary = Some(secondary.into());
        self
    }

    pub fn primary_endpoint(&self) -> Result<UpstreamEndpoint, DomainError> {
        UpstreamEndpoint::new(&self.primary)
    }

    /// Blank secondaries are treated as absent.
    pub fn secondary_endpoint(&self) -> Result<Option<UpstreamEndpoint>, DomainError> {
        match self.secondary.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => UpstreamEndpoint::new(s).map(Some),
            _ => Ok(None),
        }
    }
}

fn default_provider_name() -> String {
    "Cloudflare".to_string()
}

fn default_primary() -> String {
    "1.1.1.1".to_string()
}
