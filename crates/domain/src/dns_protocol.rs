use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub const PLAIN_DNS_PORT: u16 = 53;
pub const DOH_PORT: u16 = 443;
pub const DOQ_PORT: u16 = 853;

const DOH_SCHEME: &str = "https://";
const DOQ_SCHEME: &str = "quic://";

/// Wire transport used to reach an upstream resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    Plain,
    Doh,
    Doq,
}

impl TransportKind {
    /// Classification is a pure prefix test on the configured address.
    pub fn classify(address: &str) -> Self {
        if address.starts_with(DOH_SCHEME) {
            TransportKind::Doh
        } else if address.starts_with(DOQ_SCHEME) {
            TransportKind::Doq
        } else {
            TransportKind::Plain
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            TransportKind::Plain => "UDP",
            TransportKind::Doh => "HTTPS",
            TransportKind::Doq => "QUIC",
        }
    }

    /// Human readable label surfaced in the gateway status.
    pub fn label(&self) -> &'static str {
        match self {
            TransportKind::Plain => "Standard DNS",
            TransportKind::Doh => "DNS over HTTPS",
            TransportKind::Doq => "DNS over QUIC",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            TransportKind::Plain => PLAIN_DNS_PORT,
            TransportKind::Doh => DOH_PORT,
            TransportKind::Doq => DOQ_PORT,
        }
    }
}

/// A resolver descriptor. Immutable once built; the transport is derived from
/// the address string and never stored independently of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpstreamEndpoint {
    address: Arc<str>,
    transport: TransportKind,
}

impl UpstreamEndpoint {
    pub fn new(address: &str) -> Result<Self, DomainError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(DomainError::InvalidEndpoint(
                "empty upstream address".to_string(),
            ));
        }

        let endpoint = Self {
            address: address.into(),
            transport: TransportKind::classify(address),
        };
        endpoint.host_port()?;
        Ok(endpoint)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Host and port the transport connects to. The port falls back to the
    /// transport's well-known port when the address does not carry one.
    pub fn host_port(&self) -> Result<(&str, u16), DomainError> {
        let authority = match self.transport {
            TransportKind::Plain => &self.address[..],
            TransportKind::Doh => authority_of(&self.address[DOH_SCHEME.len()..]),
            TransportKind::Doq => authority_of(&self.address[DOQ_SCHEME.len()..]),
        };

        let (host, port) = parse_host_port(authority, self.transport.default_port())
            .ok_or_else(|| {
                DomainError::InvalidEndpoint(format!("Invalid address '{}'", self.address))
            })?;

        if host.is_empty() {
            return Err(DomainError::InvalidEndpoint(format!(
                "Missing host in '{}'",
                self.address
            )));
        }
        Ok((host, port))
    }
}

fn authority_of(rest: &str) -> &str {
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    &rest[..end]
}

/// Splits `host[:port]`, accepting bracketed IPv6 literals.
pub fn parse_host_port(s: &str, default_port: u16) -> Option<(&str, u16)> {
    if let Some(bracketed) = s.strip_prefix('[') {
        let end = bracketed.find(']')?;
        let host = &bracketed[..end];
        return match bracketed[end + 1..].strip_prefix(':') {
            Some(port_str) => Some((host, port_str.parse::<u16>().ok()?)),
            None if bracketed.len() == end + 1 => Some((host, default_port)),
            None => None,
        };
    }

    // Unbracketed IPv6 literal: no port can be expressed.
    if s.matches(':').count() > 1 {
        return Some((s, default_port));
    }

    match s.rsplit_once(':') {
        Some((host, port_str)) => Some((host, port_str.parse::<u16>().ok()?)),
        None => Some((s, default_port)),
    }
}

impl FromStr for UpstreamEndpoint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for UpstreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}
