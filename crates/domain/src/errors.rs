use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid domain name: {0}")]
    InvalidDomainName(String),

    #[error("Invalid DNS message: {0}")]
    InvalidDnsMessage(String),

    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    #[error("Invalid upstream endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Transport timeout talking to {server}")]
    TransportTimeout { server: String },

    #[error("Transport connection refused by {server}")]
    TransportConnectionRefused { server: String },

    #[error("Transport failure with {server}: {reason}")]
    TransportFailed { server: String, reason: String },

    #[error("Upstream {server} returned HTTP {status}")]
    UpstreamHttpStatus { server: String, status: u16 },

    #[error("Could not resolve {0}")]
    ResolutionFailed(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Tunnel unavailable: {0}")]
    TunnelUnavailable(String),

    #[error("Tunnel permission not granted")]
    TunnelPermissionRequired,

    #[error("Gateway is already running")]
    GatewayAlreadyRunning,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::IoError(e.to_string())
    }
}
