//! dnsgate Domain Layer
pub mod config;
pub mod dns_protocol;
pub mod dns_wire;
pub mod errors;
pub mod gateway_status;
pub mod profile;
pub mod rewrite_rule;

pub use config::{CliOverrides, Config, ConfigError};
pub use dns_protocol::{TransportKind, UpstreamEndpoint};
pub use errors::DomainError;
pub use gateway_status::{GatewayState, GatewayStatus};
pub use profile::Profile;
pub use rewrite_rule::RewriteRule;
