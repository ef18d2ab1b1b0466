pub mod bypass;
pub mod errors;
pub mod logging;
pub mod root;
pub mod tunnel;
pub mod upstream;

pub use bypass::BypassConfig;
pub use errors::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use root::{CliOverrides, Config};
pub use tunnel::TunnelConfig;
pub use upstream::UpstreamConfig;
