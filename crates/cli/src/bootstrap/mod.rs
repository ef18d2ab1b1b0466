mod logging;
mod signals;

pub use logging::init_logging;
pub use signals::run_until_shutdown;

use dnsgate_domain::{CliOverrides, Config};

pub struct LoadedConfig {
    pub config: Config,
    /// File the configuration came from, if any. Rules are re-read from it
    /// on reload.
    pub path: Option<String>,
}

pub fn load_config(path: Option<&str>, overrides: CliOverrides) -> anyhow::Result<LoadedConfig> {
    let path = path.map(str::to_string).or_else(Config::get_config_path);
    let config = Config::load(path.as_deref(), overrides)?;
    config.validate()?;
    Ok(LoadedConfig { config, path })
}
