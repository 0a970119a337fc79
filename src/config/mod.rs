// Configuration management module
// TOML settings file, env file and `ZOHO_*` environment overrides

pub mod env_file;
pub mod interactive;
pub mod settings;


pub use env_file::EnvSource;
pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError, Environment, ServerConfig, ZohoConfig};

/// Resolve the configuration directory, falling back to the platform default
#[inline]
pub fn resolve_config_dir(
    override_dir: Option<std::path::PathBuf>,
) -> Result<std::path::PathBuf, ConfigError> {
    match override_dir {
        Some(dir) => Ok(dir),
        None => Config::default_config_dir(),
    }
}
