//! Configuration loading for the Helios scheduling core.
//!
//! Settings come from a layered `config` build: a base file (path taken from
//! `HELIOS_CONFIG`, default `config/default`) overridden by `HELIOS_`-prefixed
//! environment variables, with `__` as the nesting separator. Secrets
//! (client secrets, encryption keys) are expected to arrive via env overrides
//! and never live in the checked-in base file.

use config::{Config, ConfigError, Environment, File};
use std::sync::Once;

pub mod models;
pub use models::*;

static DOTENV: Once = Once::new();

/// Loads `.env` into the process environment exactly once.
pub fn ensure_dotenv_loaded() {
    DOTENV.call_once(|| {
        let _ = dotenv::dotenv();
    });
}

/// Loads the application configuration.
///
/// Dependent crates call this so they do not need to know where the settings
/// come from.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();

    let base_path =
        std::env::var("HELIOS_CONFIG").unwrap_or_else(|_| "config/default".to_string());

    Config::builder()
        .add_source(File::with_name(&base_path).required(false))
        .add_source(Environment::with_prefix("HELIOS").separator("__"))
        .build()?
        .try_deserialize()
}
