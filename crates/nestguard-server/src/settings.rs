//! Server settings: defaults, optional file, environment overrides.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use nestguard_core::{GuardSettings, SettingsError};
use serde::{Deserialize, Serialize};

/// Environment variable naming the settings file (without extension works too).
pub const CONFIG_PATH_ENV: &str = "NESTGUARD_CONFIG";

const DEFAULT_CONFIG_NAME: &str = "nestguard";
const ENV_PREFIX: &str = "NESTGUARD";

#[derive(Debug, thiserror::Error)]
pub enum SettingsLoadError {
    #[error("failed to load settings: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Invalid(#[from] SettingsError),
}

/// Full settings of the server binary.
///
/// Guard sections (`filter`, `cache`, `lock`, `hot_keys`) sit at the top
/// level next to the server fields, so `NESTGUARD__CACHE__BASE_TTL_SECONDS`
/// and `NESTGUARD__PORT` both work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum entries of the in-process cache backend.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,

    /// JSON object of `id -> entity` loaded into the in-memory store.
    #[serde(default)]
    pub seed_path: Option<PathBuf>,

    #[serde(flatten)]
    pub guard: GuardSettings,
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_cache_capacity() -> u64 {
    100_000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cache_capacity: default_cache_capacity(),
            seed_path: None,
            guard: GuardSettings::default(),
        }
    }
}

impl ServerSettings {
    /// Loads from `$NESTGUARD_CONFIG` (or `nestguard.{toml,yaml,json}` in the
    /// working directory, if present), then `NESTGUARD__*` variables.
    pub fn load() -> Result<Self, SettingsLoadError> {
        let file = std::env::var(CONFIG_PATH_ENV).ok();
        Self::load_from(file.as_deref(), Environment::with_prefix(ENV_PREFIX))
    }

    /// Loads from an explicit file and environment source.
    pub fn load_from(
        file: Option<&str>,
        environment: Environment,
    ) -> Result<Self, SettingsLoadError> {
        let required = file.is_some();
        let file = file.unwrap_or(DEFAULT_CONFIG_NAME);

        let settings: ServerSettings = Config::builder()
            .add_source(File::with_name(file).required(required))
            .add_source(
                environment
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.guard.validate()?;
        Ok(settings)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
