use serde::Deserialize;
use std::path::Path;

/// Deployment settings shared by the supervisor and generator binaries.
///
/// Both sides must agree on `shm_prefix`, so a deployment that overrides it
/// should point every process at the same config file.
#[derive(Deserialize, Debug)]
pub struct TrichromeConfig {
    /// Prefix for the POSIX shared-memory and semaphore names.
    #[serde(default = "defaults::shm_prefix")]
    pub shm_prefix: String,
    /// tracing env-filter directive, e.g. "info" or "trichrome_ipc=debug".
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    pub fn shm_prefix() -> String {
        "/trichrome".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl Default for TrichromeConfig {
    fn default() -> Self {
        Self {
            shm_prefix: defaults::shm_prefix(),
            log_level: defaults::log_level(),
        }
    }
}

impl TrichromeConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: TrichromeConfig = toml::from_str(&raw)?;
        Ok(config)
    }
}
