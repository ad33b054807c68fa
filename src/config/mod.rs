use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml::map::Entry;
use tracing::warn;

use crate::dbus::Endpoint;

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "theme_sync.toml";
/// Names an additional config file applied on top of [`CONFIG_FILE`].
pub const CONFIG_ENV: &str = "THEME_SYNC_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Well-known bus name of the settings provider.
    pub service: String,
    pub object_path: String,
    pub interface: String,
    /// Device pixel ratio reported to the presentation layer.
    pub screen_scale: f64,
    /// Tracing filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unable to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
}

static CONFIG: OnceLock<Config> = OnceLock::new();

impl Default for Config {
    fn default() -> Self {
        let endpoint = Endpoint::default();
        Self {
            service: endpoint.service,
            object_path: endpoint.path,
            interface: endpoint.interface,
            screen_scale: 1.0,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Runs `f` against the process-wide config, loading it on first use
    /// unless one was installed with [`Config::install`].
    pub fn with<R>(f: impl FnOnce(&Config) -> R) -> R {
        let config = CONFIG.get_or_init(Config::init);
        f(config)
    }

    /// Makes `self` the process-wide config. Hands it back if a config is
    /// already in place.
    pub fn install(self) -> Result<(), Config> {
        CONFIG.set(self)
    }

    fn init() -> Self {
        let (config, problems) = Self::load();
        for (path, err) in problems {
            warn!(path = %path.display(), %err, "Ignoring config file");
        }
        config
    }

    /// Applies [`CONFIG_FILE`] and then the file named by [`CONFIG_ENV`] on top
    /// of the defaults. Files that can't be parsed are skipped and returned
    /// alongside the config so the caller can report them once logging is up.
    pub fn load() -> (Self, Vec<(PathBuf, ConfigError)>) {
        let mut candidates = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            candidates.push(PathBuf::from(path));
        }
        Self::load_from_paths(candidates)
    }

    /// Merges every readable file of `paths` in order; missing files are
    /// skipped silently.
    pub fn load_from_paths<I, P>(paths: I) -> (Self, Vec<(PathBuf, ConfigError)>)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut config = Self::default();
        let mut problems = Vec::new();

        for path in paths {
            let path = path.as_ref();
            let Ok(content) = std::fs::read_to_string(path) else {
                continue;
            };
            match config.merged_with(&content) {
                Ok(merged) => config = merged,
                Err(err) => problems.push((path.to_path_buf(), err)),
            }
        }

        (config, problems)
    }

    /// Parses a complete config; missing keys take their default.
    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        Self::default().merged_with(content)
    }

    /// Returns a copy with the keys present in `overrides` replaced.
    pub fn merged_with(&self, overrides: &str) -> Result<Self, ConfigError> {
        let mut merged = toml::Value::try_from(self)?;
        let overrides = overrides.parse::<toml::Value>()?;
        merge_value(&mut merged, overrides);
        Ok(merged.try_into()?)
    }

    /// Where the settings provider is expected on the bus.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            service: self.service.clone(),
            path: self.object_path.clone(),
            interface: self.interface.clone(),
        }
    }
}

fn merge_value(base: &mut toml::Value, overrides: toml::Value) {
    match (base, overrides) {
        (toml::Value::Table(base_map), toml::Value::Table(override_map)) => {
            for (key, override_value) in override_map {
                match base_map.entry(key) {
                    Entry::Occupied(mut entry) => merge_value(entry.get_mut(), override_value),
                    Entry::Vacant(entry) => {
                        entry.insert(override_value);
                    }
                }
            }
        }
        (base_value, override_value) => {
            *base_value = override_value;
        }
    }
}
