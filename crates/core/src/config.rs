use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub sweep: SweepConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub base_url: String,
    pub api_token: Option<SecretString>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct SweepConfig {
    /// Drafts younger than this are never swept, so a live workflow's
    /// freshly created drafts cannot be collected out from under it.
    pub min_age_hours: i64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub store_base_url: Option<String>,
    pub store_api_token: Option<String>,
    pub log_level: Option<String>,
    pub sweep_min_age_hours: Option<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                base_url: "http://localhost:8000/api".to_string(),
                api_token: None,
                timeout_secs: 15,
                max_retries: 2,
            },
            sweep: SweepConfig { min_age_hours: 24 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    store: Option<StorePatch>,
    sweep: Option<SweepPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct StorePatch {
    base_url: Option<String>,
    api_token: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SweepPatch {
    min_age_hours: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    /// Load with precedence: explicit overrides > `SPLITFLOW_*` env >
    /// config file > defaults.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("splitflow.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(store) = patch.store {
            if let Some(base_url) = store.base_url {
                self.store.base_url = base_url;
            }
            if let Some(api_token_value) = store.api_token {
                self.store.api_token = Some(api_token_value.into());
            }
            if let Some(timeout_secs) = store.timeout_secs {
                self.store.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = store.max_retries {
                self.store.max_retries = max_retries;
            }
        }

        if let Some(sweep) = patch.sweep {
            if let Some(min_age_hours) = sweep.min_age_hours {
                self.sweep.min_age_hours = min_age_hours;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SPLITFLOW_STORE_BASE_URL") {
            self.store.base_url = value;
        }
        if let Some(value) = read_env("SPLITFLOW_STORE_API_TOKEN") {
            self.store.api_token = Some(value.into());
        }
        if let Some(value) = read_env("SPLITFLOW_STORE_TIMEOUT_SECS") {
            self.store.timeout_secs = parse_u64("SPLITFLOW_STORE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SPLITFLOW_STORE_MAX_RETRIES") {
            self.store.max_retries = parse_u32("SPLITFLOW_STORE_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("SPLITFLOW_SWEEP_MIN_AGE_HOURS") {
            self.sweep.min_age_hours = parse_i64("SPLITFLOW_SWEEP_MIN_AGE_HOURS", &value)?;
        }
        if let Some(value) = read_env("SPLITFLOW_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("SPLITFLOW_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.store_base_url {
            self.store.base_url = base_url;
        }
        if let Some(api_token_value) = overrides.store_api_token {
            self.store.api_token = Some(api_token_value.into());
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(min_age_hours) = overrides.sweep_min_age_hours {
            self.sweep.min_age_hours = min_age_hours;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.store.base_url.starts_with("http://") && !self.store.base_url.starts_with("https://")
        {
            return Err(ConfigError::Validation(format!(
                "store.base_url must be an http(s) URL, got `{}`",
                self.store.base_url
            )));
        }
        if self.store.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "store.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sweep.min_age_hours < 0 {
            return Err(ConfigError::Validation(
                "sweep.min_age_hours must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    if let Some(value) = read_env("SPLITFLOW_CONFIG") {
        let path = PathBuf::from(value);
        return path.exists().then_some(path);
    }
    let default = PathBuf::from("splitflow.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use secrecy::ExposeSecret;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::load(LoadOptions::default()).expect("defaults load");

        assert_eq!(config.store.timeout_secs, 15);
        assert_eq!(config.sweep.min_age_hours, 24);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn file_patch_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[store]\nbase_url = \"https://erp.example.com/api\"\napi_token = \"tok-123\"\n\n[logging]\nformat = \"json\"\n\n[sweep]\nmin_age_hours = 48\n"
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
        .expect("load from file");

        assert_eq!(config.store.base_url, "https://erp.example.com/api");
        assert_eq!(
            config.store.api_token.as_ref().map(|token| token.expose_secret().to_string()),
            Some("tok-123".to_string())
        );
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.sweep.min_age_hours, 48);
    }

    #[test]
    fn explicit_overrides_beat_file_values() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[store]\nbase_url = \"https://erp.example.com/api\"\n").expect("write");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides {
                store_base_url: Some("https://staging.example.com/api".to_string()),
                ..ConfigOverrides::default()
            },
        })
        .expect("load with overrides");

        assert_eq!(config.store.base_url, "https://staging.example.com/api");
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/splitflow.toml")),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
        .expect_err("must fail");

        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }

    #[test]
    fn non_http_base_url_fails_validation() {
        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                store_base_url: Some("ftp://example.com".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect_err("ftp url rejected");

        assert!(matches!(error, ConfigError::Validation(_)));
    }
}
