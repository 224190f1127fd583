use std::fs;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub channel: ChannelConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub bearer_token: SecretString,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ChannelConfig {
    pub url: String,
    pub heartbeat_secs: u64,
    pub reconnect_max_retries: u32,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub dismiss_grace_ms: u64,
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
    pub api_base_url: Option<String>,
    pub bearer_token: Option<String>,
    pub channel_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
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

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    api: Option<FileApi>,
    channel: Option<FileChannel>,
    logging: Option<FileLogging>,
}

#[derive(Debug, Default, Deserialize)]
struct FileApi {
    base_url: Option<String>,
    bearer_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileChannel {
    url: Option<String>,
    heartbeat_secs: Option<u64>,
    reconnect_max_retries: Option<u32>,
    reconnect_base_delay_ms: Option<u64>,
    reconnect_max_delay_ms: Option<u64>,
    dismiss_grace_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

const DEFAULT_CONFIG_PATH: &str = "procura.toml";

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let path = options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let file = match fs::read_to_string(&path) {
            Ok(raw) => toml::from_str::<FileConfig>(&raw)
                .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                if options.require_file {
                    return Err(ConfigError::MissingConfigFile(path));
                }
                FileConfig::default()
            }
            Err(source) => return Err(ConfigError::ReadFile { path, source }),
        };

        let env = env_overrides_from(std::env::vars())?;
        Self::assemble(file, env, options.overrides)
    }

    fn assemble(
        file: FileConfig,
        env: ConfigOverrides,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let api = file.api.unwrap_or_default();
        let channel = file.channel.unwrap_or_default();
        let logging = file.logging.unwrap_or_default();

        // Precedence: explicit overrides, then environment, then file.
        let base_url = overrides
            .api_base_url
            .or(env.api_base_url)
            .or(api.base_url)
            .unwrap_or_default();
        let bearer_token =
            overrides.bearer_token.or(env.bearer_token).or(api.bearer_token).unwrap_or_default();
        let channel_url =
            overrides.channel_url.or(env.channel_url).or(channel.url).unwrap_or_default();
        let level = overrides
            .log_level
            .or(env.log_level)
            .or(logging.level)
            .unwrap_or_else(|| "info".to_string());
        let format =
            overrides.log_format.or(env.log_format).or(logging.format).unwrap_or(LogFormat::Compact);

        let config = AppConfig {
            api: ApiConfig {
                base_url,
                bearer_token: SecretString::from(bearer_token),
                timeout_secs: api.timeout_secs.unwrap_or(30),
            },
            channel: ChannelConfig {
                url: channel_url,
                heartbeat_secs: channel.heartbeat_secs.unwrap_or(25),
                reconnect_max_retries: channel.reconnect_max_retries.unwrap_or(5),
                reconnect_base_delay_ms: channel.reconnect_base_delay_ms.unwrap_or(250),
                reconnect_max_delay_ms: channel.reconnect_max_delay_ms.unwrap_or(5_000),
                dismiss_grace_ms: channel.dismiss_grace_ms.unwrap_or(750),
            },
            logging: LoggingConfig { level, format },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.is_empty() {
            return Err(ConfigError::Validation("api.base_url must be set".to_string()));
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "api.base_url must be an http(s) URL, got `{}`",
                self.api.base_url
            )));
        }
        if self.channel.url.is_empty() {
            return Err(ConfigError::Validation("channel.url must be set".to_string()));
        }
        if self.channel.heartbeat_secs == 0 {
            return Err(ConfigError::Validation("channel.heartbeat_secs must be positive".to_string()));
        }
        if self.channel.reconnect_base_delay_ms > self.channel.reconnect_max_delay_ms {
            return Err(ConfigError::Validation(
                "channel.reconnect_base_delay_ms must not exceed reconnect_max_delay_ms"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads `PROCURA_*` overrides from an arbitrary variable iterator, so the
/// parsing stays testable without mutating process environment.
pub fn env_overrides_from<I>(vars: I) -> Result<ConfigOverrides, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut overrides = ConfigOverrides::default();
    for (key, value) in vars {
        match key.as_str() {
            "PROCURA_API_BASE_URL" => overrides.api_base_url = Some(value),
            "PROCURA_API_TOKEN" => overrides.bearer_token = Some(value),
            "PROCURA_CHANNEL_URL" => overrides.channel_url = Some(value),
            "PROCURA_LOG_LEVEL" => overrides.log_level = Some(value),
            "PROCURA_LOG_FORMAT" => {
                overrides.log_format = Some(match value.as_str() {
                    "compact" => LogFormat::Compact,
                    "pretty" => LogFormat::Pretty,
                    "json" => LogFormat::Json,
                    _ => return Err(ConfigError::InvalidEnvOverride { key, value }),
                });
            }
            _ => {}
        }
    }
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::{env_overrides_from, AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    fn overrides() -> ConfigOverrides {
        ConfigOverrides {
            api_base_url: Some("https://procurement.example".to_string()),
            bearer_token: Some("tok-1".to_string()),
            channel_url: Some("wss://procurement.example/progress".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn loads_with_defaults_when_no_file_is_present() {
        let config = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/procura.toml")),
            overrides: overrides(),
            ..Default::default()
        })
        .expect("defaults plus overrides should validate");

        assert_eq!(config.channel.heartbeat_secs, 25);
        assert_eq!(config.channel.reconnect_max_retries, 5);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn missing_required_file_fails() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/procura.toml")),
            require_file: true,
            overrides: overrides(),
        })
        .expect_err("required file is absent");

        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }

    #[test]
    fn file_values_load_and_overrides_win() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            "[api]\nbase_url = \"https://file.example\"\nbearer_token = \"file-token\"\n\n\
             [channel]\nurl = \"wss://file.example/progress\"\nheartbeat_secs = 10\n\n\
             [logging]\nlevel = \"debug\"\nformat = \"json\"\n"
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides {
                api_base_url: Some("https://override.example".to_string()),
                ..Default::default()
            },
        })
        .expect("file config should load");

        assert_eq!(config.api.base_url, "https://override.example");
        assert_eq!(config.channel.url, "wss://file.example/progress");
        assert_eq!(config.channel.heartbeat_secs, 10);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn rejects_non_http_base_url() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/procura.toml")),
            overrides: ConfigOverrides {
                api_base_url: Some("ftp://wrong.example".to_string()),
                ..overrides()
            },
            ..Default::default()
        })
        .expect_err("ftp url must be rejected");

        assert!(matches!(error, ConfigError::Validation(_)));
    }

    #[test]
    fn env_overrides_parse_known_keys_and_reject_bad_formats() {
        let parsed = env_overrides_from(vec![
            ("PROCURA_API_TOKEN".to_string(), "env-token".to_string()),
            ("PROCURA_LOG_FORMAT".to_string(), "pretty".to_string()),
            ("UNRELATED".to_string(), "ignored".to_string()),
        ])
        .expect("valid overrides");
        assert_eq!(parsed.bearer_token.as_deref(), Some("env-token"));
        assert_eq!(parsed.log_format, Some(LogFormat::Pretty));

        let error = env_overrides_from(vec![(
            "PROCURA_LOG_FORMAT".to_string(),
            "yaml".to_string(),
        )])
        .expect_err("unknown format");
        assert!(matches!(error, ConfigError::InvalidEnvOverride { .. }));
    }
}
