use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use procura_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run(config_path: Option<&Path>) -> String {
    let options = LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let probe = SourceProbe::detect(config_path);

    let token = if config.api.bearer_token.expose_secret().trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    };

    let fields: Vec<(&str, String, Option<&str>)> = vec![
        ("api.base_url", config.api.base_url.clone(), Some("PROCURA_API_BASE_URL")),
        ("api.bearer_token", token, Some("PROCURA_API_TOKEN")),
        ("api.timeout_secs", config.api.timeout_secs.to_string(), None),
        ("channel.url", config.channel.url.clone(), Some("PROCURA_CHANNEL_URL")),
        ("channel.heartbeat_secs", config.channel.heartbeat_secs.to_string(), None),
        (
            "channel.reconnect_max_retries",
            config.channel.reconnect_max_retries.to_string(),
            None,
        ),
        (
            "channel.reconnect_base_delay_ms",
            config.channel.reconnect_base_delay_ms.to_string(),
            None,
        ),
        (
            "channel.reconnect_max_delay_ms",
            config.channel.reconnect_max_delay_ms.to_string(),
            None,
        ),
        ("channel.dismiss_grace_ms", config.channel.dismiss_grace_ms.to_string(), None),
        ("logging.level", config.logging.level.clone(), Some("PROCURA_LOG_LEVEL")),
        ("logging.format", format!("{:?}", config.logging.format), Some("PROCURA_LOG_FORMAT")),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in fields {
        lines.push(format!("- {key} = {value} (source: {})", probe.source(key, env_key)));
    }
    lines.join("\n")
}

/// Attributes each effective value to the environment, the config file, or
/// the built-in default, mirroring the load precedence.
struct SourceProbe {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

impl SourceProbe {
    fn detect(config_path: Option<&Path>) -> Self {
        let path = config_path
            .map(Path::to_path_buf)
            .or_else(|| {
                let default = PathBuf::from("procura.toml");
                default.exists().then_some(default)
            });
        let doc = path
            .as_deref()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|raw| raw.parse::<Value>().ok());
        Self { path, doc }
    }

    fn source(&self, key_path: &str, env_key: Option<&str>) -> String {
        if let Some(env_key) = env_key {
            if env::var_os(env_key).is_some() {
                return format!("env ({env_key})");
            }
        }

        if self.doc.as_ref().is_some_and(|doc| contains_path(doc, key_path)) {
            let file = self
                .path
                .as_deref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file})");
        }

        "default".to_string()
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
