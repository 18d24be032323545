use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKINDEX_ENV";
const CONFIG_DIR_ENV: &str = "BOOKINDEX_CONFIG_DIR";
const ENV_PREFIX: &str = "BOOKINDEX";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    fn parse(name: &str) -> anyhow::Result<Self> {
        match name {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .with_context(|| "unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load configuration from an explicit directory and environment name.
    pub fn load_from(config_dir: &std::path::Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_environment = Environment::parse(environment)?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = parsed_environment;

        tracing::debug!(
            env = ?settings.environment,
            config_dir = %config_dir.display(),
            embedded = settings.search.embedded,
            "settings loaded"
        );

        Ok(settings)
    }
}

/// Where the search collaborator lives and how to reach it.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    /// Run an in-process node instead of connecting to `host:port`.
    #[serde(default)]
    pub embedded: bool,
    #[serde(default = "SearchSettings::default_host")]
    pub host: String,
    #[serde(default = "SearchSettings::default_port")]
    pub port: u16,
    #[serde(default = "SearchSettings::default_cluster_name")]
    pub cluster_name: String,
    #[serde(default = "SearchSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Ask the remote collaborator to make every write searchable before it answers.
    #[serde(default = "SearchSettings::default_refresh_on_write")]
    pub refresh_on_write: bool,
}

impl SearchSettings {
    fn default_host() -> String {
        "localhost".to_string()
    }

    fn default_port() -> u16 {
        9300
    }

    fn default_cluster_name() -> String {
        "test-cluster".to_string()
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }

    fn default_refresh_on_write() -> bool {
        true
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            embedded: false,
            host: Self::default_host(),
            port: Self::default_port(),
            cluster_name: Self::default_cluster_name(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            refresh_on_write: Self::default_refresh_on_write(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        9200
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bookindex-settings-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_search_targets_remote_localhost() {
        let settings = Settings::default();
        assert!(!settings.search.embedded);
        assert_eq!(settings.search.host, "localhost");
        assert_eq!(settings.search.port, 9300);
        assert_eq!(settings.search.cluster_name, "test-cluster");
    }

    #[test]
    fn missing_config_files_fall_back_to_defaults() {
        let dir = scratch_dir("empty");
        let settings = Settings::load_from(&dir, "staging").unwrap();
        assert_eq!(settings.environment, Environment::Staging);
        assert_eq!(settings.server.port, 9200);
        assert_eq!(settings.telemetry.filter, "info");
    }

    #[test]
    fn environment_file_overrides_base_file() {
        let dir = scratch_dir("layered");
        std::fs::write(
            dir.join("base.toml"),
            "[search]\nhost = \"search.internal\"\nport = 9301\n",
        )
        .unwrap();
        std::fs::write(dir.join("local.toml"), "[search]\nembedded = true\n").unwrap();

        let settings = Settings::load_from(&dir, "local").unwrap();
        assert!(settings.search.embedded);
        assert_eq!(settings.search.host, "search.internal");
        assert_eq!(settings.search.port, 9301);
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let dir = scratch_dir("unknown");
        let err = Settings::load_from(&dir, "qa").unwrap_err();
        assert!(err.to_string().contains("unsupported environment 'qa'"));
    }
}
