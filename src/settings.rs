//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml`, then from `OPENSPLIT__SECTION__KEY` environment
//! variables. `MONGODB_URI` is still honoured for the database URI.
//!
//! See `settings.example.toml` for the available keys.
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Server {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

#[derive(Debug, Deserialize)]
pub struct MongoDb {
    pub uri: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl MongoDb {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub secret: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub mongodb: MongoDb,
    pub auth: Auth,
    #[serde(default)]
    pub log: Log,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

fn default_database() -> String {
    "OpenSplit".to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_token_ttl_secs() -> i64 {
    86_400
}

fn default_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_sources(File::with_name("settings").required(false), std::env::var("MONGODB_URI").ok())
    }

    fn from_sources<S>(file: S, mongodb_uri: Option<String>) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        Config::builder()
            // Sections without a single key set would otherwise be missing.
            .set_default("server.port", i64::from(default_port()))?
            .add_source(file)
            .add_source(Environment::with_prefix("OPENSPLIT").separator("__"))
            .set_override_option("mongodb.uri", mongodb_uri)?
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &'static str, mongodb_uri: Option<&str>) -> Result<Settings, ConfigError> {
        Settings::from_sources(
            File::from_str(toml, FileFormat::Toml),
            mongodb_uri.map(str::to_string),
        )
    }

    #[test]
    fn fills_in_defaults() {
        let settings = from_toml(
            r#"
            [mongodb]
            uri = "mongodb://localhost:27017"
            [auth]
            secret = "s3cret"
            "#,
            None,
        )
        .unwrap();

        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.cors_origin, "*");
        assert_eq!(settings.mongodb.database, "OpenSplit");
        assert_eq!(settings.mongodb.timeout(), Duration::from_secs(5));
        assert_eq!(settings.auth.token_ttl_secs, 86_400);
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn legacy_mongodb_uri_wins() {
        let settings = from_toml(
            r#"
            [mongodb]
            uri = "mongodb://from-file"
            [auth]
            secret = "s3cret"
            "#,
            Some("mongodb://from-env"),
        )
        .unwrap();
        assert_eq!(settings.mongodb.uri, "mongodb://from-env");
    }

    #[test]
    fn missing_secret_is_an_error() {
        let result = from_toml(
            r#"
            [mongodb]
            uri = "mongodb://localhost:27017"
            "#,
            None,
        );
        assert!(result.is_err());
    }
}
