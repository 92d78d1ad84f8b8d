// config/mod.rs
// Layered configuration: built-in defaults -> config/*.toml -> RUBLEX_* env vars -> CLI flags.

use config::{Config, ConfigError, Environment, File};
use dotenv::dotenv;
use serde::Deserialize;
use structopt::StructOpt;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "database.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5555,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Loads layered configuration from `config/default.toml`, an optional
/// `config/local.toml` override, and `RUBLEX_*` environment variables.
/// CLI flags are applied on top by the caller, since they vary per binary.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    dotenv().ok();

    let builder = Config::builder()
        .set_default("database.url", "database.db")?
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 5555)?
        .set_default("logging.level", "info")?
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("RUBLEX").separator("__"));

    builder.build()?.try_deserialize()
}

/// Server CLI surface: `-p/--port`, `-l/--log`, `-t/--trace`.
#[derive(Debug, StructOpt)]
#[structopt(name = "rublex-server")]
pub struct ServerArgs {
    #[structopt(short = "p", long = "port")]
    pub port: Option<u16>,

    #[structopt(short = "l", long = "log", default_value = "server.log")]
    pub log: String,

    #[structopt(short = "t", long = "trace")]
    pub trace: bool,
}

/// Client CLI surface: `-p/--port`, `-c/--connect`.
#[derive(Debug, StructOpt)]
#[structopt(name = "rublex-client")]
pub struct ClientArgs {
    #[structopt(short = "p", long = "port", default_value = "5555")]
    pub port: u16,

    #[structopt(short = "c", long = "connect", default_value = "127.0.0.1")]
    pub connect: String,
}

impl ServerArgs {
    /// Applies CLI overrides on top of the layered file/env configuration.
    pub fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.trace {
            config.logging.level = "trace".to_string();
        }
        config
    }
}
