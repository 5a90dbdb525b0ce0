use crate::config::EngineConfig;
use crate::config::weights::WeightTable;
use crate::error::{Error, Result};
use crate::history::HistoryConfig;
use crate::rate_source::SourcesConfig;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub weights: WeightTable,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "0.0.0.0:5010".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_filter: String,
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        ObservabilityConfig {
            log_filter: "info".to_string(),
            json_logs: false,
        }
    }
}

impl AppConfig {
    /// Layers `config/default`, `config/{env}` and `AVGX__*` environment variables.
    pub fn load(env: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("AVGX").separator("__"))
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        Self::finish(config)
    }

    pub fn from_toml_str(document: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(document, FileFormat::Toml))
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self> {
        let app: AppConfig = config.try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.weights.validate()?;
        self.sources.validate()?;
        self.history.validate()?;
        Ok(())
    }
}
