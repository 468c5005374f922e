//! Server settings from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use oai_harvest::config::OaiConfig;

use crate::error::{Result, ServerError};

/// Address the endpoint listens on unless `OAI_BIND_ADDR` is set.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// YAML repository configuration; defaults apply when unset.
    pub config_path: Option<PathBuf>,
    pub bind_addr: SocketAddr,
    /// Overrides the token directory of the repository configuration.
    pub token_dir: Option<PathBuf>,
    /// Overrides the index URL of the repository configuration.
    pub index_url: Option<String>,
    /// Serve documents from a JSON file instead of a search backend.
    pub index_file: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("OAI_BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.into())
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid OAI_BIND_ADDR: {e}")))?;

        Ok(Self {
            config_path: std::env::var("OAI_CONFIG").ok().map(PathBuf::from),
            bind_addr,
            token_dir: std::env::var("OAI_TOKEN_DIR").ok().map(PathBuf::from),
            index_url: std::env::var("OAI_INDEX_URL").ok(),
            index_file: None,
        })
    }

    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            config_path: None,
            bind_addr,
            token_dir: None,
            index_url: None,
            index_file: None,
        }
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = Some(dir.into());
        self
    }

    pub fn with_index_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_file = Some(path.into());
        self
    }

    /// Load the repository configuration and apply the overrides.
    pub fn load_oai_config(&self) -> Result<OaiConfig> {
        let mut config = match &self.config_path {
            Some(path) => OaiConfig::load(path)?,
            None => OaiConfig::default(),
        };

        if let Some(dir) = &self.token_dir {
            config.tokens.dir = dir.clone();
        }
        if let Some(url) = &self.index_url {
            config.index_url = Some(url.clone());
        }
        config.validate()?;
        Ok(config)
    }
}
