//! Engine construction from configuration.
//!
//! Everything here blocks (file reads, HTTP client setup), so callers on an
//! async runtime go through `spawn_blocking`.

use std::sync::Arc;

use oai_harvest::config::OaiConfig;
use oai_harvest::index::{MemoryIndex, QueryFacade, SolrIndex};
use oai_harvest::token::TokenStore;
use oai_harvest::HarvestEngine;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Open the token store named by the configuration.
pub fn open_token_store(config: &OaiConfig) -> Result<Arc<TokenStore>> {
    let store = TokenStore::open(&config.tokens.dir, config.token_lifetime())?;
    Ok(Arc::new(store))
}

/// Open the document index: the `--index-file` if given, else the backend
/// at `index_url`.
pub fn open_index(server: &ServerConfig, config: &OaiConfig) -> Result<Arc<dyn QueryFacade>> {
    if let Some(path) = &server.index_file {
        let index = MemoryIndex::from_json_file(path)?;
        tracing::info!(path = %path.display(), documents = index.len(), "loaded index file");
        return Ok(Arc::new(index));
    }

    match &config.index_url {
        Some(url) => {
            tracing::info!(url = %url, "using search index");
            Ok(Arc::new(SolrIndex::new(url)?))
        }
        None => Err(ServerError::Config(
            "no index configured: set index_url, OAI_INDEX_URL or --index-file".into(),
        )),
    }
}

/// Build the engine for a server.
pub fn build_engine(server: &ServerConfig, config: OaiConfig) -> Result<HarvestEngine> {
    let index = open_index(server, &config)?;
    let tokens = open_token_store(&config)?;

    tracing::info!(
        repository = %config.repository_name,
        token_dir = %config.tokens.dir.display(),
        "configured OAI-PMH repository"
    );
    Ok(HarvestEngine::new(config, index, tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_index_file_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        fs::write(&path, r#"[{"PI": "A", "DATEUPDATED": "1"}]"#).unwrap();

        let server = ServerConfig::new(crate::config::DEFAULT_BIND_ADDR.parse().unwrap())
            .with_index_file(&path);
        let mut config = OaiConfig::default();
        config.tokens.dir = dir.path().join("tokens");

        let engine = build_engine(&server, config).unwrap();
        assert_eq!(engine.identify().earliest_datestamp, "1970-01-01T00:00:00Z");
        assert!(dir.path().join("tokens").is_dir());
    }

    #[test]
    fn test_missing_index() {
        let server = ServerConfig::new(crate::config::DEFAULT_BIND_ADDR.parse().unwrap());
        assert!(matches!(
            open_index(&server, &OaiConfig::default()),
            Err(ServerError::Config(_))
        ));
    }
}
