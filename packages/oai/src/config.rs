//! Repository configuration.
//!
//! Loaded from a YAML document; every field has a default so an empty file
//! is a valid (if anonymous) configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use url::Url;

use crate::error::ConfigError;
use crate::request::MetadataPrefix;
use crate::sets::StaticSet;

/// OAI-PMH protocol version served.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Datestamp granularity advertised by `Identify`.
pub const GRANULARITY: &str = "YYYY-MM-DDThh:mm:ssZ";

/// Default number of records per list page.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Default resumption token lifetime (3 days).
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3 * 24 * 60 * 60;

/// Default interval between token sweeps (1 hour).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;

/// How the repository reports deleted records.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeletedRecordPolicy {
    No,
    Transient,
    #[default]
    Persistent,
}

/// Per-format settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatSettings {
    pub enabled: bool,
    /// Overrides `default_page_size` for this format.
    pub page_size: Option<u64>,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            page_size: None,
        }
    }
}

/// Resumption token storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    pub dir: PathBuf,
    pub lifetime_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("tokens"),
            lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

/// Set hierarchy settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetSettings {
    pub static_sets: Vec<StaticSet>,
    /// Index fields whose distinct values become sets.
    pub value_fields: Vec<String>,
}

/// The repository configuration.
///
/// # Examples
/// ```
/// use oai_harvest::config::OaiConfig;
/// use oai_harvest::request::MetadataPrefix;
///
/// let config = OaiConfig::from_yaml_str(
///     "repository_name: Example\nformats:\n  tei:\n    page_size: 5\n  lido:\n    enabled: false\n",
/// )
/// .unwrap();
/// assert_eq!(config.page_size(MetadataPrefix::Tei), 5);
/// assert_eq!(config.page_size(MetadataPrefix::OaiDc), 100);
/// assert!(!config.is_enabled(MetadataPrefix::Lido));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OaiConfig {
    pub repository_name: String,
    pub base_url: String,
    pub admin_email: String,
    /// Prepended to persistent identifiers, e.g. `oai:example.org:`.
    pub identifier_prefix: String,
    pub deleted_record: DeletedRecordPolicy,
    /// Landing page template with an `{id}` placeholder.
    pub record_url: Option<String>,
    /// Root directory of stored METS, LIDO, TEI and CMDI documents.
    pub data_dir: PathBuf,
    /// Solr core URL of the search index.
    pub index_url: Option<String>,
    pub default_page_size: u64,
    pub tokens: TokenSettings,
    /// Formats not listed here use [`FormatSettings::default`].
    pub formats: BTreeMap<MetadataPrefix, FormatSettings>,
    pub sets: SetSettings,
}

impl Default for OaiConfig {
    fn default() -> Self {
        Self {
            repository_name: "OAI-PMH repository".to_string(),
            base_url: "http://localhost:8080/oai".to_string(),
            admin_email: "admin@localhost".to_string(),
            identifier_prefix: String::new(),
            deleted_record: DeletedRecordPolicy::default(),
            record_url: None,
            data_dir: PathBuf::from("data"),
            index_url: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            tokens: TokenSettings::default(),
            formats: BTreeMap::new(),
            sets: SetSettings::default(),
        }
    }
}

impl OaiConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Check values serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url '{}': {e}", self.base_url)))?;

        if let Some(index_url) = &self.index_url {
            Url::parse(index_url)
                .map_err(|e| ConfigError::Invalid(format!("index_url '{index_url}': {e}")))?;
        }

        if self.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "default_page_size must be positive".to_string(),
            ));
        }
        if let Some((prefix, _)) = self
            .formats
            .iter()
            .find(|(_, settings)| settings.page_size == Some(0))
        {
            return Err(ConfigError::Invalid(format!(
                "page_size of {prefix} must be positive"
            )));
        }

        if self.tokens.lifetime_secs == 0 {
            return Err(ConfigError::Invalid(
                "tokens.lifetime_secs must be positive".to_string(),
            ));
        }
        if self.tokens.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "tokens.sweep_interval_secs must be positive".to_string(),
            ));
        }

        if let Some(template) = &self.record_url {
            if !template.contains("{id}") {
                return Err(ConfigError::Invalid(format!(
                    "record_url '{template}' has no {{id}} placeholder"
                )));
            }
        }

        Ok(())
    }

    /// Page size for a format.
    #[must_use]
    pub fn page_size(&self, prefix: MetadataPrefix) -> u64 {
        self.formats
            .get(&prefix)
            .and_then(|s| s.page_size)
            .unwrap_or(self.default_page_size)
    }

    /// Whether a format is served.
    #[must_use]
    pub fn is_enabled(&self, prefix: MetadataPrefix) -> bool {
        self.formats.get(&prefix).is_none_or(|s| s.enabled)
    }

    #[must_use]
    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.tokens.lifetime_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.tokens.sweep_interval_secs)
    }
}
