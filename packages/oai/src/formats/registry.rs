//! Format registry mapping metadata prefixes to renderers.

use std::collections::BTreeMap;

use super::{
    DublinCore, EmbeddedSourceFormat, Epicur, Ese, FormatContext, MarcXml, MetadataFormat,
    VersionedSourceFormat,
};
use crate::config::OaiConfig;
use crate::request::MetadataPrefix;

/// Lookup table of the formats a repository serves.
///
/// The engine resolves formats only through this table; adding a format
/// means registering it here.
pub struct FormatRegistry {
    formats: BTreeMap<MetadataPrefix, Box<dyn MetadataFormat>>,
}

impl FormatRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            formats: BTreeMap::new(),
        }
    }

    /// Register a format under its own prefix, replacing any previous one.
    pub fn register(&mut self, format: impl MetadataFormat + 'static) {
        self.formats.insert(format.prefix(), Box::new(format));
    }

    #[must_use]
    pub fn get(&self, prefix: MetadataPrefix) -> Option<&dyn MetadataFormat> {
        self.formats.get(&prefix).map(|f| f.as_ref())
    }

    /// All registered formats in prefix order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn MetadataFormat> {
        self.formats.values().map(|f| f.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry with every format enabled in the configuration.
pub fn create_registry(ctx: &FormatContext, config: &OaiConfig) -> FormatRegistry {
    let mut registry = FormatRegistry::new();
    let enabled = |prefix| config.is_enabled(prefix);

    if enabled(MetadataPrefix::OaiDc) {
        registry.register(DublinCore::new(ctx.clone()));
    }
    if enabled(MetadataPrefix::Ese) {
        registry.register(Ese::new(ctx.clone()));
    }
    if enabled(MetadataPrefix::Mets) {
        registry.register(EmbeddedSourceFormat::mets(ctx.clone()));
    }
    if enabled(MetadataPrefix::Marcxml) {
        registry.register(MarcXml::new(ctx.clone()));
    }
    if enabled(MetadataPrefix::Lido) {
        registry.register(EmbeddedSourceFormat::lido(ctx.clone()));
    }
    if enabled(MetadataPrefix::Epicur) {
        registry.register(Epicur::new(ctx.clone()));
    }
    if enabled(MetadataPrefix::Tei) {
        registry.register(VersionedSourceFormat::tei(ctx.clone()));
    }
    if enabled(MetadataPrefix::Cmdi) {
        registry.register(VersionedSourceFormat::cmdi(ctx.clone()));
    }

    tracing::debug!(formats = registry.len(), "Created format registry");
    registry
}
