//! The harvest engine: one verb invocation from parsed request to response
//! model.
//!
//! List verbs are paginated. The first page of a list is computed from the
//! request's own arguments; follow-up pages replay the request stored in a
//! resumption token, after checking that the query still has the hit counts
//! it had when the token was minted. A changed result set ends the harvest
//! with `badResumptionToken`, since resuming would skip or repeat records.

use std::sync::Arc;

use chrono::Utc;

use crate::config::{DeletedRecordPolicy, OaiConfig, GRANULARITY, PROTOCOL_VERSION};
use crate::date::{format_datestamp, DateRange, EPOCH_MS};
use crate::error::{OaiError, Result};
use crate::formats::{
    create_registry, FormatContext, FormatRegistry, HarvestFilter, HitCounts, MetadataFormat,
    OaiRecord, PageWindow,
};
use crate::index::{Document, QueryFacade};
use crate::request::{MetadataPrefix, OaiRequest, Verb};
use crate::sets::{SetCatalog, SetDescription};
use crate::token::{ResumptionToken, TokenError, TokenStore};
use crate::xml::{render_response, XmlError};

/// Content of an `Identify` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryIdentity {
    pub repository_name: String,
    pub base_url: String,
    pub protocol_version: &'static str,
    pub admin_email: String,
    pub earliest_datestamp: String,
    pub deleted_record: DeletedRecordPolicy,
    pub granularity: &'static str,
}

/// One entry of a `ListMetadataFormats` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescription {
    pub prefix: MetadataPrefix,
    pub schema: &'static str,
    pub namespace: &'static str,
}

/// The `<resumptionToken>` element of a list response.
///
/// `token` is `None` on the last page of a resumed list, where the protocol
/// asks for an empty element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumptionElement {
    pub token: Option<String>,
    pub expiration_date: Option<String>,
    pub complete_list_size: u64,
    pub cursor: u64,
}

/// One page of `ListIdentifiers` or `ListRecords`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordList {
    pub records: Vec<OaiRecord>,
    pub resumption: Option<ResumptionElement>,
}

/// Successful outcome of a verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerbResponse {
    Identify(RepositoryIdentity),
    ListMetadataFormats(Vec<FormatDescription>),
    ListSets(Vec<SetDescription>),
    ListIdentifiers(RecordList),
    ListRecords(RecordList),
    GetRecord(OaiRecord),
}

/// Build the context shared by all formats of a repository.
pub fn format_context(config: &OaiConfig, index: Arc<dyn QueryFacade>) -> FormatContext {
    FormatContext {
        index,
        sets: Arc::new(SetCatalog::new(
            config.sets.static_sets.clone(),
            config.sets.value_fields.clone(),
        )),
        repository_name: config.repository_name.clone(),
        identifier_prefix: config.identifier_prefix.clone(),
        record_url: config.record_url.clone(),
        data_dir: config.data_dir.clone(),
        include_deleted: config.deleted_record != DeletedRecordPolicy::No,
    }
}

/// Dispatches protocol requests.
///
/// All collaborators are injected; the engine holds no mutable state and
/// can serve any number of requests concurrently.
pub struct HarvestEngine {
    config: OaiConfig,
    index: Arc<dyn QueryFacade>,
    sets: Arc<SetCatalog>,
    formats: FormatRegistry,
    tokens: Arc<TokenStore>,
}

impl HarvestEngine {
    /// Create an engine serving every format enabled in `config`.
    pub fn new(config: OaiConfig, index: Arc<dyn QueryFacade>, tokens: Arc<TokenStore>) -> Self {
        let ctx = format_context(&config, index);
        let formats = create_registry(&ctx, &config);
        Self::with_registry(config, &ctx, formats, tokens)
    }

    /// Create an engine with an explicit format registry.
    ///
    /// `ctx` must be the context the registered formats were built with.
    pub fn with_registry(
        config: OaiConfig,
        ctx: &FormatContext,
        formats: FormatRegistry,
        tokens: Arc<TokenStore>,
    ) -> Self {
        Self {
            config,
            index: Arc::clone(&ctx.index),
            sets: Arc::clone(&ctx.sets),
            formats,
            tokens,
        }
    }

    #[must_use]
    pub fn config(&self) -> &OaiConfig {
        &self.config
    }

    #[must_use]
    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    #[must_use]
    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Parse raw request parameters, run the verb and render the response
    /// document.
    ///
    /// Protocol errors are part of the document; only XML writing can fail.
    pub fn respond<I, K, V>(&self, params: I) -> std::result::Result<String, XmlError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let now = Utc::now();
        match OaiRequest::from_params(params) {
            Ok(request) => {
                let outcome = self.handle(&request);
                if let Err(e) = &outcome {
                    tracing::debug!(verb = %request.verb, code = e.code(), "Protocol error");
                }
                render_response(&self.config.base_url, now, Some(&request), &outcome)
            }
            Err(e) => {
                tracing::debug!(code = e.code(), error = %e, "Rejected request");
                render_response(&self.config.base_url, now, None, &Err(e))
            }
        }
    }

    /// Run one verb.
    pub fn handle(&self, request: &OaiRequest) -> Result<VerbResponse> {
        match request.verb {
            Verb::Identify => Ok(VerbResponse::Identify(self.identify())),
            Verb::ListMetadataFormats => self
                .list_metadata_formats(request.identifier.as_deref())
                .map(VerbResponse::ListMetadataFormats),
            Verb::ListSets => self.list_sets(request).map(VerbResponse::ListSets),
            Verb::ListIdentifiers | Verb::ListRecords => self.execute(request),
            Verb::GetRecord => self.execute_single(request),
        }
    }

    /// Serve one page of `ListIdentifiers` or `ListRecords`.
    pub fn execute(&self, request: &OaiRequest) -> Result<VerbResponse> {
        let resumed = match &request.resumption_token {
            Some(name) => Some(self.load_token(name, request.verb)?),
            None => None,
        };
        let original = resumed.as_ref().map_or(request, |t| &t.request);

        let prefix = original.metadata_prefix.ok_or_else(|| {
            OaiError::BadArgument("Missing required argument: metadataPrefix".to_string())
        })?;
        let format = self
            .formats
            .get(prefix)
            .ok_or(OaiError::CannotDisseminateFormat)?;
        let filter = self.harvest_filter(original)?;
        let page_size = self.config.page_size(prefix);

        let window = match &resumed {
            Some(token) => {
                let hits = check_hit_counts(format, &filter, token)?;
                PageWindow::resume(token.cursor(), page_size, hits)
            }
            None => PageWindow::first(page_size),
        };

        let page = match request.verb {
            Verb::ListRecords => format.list_records(&filter, window),
            _ => format.list_identifiers(&filter, window),
        }
        .map_err(|e| {
            tracing::error!(format = %prefix, error = %e, "Index query failed");
            OaiError::CannotDisseminateFormat
        })?;

        if page.hits.raw_hits == 0 {
            return Err(OaiError::NoRecordsMatch);
        }
        if page.records.is_empty() {
            tracing::warn!(
                format = %prefix,
                raw_cursor = window.cursor.raw_row,
                raw_hits = page.hits.raw_hits,
                "No document on this page could be rendered"
            );
            if resumed.is_none() && !page.has_more() {
                return Err(OaiError::NoRecordsMatch);
            }
        }

        let resumption = if page.has_more() {
            let token = self.tokens.create(page.hits, page.next, original);
            tracing::debug!(
                token = %token.name,
                raw_cursor = token.raw_cursor,
                raw_hits = token.raw_hits,
                "Issued resumption token"
            );
            Some(ResumptionElement {
                expiration_date: Some(token.expiration_date()),
                token: Some(token.name),
                complete_list_size: page.hits.virtual_hits,
                cursor: page.next.virtual_row,
            })
        } else if resumed.is_some() {
            Some(ResumptionElement {
                token: None,
                expiration_date: None,
                complete_list_size: page.hits.virtual_hits,
                cursor: page.next.virtual_row,
            })
        } else {
            None
        };

        let list = RecordList {
            records: page.records,
            resumption,
        };
        Ok(match request.verb {
            Verb::ListRecords => VerbResponse::ListRecords(list),
            _ => VerbResponse::ListIdentifiers(list),
        })
    }

    /// Serve `GetRecord`; no pagination is involved.
    pub fn execute_single(&self, request: &OaiRequest) -> Result<VerbResponse> {
        let identifier = request.identifier.as_deref().ok_or_else(|| {
            OaiError::BadArgument("Missing required argument: identifier".to_string())
        })?;
        let prefix = request.metadata_prefix.ok_or_else(|| {
            OaiError::BadArgument("Missing required argument: metadataPrefix".to_string())
        })?;
        let format = self
            .formats
            .get(prefix)
            .ok_or(OaiError::CannotDisseminateFormat)?;

        format.get_record(identifier).map(VerbResponse::GetRecord)
    }

    pub fn identify(&self) -> RepositoryIdentity {
        let earliest = self.index.earliest_timestamp().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to determine earliest datestamp");
            None
        });

        RepositoryIdentity {
            repository_name: self.config.repository_name.clone(),
            base_url: self.config.base_url.clone(),
            protocol_version: PROTOCOL_VERSION,
            admin_email: self.config.admin_email.clone(),
            earliest_datestamp: format_datestamp(earliest.unwrap_or(EPOCH_MS)),
            deleted_record: self.config.deleted_record,
            granularity: GRANULARITY,
        }
    }

    /// Formats of the repository, or those able to disseminate one item.
    pub fn list_metadata_formats(&self, identifier: Option<&str>) -> Result<Vec<FormatDescription>> {
        if self.formats.is_empty() {
            return Err(OaiError::NoMetadataFormats);
        }

        let descriptions: Vec<FormatDescription> = match identifier {
            None => self.formats.iter().map(describe).collect(),
            Some(identifier) => {
                let (document, version) = self.locate(identifier)?;
                self.formats
                    .iter()
                    .filter(|f| serves_item(*f, &document, version))
                    .map(describe)
                    .collect()
            }
        };

        if descriptions.is_empty() {
            return Err(OaiError::NoMetadataFormats);
        }
        Ok(descriptions)
    }

    pub fn list_sets(&self, request: &OaiRequest) -> Result<Vec<SetDescription>> {
        // Set lists are never paginated, so no token can be valid here.
        if request.resumption_token.is_some() {
            return Err(OaiError::BadResumptionToken);
        }
        if self.sets.is_empty() {
            return Err(OaiError::NoSetHierarchy);
        }

        self.sets.list(self.index.as_ref()).map_err(|e| {
            tracing::error!(error = %e, "Failed to list sets");
            OaiError::NoSetHierarchy
        })
    }

    fn load_token(&self, name: &str, verb: Verb) -> Result<ResumptionToken> {
        let token = match self.tokens.load(name) {
            Ok(token) => token,
            Err(e @ TokenError::Corrupt { .. }) => {
                tracing::warn!(token = %name, error = %e, "Purging corrupt resumption token");
                if let Err(e) = self.tokens.purge(name) {
                    tracing::warn!(token = %name, error = %e, "Failed to purge resumption token");
                }
                return Err(OaiError::BadResumptionToken);
            }
            Err(e @ (TokenError::Io(_) | TokenError::Encode(_))) => {
                tracing::error!(token = %name, error = %e, "Failed to load resumption token");
                return Err(OaiError::BadResumptionToken);
            }
            Err(e) => {
                tracing::info!(token = %name, error = %e, "Rejected resumption token");
                return Err(OaiError::BadResumptionToken);
            }
        };

        if token.request.verb != verb {
            tracing::info!(
                token = %name,
                issued_for = %token.request.verb,
                verb = %verb,
                "Resumption token used with a different verb"
            );
            return Err(OaiError::BadResumptionToken);
        }
        Ok(token)
    }

    fn harvest_filter(&self, request: &OaiRequest) -> Result<HarvestFilter> {
        let range = DateRange::parse(request.from.as_deref(), request.until.as_deref())
            .map_err(|e| OaiError::BadArgument(e.to_string()))?;

        let set = match &request.set {
            None => None,
            Some(_) if self.sets.is_empty() => return Err(OaiError::NoSetHierarchy),
            Some(spec) => Some(self.sets.resolve(spec).ok_or(OaiError::NoRecordsMatch)?),
        };

        Ok(HarvestFilter { range, set })
    }

    /// Find the document behind an OAI identifier, plus the version suffix
    /// if the identifier names one.
    fn locate<'a>(&self, identifier: &'a str) -> Result<(Document, Option<&'a str>)> {
        let local = identifier
            .strip_prefix(self.config.identifier_prefix.as_str())
            .ok_or(OaiError::IdDoesNotExist)?;

        let lookup = |pi: &str| {
            self.index.get_document(pi).map_err(|e| {
                tracing::error!(identifier, error = %e, "Index lookup failed");
                OaiError::NoMetadataFormats
            })
        };

        let (document, version) = match lookup(local)? {
            Some(document) => (document, None),
            None => {
                let (pi, version) = local.rsplit_once('_').ok_or(OaiError::IdDoesNotExist)?;
                let document = lookup(pi)?.ok_or(OaiError::IdDoesNotExist)?;
                (document, Some(version))
            }
        };

        if document.is_deleted() && self.config.deleted_record == DeletedRecordPolicy::No {
            return Err(OaiError::IdDoesNotExist);
        }
        Ok((document, version))
    }
}

/// Compare the live hit counts with those stored in the token.
fn check_hit_counts(
    format: &dyn MetadataFormat,
    filter: &HarvestFilter,
    token: &ResumptionToken,
) -> Result<HitCounts> {
    match format.total_hits(filter) {
        Ok(current) if current == token.hits() => Ok(current),
        Ok(current) => {
            tracing::info!(
                token = %token.name,
                stored_raw_hits = token.raw_hits,
                stored_virtual_hits = token.virtual_hits,
                raw_hits = current.raw_hits,
                virtual_hits = current.virtual_hits,
                "Result set changed since resumption token was issued"
            );
            Err(OaiError::BadResumptionToken)
        }
        Err(e) => {
            tracing::error!(token = %token.name, error = %e, "Failed to count hits for resumption");
            Err(OaiError::BadResumptionToken)
        }
    }
}

fn describe(format: &dyn MetadataFormat) -> FormatDescription {
    FormatDescription {
        prefix: format.prefix(),
        schema: format.schema(),
        namespace: format.namespace(),
    }
}

/// Whether a format serves the item named by a document and version suffix.
fn serves_item(format: &dyn MetadataFormat, document: &Document, version: Option<&str>) -> bool {
    if !format.can_disseminate(document) {
        return false;
    }
    match (format.version_field(), version) {
        (Some(field), Some(version)) => document.values(field).iter().any(|v| v == version),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{fields, MemoryIndex};
    use std::time::Duration;

    fn harvest_engine(documents: Vec<Document>, yaml: &str) -> (tempfile::TempDir, HarvestEngine) {
        let dir = tempfile::tempdir().unwrap();
        let config = OaiConfig::from_yaml_str(yaml).unwrap();
        let tokens = TokenStore::open(dir.path(), Duration::from_secs(60)).unwrap();
        let engine = HarvestEngine::new(
            config,
            Arc::new(MemoryIndex::new(documents)),
            Arc::new(tokens),
        );
        (dir, engine)
    }

    fn doc(pi: &str) -> Document {
        Document::new()
            .with(fields::PI, pi)
            .with(fields::DATE_UPDATED, "1704067200000")
            .with(fields::TITLE, pi)
    }

    #[test]
    fn test_identify_uses_earliest_timestamp() {
        let (_dir, engine) = harvest_engine(vec![doc("A")], "repository_name: Test");
        let identity = engine.identify();
        assert_eq!(identity.repository_name, "Test");
        assert_eq!(identity.earliest_datestamp, "2024-01-01T00:00:00Z");
        assert_eq!(identity.protocol_version, "2.0");
    }

    #[test]
    fn test_list_metadata_formats_for_item() {
        let tei = doc("A").with(fields::TEI_LANGUAGES, "de");
        let (_dir, engine) = harvest_engine(vec![tei], "identifier_prefix: 'oai:t:'");

        let plain: Vec<MetadataPrefix> = engine
            .list_metadata_formats(Some("oai:t:A"))
            .unwrap()
            .into_iter()
            .map(|f| f.prefix)
            .collect();
        assert_eq!(
            plain,
            vec![MetadataPrefix::OaiDc, MetadataPrefix::Ese, MetadataPrefix::Marcxml]
        );

        let versioned: Vec<MetadataPrefix> = engine
            .list_metadata_formats(Some("oai:t:A_de"))
            .unwrap()
            .into_iter()
            .map(|f| f.prefix)
            .collect();
        assert_eq!(versioned, vec![MetadataPrefix::Tei]);

        assert_eq!(
            engine.list_metadata_formats(Some("oai:t:B")).unwrap_err(),
            OaiError::IdDoesNotExist
        );
    }

    #[test]
    fn test_no_metadata_formats() {
        let yaml = "formats: { oai_dc: { enabled: false }, ese: { enabled: false }, mets: { enabled: false }, marcxml: { enabled: false }, lido: { enabled: false }, epicur: { enabled: false }, tei: { enabled: false }, cmdi: { enabled: false } }";
        let (_dir, engine) = harvest_engine(vec![doc("A")], yaml);
        assert_eq!(
            engine.list_metadata_formats(None).unwrap_err(),
            OaiError::NoMetadataFormats
        );
    }

    #[test]
    fn test_set_errors() {
        let (_dir, engine) = harvest_engine(vec![doc("A")], "{}");
        let request = OaiRequest::new(Verb::ListRecords)
            .with_metadata_prefix(MetadataPrefix::OaiDc)
            .with_set("DOCSTRCT:map");
        assert_eq!(engine.handle(&request).unwrap_err(), OaiError::NoSetHierarchy);
        assert_eq!(
            engine
                .handle(&OaiRequest::new(Verb::ListSets))
                .unwrap_err(),
            OaiError::NoSetHierarchy
        );

        let (_dir, engine) = harvest_engine(vec![doc("A")], "sets: { value_fields: [DOCSTRCT] }");
        assert_eq!(engine.handle(&request).unwrap_err(), OaiError::NoRecordsMatch);
        let unknown = OaiRequest::new(Verb::ListRecords)
            .with_metadata_prefix(MetadataPrefix::OaiDc)
            .with_set("LANG:de");
        assert_eq!(engine.handle(&unknown).unwrap_err(), OaiError::NoRecordsMatch);
    }

    #[test]
    fn test_list_sets_rejects_token() {
        let (_dir, engine) = harvest_engine(vec![doc("A")], "sets: { value_fields: [DOCSTRCT] }");
        let request = OaiRequest::new(Verb::ListSets).with_resumption_token("oai_1");
        assert_eq!(
            engine.handle(&request).unwrap_err(),
            OaiError::BadResumptionToken
        );
    }

    #[test]
    fn test_bad_dates() {
        let (_dir, engine) = harvest_engine(vec![doc("A")], "{}");
        let request = OaiRequest::new(Verb::ListIdentifiers)
            .with_metadata_prefix(MetadataPrefix::OaiDc)
            .with_from("2024-02-30");
        assert!(matches!(
            engine.handle(&request),
            Err(OaiError::BadArgument(_))
        ));
    }

    #[test]
    fn test_token_for_other_verb_is_rejected() {
        let (_dir, engine) = harvest_engine(
            (0..5).map(|i| doc(&format!("D{i}"))).collect(),
            "default_page_size: 2",
        );
        let first =
            OaiRequest::new(Verb::ListIdentifiers).with_metadata_prefix(MetadataPrefix::OaiDc);
        let Ok(VerbResponse::ListIdentifiers(list)) = engine.handle(&first) else {
            panic!("expected a list");
        };
        let name = list.resumption.unwrap().token.unwrap();

        let resumed = OaiRequest::new(Verb::ListRecords).with_resumption_token(name);
        assert_eq!(
            engine.handle(&resumed).unwrap_err(),
            OaiError::BadResumptionToken
        );
    }
}
