//! Metadata formats.
//!
//! Every metadata schema implements [`MetadataFormat`]. A format only has to
//! say which documents it can disseminate and how to render one of them; the
//! provided methods take care of listing, counting and single-record lookup,
//! all built from the same [`MetadataFormat::document_query`]. Because the
//! list and count operations share that one query, the hit count stored in a
//! resumption token is always comparable with the live one.
//!
//! Formats that emit several records per document (one per language, say)
//! name the discriminating field in [`MetadataFormat::version_field`]; paging
//! then runs in two cursor spaces, see [`Cursor`].

mod dublin_core;
mod embedded;
mod epicur;
mod ese;
mod marc;
mod paging;
mod registry;
mod source;
mod versioned;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::date::{format_datestamp, DateRange};
use crate::error::{OaiError, Result};
use crate::index::{fields, Clause, Document, DocumentQuery, QueryError, QueryFacade};
use crate::request::MetadataPrefix;
use crate::sets::SetCatalog;
use crate::xml::XmlError;

pub use dublin_core::DublinCore;
pub use embedded::EmbeddedSourceFormat;
pub use epicur::Epicur;
pub use ese::Ese;
pub use marc::MarcXml;
pub use registry::{create_registry, FormatRegistry};
pub use versioned::VersionedSourceFormat;

/// XML Schema instance namespace, used for `xsi:schemaLocation`.
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Dublin Core elements namespace, shared by `oai_dc` and `ese`.
pub const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";

/// Renderer failures for a single document.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The document lacks a field the format needs.
    #[error("document has no {0} value")]
    MissingField(&'static str),

    /// The identifier cannot be used to locate a source file.
    #[error("identifier not usable as a file name: '{0}'")]
    InvalidIdentifier(String),

    /// The stored source document could not be read.
    #[error("failed to read source document {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The stored source document is not usable XML, or writing failed.
    #[error(transparent)]
    Xml(#[from] XmlError),
}

/// Shared collaborators handed to every format at construction time.
#[derive(Clone)]
pub struct FormatContext {
    pub index: Arc<dyn QueryFacade>,
    pub sets: Arc<SetCatalog>,
    pub repository_name: String,
    /// Prepended to the persistent identifier to form record identifiers.
    pub identifier_prefix: String,
    /// Landing page template; `{id}` is replaced by the persistent identifier.
    pub record_url: Option<String>,
    /// Root directory of stored source documents.
    pub data_dir: PathBuf,
    /// Whether deleted documents are reported as tombstones.
    pub include_deleted: bool,
}

impl FormatContext {
    /// Record identifier for a document, optionally suffixed with a version.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use oai_harvest::formats::FormatContext;
    /// use oai_harvest::index::MemoryIndex;
    ///
    /// let ctx = FormatContext::new(Arc::new(MemoryIndex::default()))
    ///     .with_identifier_prefix("oai:example.org:");
    /// assert_eq!(ctx.record_identifier("PPN1", None), "oai:example.org:PPN1");
    /// assert_eq!(ctx.record_identifier("PPN1", Some("de")), "oai:example.org:PPN1_de");
    /// ```
    #[must_use]
    pub fn record_identifier(&self, pi: &str, version: Option<&str>) -> String {
        match version {
            Some(version) => format!("{}{pi}_{version}", self.identifier_prefix),
            None => format!("{}{pi}", self.identifier_prefix),
        }
    }

    /// Landing page URL of a document, if a template is configured.
    #[must_use]
    pub fn record_url_for(&self, pi: &str) -> Option<String> {
        self.record_url
            .as_ref()
            .map(|template| template.replace("{id}", pi))
    }

    pub fn new(index: Arc<dyn QueryFacade>) -> Self {
        Self {
            index,
            sets: Arc::new(SetCatalog::default()),
            repository_name: String::new(),
            identifier_prefix: String::new(),
            record_url: None,
            data_dir: PathBuf::from("."),
            include_deleted: true,
        }
    }

    pub fn with_identifier_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.identifier_prefix = prefix.into();
        self
    }

    pub fn with_sets(mut self, sets: SetCatalog) -> Self {
        self.sets = Arc::new(sets);
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_record_url(mut self, template: impl Into<String>) -> Self {
        self.record_url = Some(template.into());
        self
    }
}

/// The two cursor spaces of a paginated list.
///
/// `raw_row` counts index documents, `virtual_row` counts OAI records. They
/// only differ for versioned formats, where `version_offset` is the number
/// of versions of the document at `raw_row` already emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub virtual_row: u64,
    pub raw_row: u64,
    #[serde(default)]
    pub version_offset: u64,
}

/// Hit counts of one query evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitCounts {
    pub virtual_hits: u64,
    pub raw_hits: u64,
}

/// Where a page starts and how many OAI records it may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub cursor: Cursor,
    pub page_size: u64,
    /// Hit counts already verified for this filter; spares a recount.
    pub known_hits: Option<HitCounts>,
}

impl PageWindow {
    #[must_use]
    pub fn first(page_size: u64) -> Self {
        Self {
            cursor: Cursor::default(),
            page_size,
            known_hits: None,
        }
    }

    /// Resume at `cursor` with hit counts checked against the index.
    #[must_use]
    pub fn resume(cursor: Cursor, page_size: u64, hits: HitCounts) -> Self {
        Self {
            cursor,
            page_size,
            known_hits: Some(hits),
        }
    }
}

/// The filter arguments of a list request, already resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestFilter {
    pub range: DateRange,
    pub set: Option<Clause>,
}

/// An OAI-PMH `<header>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub identifier: String,
    pub datestamp: String,
    pub set_specs: Vec<String>,
    pub deleted: bool,
}

/// A header plus, for `ListRecords`/`GetRecord`, the rendered payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OaiRecord {
    pub header: RecordHeader,
    pub metadata: Option<String>,
}

/// One page of a list operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPage {
    pub records: Vec<OaiRecord>,
    /// Totals of the query this page was cut from.
    pub hits: HitCounts,
    /// Cursor of the first record after this page.
    pub next: Cursor,
}

impl RecordPage {
    /// Whether raw rows remain beyond this page.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.next.raw_row < self.hits.raw_hits
    }
}

/// Capability interface of a metadata schema.
pub trait MetadataFormat: Send + Sync {
    fn prefix(&self) -> MetadataPrefix;

    /// URL of the XML schema.
    fn schema(&self) -> &'static str;

    /// Namespace URI of the payload root element.
    fn namespace(&self) -> &'static str;

    fn context(&self) -> &FormatContext;

    /// Render the `<metadata>` payload of one document.
    ///
    /// `version` is the discriminator value for versioned formats.
    fn render(
        &self,
        document: &Document,
        version: Option<&str>,
    ) -> std::result::Result<String, RenderError>;

    /// Field whose values each produce a separate record.
    fn version_field(&self) -> Option<&'static str> {
        None
    }

    /// Clauses restricting the index to documents this format can render.
    fn format_clauses(&self) -> Vec<Clause> {
        Vec::new()
    }

    /// The index query behind both listing and counting.
    fn document_query(&self, filter: &HarvestFilter) -> DocumentQuery {
        let mut query = DocumentQuery::new(filter.range);
        if let Some(set) = &filter.set {
            query = query.with_clause(set.clone());
        }
        if !self.context().include_deleted {
            query = query.with_clause(Clause::exists(fields::DATE_DELETED).negate());
        }
        for clause in self.format_clauses() {
            query = query.with_clause(clause);
        }
        if let Some(field) = self.version_field() {
            query = query.with_clause(Clause::exists(field));
        }
        query
    }

    /// Current hit counts for the filter.
    fn total_hits(&self, filter: &HarvestFilter) -> std::result::Result<HitCounts, QueryError> {
        let index = &self.context().index;
        let query = self.document_query(filter);
        let raw_hits = index.count_documents(&query)?;
        let virtual_hits = match self.version_field() {
            Some(field) => index.count_values(&query, field)?,
            None => raw_hits,
        };
        Ok(HitCounts {
            virtual_hits,
            raw_hits,
        })
    }

    fn list_records(
        &self,
        filter: &HarvestFilter,
        window: PageWindow,
    ) -> std::result::Result<RecordPage, QueryError> {
        paging::list_page(self, filter, window, true)
    }

    fn list_identifiers(
        &self,
        filter: &HarvestFilter,
        window: PageWindow,
    ) -> std::result::Result<RecordPage, QueryError> {
        paging::list_page(self, filter, window, false)
    }

    /// Whether this format can render the document at all.
    fn can_disseminate(&self, document: &Document) -> bool {
        self.document_query(&HarvestFilter::default())
            .clauses
            .iter()
            .all(|c| c.matches(document))
    }

    /// Look up and render one record by its OAI identifier.
    fn get_record(&self, identifier: &str) -> Result<OaiRecord> {
        let ctx = self.context();
        let local = identifier
            .strip_prefix(ctx.identifier_prefix.as_str())
            .ok_or(OaiError::IdDoesNotExist)?;

        let (pi, version) = match self.version_field() {
            Some(_) => {
                let (pi, version) = local.rsplit_once('_').ok_or(OaiError::IdDoesNotExist)?;
                (pi, Some(version))
            }
            None => (local, None),
        };

        let document = ctx
            .index
            .get_document(pi)
            .map_err(|e| {
                tracing::error!(identifier, error = %e, "Index lookup failed");
                OaiError::CannotDisseminateFormat
            })?
            .ok_or(OaiError::IdDoesNotExist)?;

        if document.is_deleted() && !ctx.include_deleted {
            return Err(OaiError::IdDoesNotExist);
        }
        if !self.can_disseminate(&document) {
            return Err(OaiError::CannotDisseminateFormat);
        }
        if let (Some(field), Some(version)) = (self.version_field(), version) {
            if !document.values(field).iter().any(|v| v == version) {
                return Err(OaiError::IdDoesNotExist);
            }
        }

        build_record(self, &document, version, true).ok_or(OaiError::CannotDisseminateFormat)
    }
}

/// Build a record for one document version.
///
/// Returns `None` when the document has no identifier or fails to render;
/// both are logged.
pub(crate) fn build_record<F: MetadataFormat + ?Sized>(
    format: &F,
    document: &Document,
    version: Option<&str>,
    with_metadata: bool,
) -> Option<OaiRecord> {
    let ctx = format.context();
    let Some(pi) = document.pi() else {
        tracing::warn!(format = %format.prefix(), "Skipping document without identifier");
        return None;
    };

    let header = RecordHeader {
        identifier: ctx.record_identifier(pi, version),
        datestamp: format_datestamp(document.datestamp()),
        set_specs: ctx.sets.set_specs_for(document),
        deleted: document.is_deleted(),
    };

    let metadata = if header.deleted || !with_metadata {
        None
    } else {
        match format.render(document, version) {
            Ok(xml) => Some(xml),
            Err(e) => {
                tracing::warn!(
                    format = %format.prefix(),
                    identifier = %header.identifier,
                    error = %e,
                    "Skipping record that failed to render"
                );
                return None;
            }
        }
    };

    Some(OaiRecord { header, metadata })
}

/// `xsi:schemaLocation` value for a format.
pub(crate) fn schema_location<F: MetadataFormat + ?Sized>(format: &F) -> String {
    format!("{} {}", format.namespace(), format.schema())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;
    use pretty_assertions::assert_eq;

    fn doc(pi: &str) -> Document {
        Document::new()
            .with(fields::PI, pi)
            .with(fields::DATE_UPDATED, "1700000000000")
            .with(fields::TITLE, format!("Title {pi}"))
    }

    fn context(documents: Vec<Document>) -> FormatContext {
        FormatContext::new(Arc::new(MemoryIndex::new(documents)))
            .with_identifier_prefix("oai:test:")
    }

    #[test]
    fn test_total_hits_matches_listing() {
        let format = DublinCore::new(context((0..7).map(|i| doc(&format!("D{i}"))).collect()));
        let filter = HarvestFilter::default();

        let hits = format.total_hits(&filter).unwrap();
        let page = format.list_records(&filter, PageWindow::first(5)).unwrap();
        assert_eq!(hits, page.hits);
        assert_eq!(hits.raw_hits, 7);
        assert!(page.has_more());
        assert_eq!(page.next.raw_row, 5);
    }

    #[test]
    fn test_get_record() {
        let format = DublinCore::new(context(vec![doc("PPN1")]));

        let record = format.get_record("oai:test:PPN1").unwrap();
        assert_eq!(record.header.identifier, "oai:test:PPN1");
        assert_eq!(record.header.datestamp, "2023-11-14T22:13:20Z");
        assert!(record.metadata.unwrap().contains("Title PPN1"));

        assert_eq!(
            format.get_record("oai:test:PPN2").unwrap_err(),
            OaiError::IdDoesNotExist
        );
        assert_eq!(
            format.get_record("oai:other:PPN1").unwrap_err(),
            OaiError::IdDoesNotExist
        );
    }

    #[test]
    fn test_deleted_document_has_no_metadata() {
        let deleted = doc("PPN1").with(fields::DATE_DELETED, "1710000000000");
        let format = DublinCore::new(context(vec![deleted]));

        let record = format.get_record("oai:test:PPN1").unwrap();
        assert!(record.header.deleted);
        assert!(record.metadata.is_none());
    }

    #[test]
    fn test_deleted_documents_hidden_when_not_reported() {
        let mut ctx = context(vec![doc("A"), doc("B").with(fields::DATE_DELETED, "1")]);
        ctx.include_deleted = false;
        let format = DublinCore::new(ctx);

        assert_eq!(
            format.total_hits(&HarvestFilter::default()).unwrap().raw_hits,
            1
        );
        assert_eq!(
            format.get_record("oai:test:B").unwrap_err(),
            OaiError::IdDoesNotExist
        );
    }

    #[test]
    fn test_record_url_template() {
        let ctx = context(Vec::new()).with_record_url("https://example.org/view/{id}/1/");
        assert_eq!(
            ctx.record_url_for("PPN1").as_deref(),
            Some("https://example.org/view/PPN1/1/")
        );
    }
}
