//! Search index access.
//!
//! The engine and the format renderers only talk to the index through the
//! [`QueryFacade`] trait. Two implementations ship with the crate:
//! [`MemoryIndex`] for tests and local runs, and [`SolrIndex`] for a
//! Solr-style `/select` endpoint.

pub mod fields;
mod memory;
mod solr;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::date::DateRange;

pub use memory::MemoryIndex;
pub use solr::{render_query, SolrIndex};

/// Errors talking to the search backend.
#[derive(Debug, Error)]
pub enum QueryError {
    /// HTTP request failed.
    #[error("index request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("index returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The backend response could not be decoded.
    #[error("invalid index response: {0}")]
    Json(#[from] serde_json::Error),

    /// All retry attempts failed.
    #[error("index request failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// Any other backend failure.
    #[error("index error: {0}")]
    Backend(String),
}

/// One indexed document: a multi-valued field map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: BTreeMap<String, Vec<String>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper that appends a value to a field.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(field, value);
        self
    }

    pub fn push(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(field.into()).or_default().push(value.into());
    }

    /// Build a document from a JSON object, flattening scalars and arrays
    /// into string values.
    pub fn from_json(object: serde_json::Map<String, serde_json::Value>) -> Self {
        let mut document = Self::new();
        for (field, value) in object {
            match value {
                serde_json::Value::Array(items) => {
                    for item in items {
                        if let Some(text) = json_scalar(item) {
                            document.push(field.clone(), text);
                        }
                    }
                }
                other => {
                    if let Some(text) = json_scalar(other) {
                        document.push(field, text);
                    }
                }
            }
        }
        document
    }

    /// All values of a field, in index order.
    #[must_use]
    pub fn values(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn first(&self, field: &str) -> Option<&str> {
        self.values(field).first().map(String::as_str)
    }

    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        !self.values(field).is_empty()
    }

    /// Largest numeric value of a field, ignoring values that don't parse.
    #[must_use]
    pub fn max_i64(&self, field: &str) -> Option<i64> {
        self.values(field).iter().filter_map(|v| v.parse().ok()).max()
    }

    /// Persistent identifier of the document.
    #[must_use]
    pub fn pi(&self) -> Option<&str> {
        self.first(fields::PI)
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.has(fields::DATE_DELETED)
    }

    /// The datestamp reported in record headers.
    ///
    /// Deleted documents report their deletion time, others their latest
    /// update.
    #[must_use]
    pub fn datestamp(&self) -> i64 {
        if self.is_deleted() {
            self.max_i64(fields::DATE_DELETED).unwrap_or_default()
        } else {
            self.max_i64(fields::DATE_UPDATED).unwrap_or_default()
        }
    }

    /// Whether the document was updated or deleted inside the range.
    #[must_use]
    pub fn modified_within(&self, range: &DateRange) -> bool {
        [fields::DATE_UPDATED, fields::DATE_DELETED]
            .iter()
            .flat_map(|field| self.values(field))
            .filter_map(|v| v.parse::<i64>().ok())
            .any(|ts| range.contains(ts))
    }
}

fn json_scalar(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A filter clause on document fields.
///
/// Clauses are backend independent: [`MemoryIndex`] evaluates them in
/// process, [`SolrIndex`] renders them as query syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    /// The field has the given value.
    Equals { field: String, value: String },
    /// The field has at least one value.
    Exists { field: String },
    /// The inner clause does not match.
    Not(Box<Clause>),
    /// At least one of the inner clauses matches.
    AnyOf(Vec<Clause>),
}

impl Clause {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists {
            field: field.into(),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluate the clause against a document.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::Equals { field, value } => document.values(field).iter().any(|v| v == value),
            Self::Exists { field } => document.has(field),
            Self::Not(inner) => !inner.matches(document),
            Self::AnyOf(clauses) => clauses.iter().any(|c| c.matches(document)),
        }
    }
}

/// A "modified between" query with extra clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    pub range: DateRange,
    pub clauses: Vec<Clause>,
}

impl DocumentQuery {
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            clauses: Vec::new(),
        }
    }

    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        document.modified_within(&self.range) && self.clauses.iter().all(|c| c.matches(document))
    }
}

/// One page of documents plus the total hit count of the query.
#[derive(Debug, Clone, Default)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    pub total_hits: u64,
}

/// Read access to the search index.
///
/// Implementations must return documents in a stable order so that offsets
/// remain meaningful across independent requests.
pub trait QueryFacade: Send + Sync {
    /// Fetch `page_size` documents starting at `first_row`.
    fn list_documents(
        &self,
        query: &DocumentQuery,
        first_row: u64,
        page_size: u64,
    ) -> Result<DocumentPage, QueryError>;

    /// Look up a single document by persistent identifier.
    fn get_document(&self, identifier: &str) -> Result<Option<Document>, QueryError>;

    /// Number of documents matching the query.
    fn count_documents(&self, query: &DocumentQuery) -> Result<u64, QueryError>;

    /// Sum over matching documents of the number of values in `field`.
    fn count_values(&self, query: &DocumentQuery, field: &str) -> Result<u64, QueryError>;

    /// Distinct values of a field across the whole index, sorted.
    fn distinct_values(&self, field: &str) -> Result<Vec<String>, QueryError>;

    /// Earliest update timestamp in the index, if any document exists.
    fn earliest_timestamp(&self) -> Result<Option<i64>, QueryError>;
}
