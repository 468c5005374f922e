//! In-process index over a fixed set of documents.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::RwLock;

use super::{fields, Document, DocumentPage, DocumentQuery, QueryError, QueryFacade};

/// An index held in memory, ordered by persistent identifier.
///
/// Documents can be replaced at runtime, which is how tests simulate a corpus
/// changing between two pages of a harvest.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    documents: RwLock<Vec<Document>>,
}

impl MemoryIndex {
    pub fn new(documents: Vec<Document>) -> Self {
        let index = Self::default();
        index.replace(documents);
        index
    }

    /// Load documents from a JSON array of field objects.
    pub fn from_json_file(path: &Path) -> Result<Self, QueryError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| QueryError::Backend(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> Result<Self, QueryError> {
        let objects: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(json)?;
        Ok(Self::new(objects.into_iter().map(Document::from_json).collect()))
    }

    /// Replace the whole corpus.
    pub fn replace(&self, mut documents: Vec<Document>) {
        documents.sort_by(|a, b| a.pi().cmp(&b.pi()));
        match self.documents.write() {
            Ok(mut guard) => *guard = documents,
            Err(poisoned) => *poisoned.into_inner() = documents,
        }
    }

    /// Add one document, keeping identifier order.
    pub fn insert(&self, document: Document) {
        let mut documents = self.snapshot();
        documents.push(document);
        self.replace(documents);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Document> {
        match self.documents.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn matching(&self, query: &DocumentQuery) -> Vec<Document> {
        self.snapshot()
            .into_iter()
            .filter(|d| query.matches(d))
            .collect()
    }
}

impl QueryFacade for MemoryIndex {
    fn list_documents(
        &self,
        query: &DocumentQuery,
        first_row: u64,
        page_size: u64,
    ) -> Result<DocumentPage, QueryError> {
        let matching = self.matching(query);
        let total_hits = matching.len() as u64;
        let documents = matching
            .into_iter()
            .skip(usize::try_from(first_row).unwrap_or(usize::MAX))
            .take(usize::try_from(page_size).unwrap_or(usize::MAX))
            .collect();

        Ok(DocumentPage {
            documents,
            total_hits,
        })
    }

    fn get_document(&self, identifier: &str) -> Result<Option<Document>, QueryError> {
        Ok(self
            .snapshot()
            .into_iter()
            .find(|d| d.pi() == Some(identifier)))
    }

    fn count_documents(&self, query: &DocumentQuery) -> Result<u64, QueryError> {
        Ok(self.matching(query).len() as u64)
    }

    fn count_values(&self, query: &DocumentQuery, field: &str) -> Result<u64, QueryError> {
        Ok(self
            .matching(query)
            .iter()
            .map(|d| d.values(field).len() as u64)
            .sum())
    }

    fn distinct_values(&self, field: &str) -> Result<Vec<String>, QueryError> {
        let values: BTreeSet<String> = self
            .snapshot()
            .iter()
            .flat_map(|d| d.values(field).to_vec())
            .collect();
        Ok(values.into_iter().collect())
    }

    fn earliest_timestamp(&self) -> Result<Option<i64>, QueryError> {
        Ok(self
            .snapshot()
            .iter()
            .flat_map(|d| d.values(fields::DATE_UPDATED).to_vec())
            .filter_map(|v| v.parse::<i64>().ok())
            .min())
    }
}
