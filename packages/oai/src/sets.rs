//! OAI-PMH set hierarchy.
//!
//! Two kinds of sets are supported: static sets declared in configuration
//! with an index clause, and value sets where every distinct value of a
//! configured index field becomes a set with spec `FIELD:value`.

use serde::{Deserialize, Serialize};

use crate::index::{Clause, Document, QueryError, QueryFacade};

/// A set declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticSet {
    pub spec: String,
    pub name: String,
    /// Documents matching this clause belong to the set.
    pub query: Clause,
}

/// A set as listed by `ListSets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetDescription {
    pub spec: String,
    pub name: String,
}

/// All sets known to the repository.
#[derive(Debug, Clone, Default)]
pub struct SetCatalog {
    static_sets: Vec<StaticSet>,
    value_fields: Vec<String>,
}

impl SetCatalog {
    pub fn new(static_sets: Vec<StaticSet>, value_fields: Vec<String>) -> Self {
        Self {
            static_sets,
            value_fields,
        }
    }

    /// Whether the repository has no set hierarchy at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.static_sets.is_empty() && self.value_fields.is_empty()
    }

    /// Translate a set spec into an index clause.
    ///
    /// # Examples
    /// ```
    /// use oai_harvest::index::Clause;
    /// use oai_harvest::sets::SetCatalog;
    ///
    /// let sets = SetCatalog::new(Vec::new(), vec!["DOCSTRCT".to_string()]);
    /// assert_eq!(
    ///     sets.resolve("DOCSTRCT:monograph"),
    ///     Some(Clause::equals("DOCSTRCT", "monograph"))
    /// );
    /// assert_eq!(sets.resolve("LANG:de"), None);
    /// ```
    #[must_use]
    pub fn resolve(&self, spec: &str) -> Option<Clause> {
        if let Some(set) = self.static_sets.iter().find(|s| s.spec == spec) {
            return Some(set.query.clone());
        }

        let (field, value) = spec.split_once(':')?;
        if value.is_empty() || !self.value_fields.iter().any(|f| f == field) {
            return None;
        }
        Some(Clause::equals(field, value))
    }

    /// Specs of every set the document belongs to.
    #[must_use]
    pub fn set_specs_for(&self, document: &Document) -> Vec<String> {
        let mut specs: Vec<String> = self
            .static_sets
            .iter()
            .filter(|s| s.query.matches(document))
            .map(|s| s.spec.clone())
            .collect();

        for field in &self.value_fields {
            specs.extend(document.values(field).iter().map(|v| format!("{field}:{v}")));
        }
        specs
    }

    /// List every set: static sets first, then value sets per field.
    pub fn list(&self, index: &dyn QueryFacade) -> Result<Vec<SetDescription>, QueryError> {
        let mut sets: Vec<SetDescription> = self
            .static_sets
            .iter()
            .map(|s| SetDescription {
                spec: s.spec.clone(),
                name: s.name.clone(),
            })
            .collect();

        for field in &self.value_fields {
            for value in index.distinct_values(field)? {
                sets.push(SetDescription {
                    spec: format!("{field}:{value}"),
                    name: value,
                });
            }
        }
        Ok(sets)
    }
}
