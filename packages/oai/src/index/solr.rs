//! Blocking client for a Solr-style `/select` endpoint.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use url::Url;

use super::{fields, Clause, Document, DocumentPage, DocumentQuery, QueryError, QueryFacade};

/// User agent string identifying this client.
const USER_AGENT: &str = concat!("oai-harvest/", env!("CARGO_PKG_VERSION"));

/// HTTP timeout in seconds.
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retry attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 500;

#[derive(Debug, Deserialize)]
struct SelectResponse {
    response: ResponseBody,
    #[serde(default)]
    facet_counts: Option<FacetCounts>,
    #[serde(default)]
    stats: Option<Stats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseBody {
    num_found: u64,
    #[serde(default)]
    docs: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct FacetCounts {
    #[serde(default)]
    facet_fields: std::collections::BTreeMap<String, Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct Stats {
    #[serde(default)]
    stats_fields: std::collections::BTreeMap<String, Option<FieldStats>>,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldStats {
    min: Option<f64>,
}

/// Index backed by a Solr core.
#[derive(Debug, Clone)]
pub struct SolrIndex {
    client: Client,
    select_url: Url,
}

impl SolrIndex {
    /// Create a client for the core at `core_url` (e.g. `http://solr:8983/solr/records`).
    ///
    /// Must be called outside of an async runtime, like every other method on
    /// this type.
    pub fn new(core_url: &str) -> Result<Self, QueryError> {
        let base = core_url.trim_end_matches('/');
        let select_url = Url::parse(&format!("{base}/select"))
            .map_err(|e| QueryError::Backend(format!("invalid index URL '{core_url}': {e}")))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, select_url })
    }

    /// Run a select request with retry logic.
    ///
    /// Uses exponential backoff for transient failures (network errors, 5xx
    /// responses).
    fn select(&self, params: &[(&str, String)]) -> Result<SelectResponse, QueryError> {
        let mut url = self.select_url.clone();
        url.query_pairs_mut()
            .append_pair("wt", "json")
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));

        let mut last_error: Option<String> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 500ms, 1000ms
                let delay = RETRY_BASE_DELAY_MS * (1 << (attempt - 1));
                tracing::debug!(attempt, delay_ms = delay, "Retrying index request after delay");
                thread::sleep(Duration::from_millis(delay));
            }

            match self.client.get(url.clone()).send() {
                Ok(response) => {
                    let status = response.status();

                    if status.is_server_error() {
                        tracing::warn!(
                            status = %status,
                            attempt = attempt + 1,
                            max_retries = MAX_RETRIES,
                            "Index server error, will retry"
                        );
                        last_error = Some(format!("Server error: {status}"));
                        continue;
                    }

                    if !status.is_success() {
                        let message = response.text().unwrap_or_default();
                        return Err(QueryError::Status {
                            status: status.as_u16(),
                            message,
                        });
                    }

                    let bytes = response.bytes()?;
                    return Ok(serde_json::from_slice(&bytes)?);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        tracing::warn!(
                            error = %e,
                            attempt = attempt + 1,
                            max_retries = MAX_RETRIES,
                            "Index connection error, will retry"
                        );
                        last_error = Some(e.to_string());
                        continue;
                    }
                    return Err(QueryError::Http(e));
                }
            }
        }

        Err(QueryError::RetriesExhausted {
            attempts: MAX_RETRIES,
            message: last_error.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }

    /// Value counts of `field` over the documents matching `q`.
    ///
    /// Solr returns them flattened as `[value, count, value, count, ...]`.
    fn facet(&self, q: String, field: &str) -> Result<Vec<serde_json::Value>, QueryError> {
        let response = self.select(&[
            ("q", q),
            ("rows", "0".to_string()),
            ("facet", "true".to_string()),
            ("facet.field", field.to_string()),
            ("facet.limit", "-1".to_string()),
            ("facet.mincount", "1".to_string()),
            ("facet.sort", "index".to_string()),
        ])?;

        Ok(response
            .facet_counts
            .and_then(|mut f| f.facet_fields.remove(field))
            .unwrap_or_default())
    }
}

impl QueryFacade for SolrIndex {
    fn list_documents(
        &self,
        query: &DocumentQuery,
        first_row: u64,
        page_size: u64,
    ) -> Result<DocumentPage, QueryError> {
        let response = self.select(&[
            ("q", render_query(query)),
            ("start", first_row.to_string()),
            ("rows", page_size.to_string()),
            ("sort", format!("{} asc", fields::PI)),
        ])?;

        Ok(DocumentPage {
            total_hits: response.response.num_found,
            documents: response
                .response
                .docs
                .into_iter()
                .map(Document::from_json)
                .collect(),
        })
    }

    fn get_document(&self, identifier: &str) -> Result<Option<Document>, QueryError> {
        let response = self.select(&[
            ("q", render_clause(&Clause::equals(fields::PI, identifier))),
            ("rows", "1".to_string()),
        ])?;
        Ok(response
            .response
            .docs
            .into_iter()
            .next()
            .map(Document::from_json))
    }

    fn count_documents(&self, query: &DocumentQuery) -> Result<u64, QueryError> {
        let response = self.select(&[("q", render_query(query)), ("rows", "0".to_string())])?;
        Ok(response.response.num_found)
    }

    fn count_values(&self, query: &DocumentQuery, field: &str) -> Result<u64, QueryError> {
        let counts = self.facet(render_query(query), field)?;
        Ok(counts.iter().skip(1).step_by(2).filter_map(|v| v.as_u64()).sum())
    }

    fn distinct_values(&self, field: &str) -> Result<Vec<String>, QueryError> {
        let counts = self.facet("*:*".to_string(), field)?;
        Ok(counts
            .into_iter()
            .step_by(2)
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }

    fn earliest_timestamp(&self) -> Result<Option<i64>, QueryError> {
        let response = self.select(&[
            ("q", format!("{}:*", fields::DATE_UPDATED)),
            ("rows", "0".to_string()),
            ("stats", "true".to_string()),
            ("stats.field", fields::DATE_UPDATED.to_string()),
        ])?;

        Ok(response
            .stats
            .and_then(|s| s.stats_fields.get(fields::DATE_UPDATED).cloned().flatten())
            .and_then(|f| f.min)
            .map(|min| min as i64))
    }
}

/// Render a document query as a Solr `q` parameter.
///
/// # Examples
/// ```
/// use oai_harvest::date::DateRange;
/// use oai_harvest::index::{render_query, Clause, DocumentQuery};
///
/// let query = DocumentQuery::new(DateRange { from: 0, until: 10 })
///     .with_clause(Clause::equals("DOCSTRCT", "monograph"));
/// assert_eq!(
///     render_query(&query),
///     "+(DATEUPDATED:[0 TO 10] OR DATEDELETED:[0 TO 10]) +DOCSTRCT:\"monograph\""
/// );
/// ```
pub fn render_query(query: &DocumentQuery) -> String {
    let range = format!("[{} TO {}]", query.range.from, query.range.until);
    let mut parts = vec![format!(
        "+({}:{range} OR {}:{range})",
        fields::DATE_UPDATED,
        fields::DATE_DELETED
    )];
    parts.extend(query.clauses.iter().map(|c| format!("+{}", render_clause(c))));
    parts.join(" ")
}

fn render_clause(clause: &Clause) -> String {
    match clause {
        Clause::Equals { field, value } => format!("{field}:\"{}\"", escape_phrase(value)),
        Clause::Exists { field } => format!("{field}:*"),
        Clause::Not(inner) => format!("(*:* -{})", render_clause(inner)),
        Clause::AnyOf(clauses) if clauses.is_empty() => "(-*:*)".to_string(),
        Clause::AnyOf(clauses) => format!(
            "({})",
            clauses
                .iter()
                .map(render_clause)
                .collect::<Vec<_>>()
                .join(" OR ")
        ),
    }
}

fn escape_phrase(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
