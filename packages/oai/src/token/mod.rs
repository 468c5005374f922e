//! Resumption tokens.
//!
//! A token is the persisted state of a paginated list: the hit counts of the
//! original query, the cursors to resume from and the request to replay.
//! Tokens live in a [`TokenBackend`] (one file per token for
//! [`FileBackend`]) and are managed by the [`TokenStore`].

mod backend;
mod store;

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::date::DATESTAMP_FORMAT;
use crate::formats::{Cursor, HitCounts};
use crate::request::OaiRequest;

pub use backend::{FileBackend, TokenBackend};
pub use store::TokenStore;

/// Version of the persisted token layout.
pub const TOKEN_SCHEMA_VERSION: u32 = 1;

/// Token names handed out to harvesters.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static TOKEN_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^oai_[0-9]+$").expect("valid regex"));

/// Token store errors.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The name does not match the token name pattern.
    #[error("invalid token name: '{0}'")]
    InvalidName(String),

    #[error("token not found: {0}")]
    NotFound(String),

    /// The stored payload cannot be used.
    #[error("token {name} is corrupt: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("token {name} expired at {expires_at}")]
    Expired {
        name: String,
        expires_at: DateTime<Utc>,
    },

    /// The token could not be serialized.
    #[error("failed to encode token: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("token storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validate a token name before it is used as a storage key.
///
/// # Examples
/// ```
/// use oai_harvest::token::validate_token_name;
///
/// assert!(validate_token_name("oai_1718000000000001").is_ok());
/// assert!(validate_token_name("../../etc/passwd").is_err());
/// assert!(validate_token_name("oai_").is_err());
/// ```
pub fn validate_token_name(name: &str) -> Result<(), TokenError> {
    if TOKEN_NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(TokenError::InvalidName(name.to_string()))
    }
}

/// Persisted pagination state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumptionToken {
    pub schema_version: u32,
    pub name: String,
    /// OAI records matching the original query.
    pub virtual_hits: u64,
    /// Index documents matching the original query.
    pub raw_hits: u64,
    pub virtual_cursor: u64,
    pub raw_cursor: u64,
    /// Versions of the document at `raw_cursor` already emitted.
    #[serde(default)]
    pub version_offset: u64,
    pub expires_at: DateTime<Utc>,
    /// The original request, without a resumption token.
    pub request: OaiRequest,
}

impl ResumptionToken {
    #[must_use]
    pub fn hits(&self) -> HitCounts {
        HitCounts {
            virtual_hits: self.virtual_hits,
            raw_hits: self.raw_hits,
        }
    }

    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor {
            virtual_row: self.virtual_cursor,
            raw_row: self.raw_cursor,
            version_offset: self.version_offset,
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// `expirationDate` attribute value.
    #[must_use]
    pub fn expiration_date(&self) -> String {
        self.expires_at.format(DATESTAMP_FORMAT).to_string()
    }

    /// Reason the token cannot be trusted, if any.
    fn defect(&self, expected_name: &str) -> Option<String> {
        if self.schema_version != TOKEN_SCHEMA_VERSION {
            return Some(format!("unsupported schema version {}", self.schema_version));
        }
        if self.name != expected_name {
            return Some(format!("stored under a different name ({})", self.name));
        }
        if self.virtual_cursor > self.virtual_hits || self.raw_cursor > self.raw_hits {
            return Some("cursor beyond hit count".to_string());
        }
        if !self.request.verb.is_list() {
            return Some(format!("not a list request ({})", self.request.verb));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{MetadataPrefix, Verb};
    use chrono::TimeZone;

    fn token() -> ResumptionToken {
        ResumptionToken {
            schema_version: TOKEN_SCHEMA_VERSION,
            name: "oai_1".to_string(),
            virtual_hits: 10,
            raw_hits: 5,
            virtual_cursor: 4,
            raw_cursor: 2,
            version_offset: 1,
            expires_at: Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap(),
            request: OaiRequest::new(Verb::ListRecords).with_metadata_prefix(MetadataPrefix::Tei),
        }
    }

    #[test]
    fn test_name_pattern() {
        for bad in ["", "oai_", "oai_12a", "OAI_12", " oai_1", "oai_1\n", "tokens/oai_1"] {
            assert!(
                matches!(validate_token_name(bad), Err(TokenError::InvalidName(_))),
                "{bad:?}"
            );
        }
        assert!(validate_token_name("oai_0").is_ok());
    }

    #[test]
    fn test_expiry_is_exclusive() {
        let token = token();
        assert!(!token.is_expired_at(token.expires_at - chrono::Duration::milliseconds(1)));
        assert!(token.is_expired_at(token.expires_at));
        assert_eq!(token.expiration_date(), "2030-01-02T03:04:05Z");
    }

    #[test]
    fn test_defects() {
        assert_eq!(token().defect("oai_1"), None);
        assert!(token().defect("oai_2").is_some());

        let mut beyond = token();
        beyond.raw_cursor = 6;
        assert!(beyond.defect("oai_1").is_some());

        let mut future = token();
        future.schema_version = TOKEN_SCHEMA_VERSION + 1;
        assert!(future.defect("oai_1").is_some());
    }

    #[test]
    fn test_persisted_form_without_version_offset() {
        let json = serde_json::json!({
            "schema_version": 1,
            "name": "oai_1",
            "virtual_hits": 3,
            "raw_hits": 3,
            "virtual_cursor": 1,
            "raw_cursor": 1,
            "expires_at": "2030-01-02T03:04:05Z",
            "request": {"verb": "ListIdentifiers", "metadata_prefix": "oai_dc"}
        });
        let token: ResumptionToken = serde_json::from_value(json).unwrap();
        assert_eq!(token.version_offset, 0);
        assert_eq!(token.request.metadata_prefix, Some(MetadataPrefix::OaiDc));
    }
}
