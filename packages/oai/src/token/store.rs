//! Token lifecycle: create, load, purge and sweep.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, TimeDelta, Utc};

use super::{
    validate_token_name, FileBackend, ResumptionToken, TokenBackend, TokenError,
    TOKEN_SCHEMA_VERSION,
};
use crate::formats::{Cursor, HitCounts};
use crate::request::OaiRequest;

/// Attempts at finding an unused name before giving up.
const MAX_NAME_ATTEMPTS: u32 = 5;

/// Mints, loads and expires resumption tokens.
///
/// The store holds no per-token state in memory, so any number of requests
/// may load the same token concurrently.
pub struct TokenStore {
    backend: Arc<dyn TokenBackend>,
    lifetime: TimeDelta,
    sequence: AtomicU64,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn TokenBackend>, lifetime: Duration) -> Self {
        Self {
            backend,
            lifetime: TimeDelta::from_std(lifetime).unwrap_or(TimeDelta::MAX),
            sequence: AtomicU64::new(0),
        }
    }

    /// A store backed by token files in `dir`.
    pub fn open(dir: &Path, lifetime: Duration) -> Result<Self, TokenError> {
        let backend = FileBackend::new(dir)?;
        Ok(Self::new(Arc::new(backend), lifetime))
    }

    /// Mint and persist a token.
    ///
    /// Storage failures are logged and the token is returned anyway; the
    /// harvester will then get `badResumptionToken` on its next request.
    pub fn create(
        &self,
        hits: HitCounts,
        cursor: Cursor,
        request: &OaiRequest,
    ) -> ResumptionToken {
        let now = Utc::now();
        let mut token = self.build(now, hits, cursor, request);
        if let Err(e) = self.persist(now, &mut token) {
            tracing::error!(token = %token.name, error = %e, "Failed to store resumption token");
        }
        token
    }

    /// Mint and persist a token, reporting storage failures.
    pub fn try_create(
        &self,
        hits: HitCounts,
        cursor: Cursor,
        request: &OaiRequest,
    ) -> Result<ResumptionToken, TokenError> {
        let now = Utc::now();
        let mut token = self.build(now, hits, cursor, request);
        self.persist(now, &mut token)?;
        Ok(token)
    }

    /// Load an unexpired token.
    pub fn load(&self, name: &str) -> Result<ResumptionToken, TokenError> {
        self.load_at(name, Utc::now())
    }

    /// Load a token as of `now`.
    ///
    /// The name is validated before the backend is touched.
    pub fn load_at(&self, name: &str, now: DateTime<Utc>) -> Result<ResumptionToken, TokenError> {
        validate_token_name(name)?;
        let contents = self
            .backend
            .read(name)?
            .ok_or_else(|| TokenError::NotFound(name.to_string()))?;
        let token = decode(name, &contents)?;

        if token.is_expired_at(now) {
            return Err(TokenError::Expired {
                name: name.to_string(),
                expires_at: token.expires_at,
            });
        }
        Ok(token)
    }

    /// Delete a token; `false` if it did not exist.
    pub fn purge(&self, name: &str) -> Result<bool, TokenError> {
        validate_token_name(name)?;
        Ok(self.backend.delete(name)?)
    }

    /// Delete expired and corrupt tokens.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Delete tokens expired as of `now`, plus any that cannot be decoded.
    ///
    /// Partial writes older than the token lifetime are removed as well but
    /// not counted. Failures on individual entries are logged and skipped.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        self.remove_stale_temp(now);

        let names = match self.backend.list() {
            Ok(names) => names,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list resumption tokens");
                return 0;
            }
        };

        let mut deleted = 0;
        for name in names {
            let contents = match self.backend.read(&name) {
                Ok(Some(contents)) => contents,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(token = %name, error = %e, "Failed to read resumption token");
                    continue;
                }
            };

            let reason = match decode(&name, &contents) {
                Ok(token) if token.is_expired_at(now) => "expired",
                Ok(_) => continue,
                Err(_) => "corrupt",
            };

            match self.backend.delete(&name) {
                Ok(true) => {
                    tracing::debug!(token = %name, reason, "Deleted resumption token");
                    deleted += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(token = %name, error = %e, "Failed to delete resumption token");
                }
            }
        }

        if deleted > 0 {
            tracing::info!(deleted, "Swept resumption tokens");
        }
        deleted
    }

    fn remove_stale_temp(&self, now: DateTime<Utc>) {
        let Some(cutoff) = now.checked_sub_signed(self.lifetime) else {
            return;
        };
        match self.backend.remove_stale_temp(SystemTime::from(cutoff)) {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "Removed abandoned token writes"),
            Err(e) => tracing::warn!(error = %e, "Failed to remove abandoned token writes"),
        }
    }

    fn build(
        &self,
        now: DateTime<Utc>,
        hits: HitCounts,
        cursor: Cursor,
        request: &OaiRequest,
    ) -> ResumptionToken {
        let mut request = request.clone();
        request.resumption_token = None;

        ResumptionToken {
            schema_version: TOKEN_SCHEMA_VERSION,
            name: self.next_name(now),
            virtual_hits: hits.virtual_hits,
            raw_hits: hits.raw_hits,
            virtual_cursor: cursor.virtual_row,
            raw_cursor: cursor.raw_row,
            version_offset: cursor.version_offset,
            expires_at: now
                .checked_add_signed(self.lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            request,
        }
    }

    /// Write the token, moving to a fresh name on collision.
    fn persist(&self, now: DateTime<Utc>, token: &mut ResumptionToken) -> Result<(), TokenError> {
        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let contents = serde_json::to_vec_pretty(token)?;
            match self.backend.create(&token.name, &contents) {
                Ok(()) => {
                    tracing::debug!(token = %token.name, "Stored resumption token");
                    return Ok(());
                }
                Err(e)
                    if e.kind() == io::ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS =>
                {
                    tracing::debug!(token = %token.name, "Token name taken, retrying");
                    token.name = self.next_name(now);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(TokenError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free token name",
        )))
    }

    /// `oai_` + milliseconds since the epoch + a three digit sequence.
    fn next_name(&self, now: DateTime<Utc>) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) % 1000;
        format!("oai_{}{sequence:03}", now.timestamp_millis().max(0))
    }
}

fn decode(name: &str, contents: &[u8]) -> Result<ResumptionToken, TokenError> {
    let token: ResumptionToken =
        serde_json::from_slice(contents).map_err(|e| TokenError::Corrupt {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    if let Some(reason) = token.defect(name) {
        return Err(TokenError::Corrupt {
            name: name.to_string(),
            reason,
        });
    }
    Ok(token)
}
