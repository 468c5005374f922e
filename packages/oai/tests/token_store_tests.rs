//! Resumption token lifecycle against real and instrumented backends.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use oai_harvest::formats::{Cursor, HitCounts};
use oai_harvest::token::{FileBackend, TokenBackend, TokenError, TokenStore};
use oai_harvest::{MetadataPrefix, OaiRequest, Verb};
use pretty_assertions::assert_eq;

/// Counts every backend call before delegating to a file backend.
struct CountingBackend {
    inner: FileBackend,
    calls: AtomicUsize,
}

impl CountingBackend {
    fn new(dir: &std::path::Path) -> Self {
        Self {
            inner: FileBackend::new(dir).unwrap(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl TokenBackend for CountingBackend {
    fn create(&self, name: &str, contents: &[u8]) -> io::Result<()> {
        self.count();
        self.inner.create(name, contents)
    }

    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        self.count();
        self.inner.read(name)
    }

    fn delete(&self, name: &str) -> io::Result<bool> {
        self.count();
        self.inner.delete(name)
    }

    fn list(&self) -> io::Result<Vec<String>> {
        self.count();
        self.inner.list()
    }
}

fn request() -> OaiRequest {
    OaiRequest::new(Verb::ListRecords)
        .with_metadata_prefix(MetadataPrefix::Cmdi)
        .with_from("2024-01-01")
        .with_set("DOCSTRCT:monograph")
}

fn hits() -> HitCounts {
    HitCounts {
        virtual_hits: 30,
        raw_hits: 12,
    }
}

fn cursor() -> Cursor {
    Cursor {
        virtual_row: 7,
        raw_row: 3,
        version_offset: 1,
    }
}

#[test]
fn test_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = TokenStore::open(dir.path(), Duration::from_secs(3600)).unwrap();

    let created = store.try_create(hits(), cursor(), &request()).unwrap();
    let loaded = store.load(&created.name).unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.hits(), hits());
    assert_eq!(loaded.cursor(), cursor());
    assert_eq!(loaded.request, request());

    // Loading does not consume the token.
    assert_eq!(store.load(&created.name).unwrap(), created);
}

#[test]
fn test_concurrent_loads() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(TokenStore::open(dir.path(), Duration::from_secs(3600)).unwrap());
    let token = store.create(hits(), cursor(), &request());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let name = token.name.clone();
            thread::spawn(move || store.load(&name).unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), token);
    }
}

#[test]
fn test_invalid_names_never_reach_backend() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(CountingBackend::new(dir.path()));
    let store = TokenStore::new(backend.clone(), Duration::from_secs(60));

    for name in ["../../etc/passwd", "oai_1/../x", "oai_", "token", "oai_1.json"] {
        assert!(matches!(
            store.load(name),
            Err(TokenError::InvalidName(_))
        ));
        assert!(matches!(
            store.purge(name),
            Err(TokenError::InvalidName(_))
        ));
    }
    assert_eq!(backend.calls(), 0);

    assert!(matches!(store.load("oai_1"), Err(TokenError::NotFound(_))));
    assert_eq!(backend.calls(), 1);
}

#[test]
fn test_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FileBackend::new(dir.path()).unwrap());
    let store = TokenStore::new(backend.clone(), Duration::from_secs(60));

    let live = store.create(hits(), cursor(), &request());
    backend.create("oai_1", b"garbage").unwrap();

    // Only the corrupt entry goes while the token is live.
    assert_eq!(store.sweep_at(Utc::now()), 1);
    assert_eq!(backend.list().unwrap(), vec![live.name.clone()]);
    assert!(store.load(&live.name).is_ok());

    assert_eq!(store.sweep_at(live.expires_at - TimeDelta::seconds(1)), 0);
    assert_eq!(store.sweep_at(live.expires_at), 1);
    assert!(backend.list().unwrap().is_empty());
}

#[test]
fn test_token_with_foreign_name_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FileBackend::new(dir.path()).unwrap());
    let store = TokenStore::new(backend.clone(), Duration::from_secs(60));

    let token = store.create(hits(), cursor(), &request());
    let contents = backend.read(&token.name).unwrap().unwrap();
    backend.create("oai_2", &contents).unwrap();

    assert!(matches!(
        store.load("oai_2"),
        Err(TokenError::Corrupt { .. })
    ));
}

#[test]
fn test_purge() {
    let dir = tempfile::tempdir().unwrap();
    let store = TokenStore::open(dir.path(), Duration::from_secs(60)).unwrap();
    let token = store.create(hits(), cursor(), &request());

    assert!(store.purge(&token.name).unwrap());
    assert!(!store.purge(&token.name).unwrap());
    assert!(matches!(
        store.load(&token.name),
        Err(TokenError::NotFound(_))
    ));
}

#[test]
fn test_sweep_removes_abandoned_writes() {
    let dir = tempfile::tempdir().unwrap();
    let lifetime = Duration::from_secs(60);
    let store = TokenStore::open(dir.path(), lifetime).unwrap();
    let token = store.create(hits(), cursor(), &request());
    let partial = dir.path().join(".oai_7.999.0.tmp");
    std::fs::write(&partial, "{\"schema_ver").unwrap();

    // A write in progress is left alone.
    assert_eq!(store.sweep_at(Utc::now()), 0);
    assert!(partial.exists());

    let much_later = Utc::now() + TimeDelta::seconds(120);
    assert_eq!(store.sweep_at(much_later), 1);
    assert!(!partial.exists());
    assert!(matches!(
        store.load(&token.name),
        Err(TokenError::NotFound(_))
    ));
}
