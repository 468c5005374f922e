//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use oai_harvest::config::OaiConfig;
use oai_harvest::engine::{RecordList, VerbResponse};
use oai_harvest::index::{fields, Document, MemoryIndex};
use oai_harvest::token::TokenStore;
use oai_harvest::HarvestEngine;

/// 2024-01-01T00:00:00Z
pub const JAN_2024: i64 = 1_704_067_200_000;

/// An engine over an in-memory index, with tokens in a temporary directory.
pub struct Harness {
    pub engine: HarvestEngine,
    pub index: Arc<MemoryIndex>,
    pub tokens: Arc<TokenStore>,
    pub token_dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(documents: Vec<Document>, yaml: &str) -> Self {
        let config = OaiConfig::from_yaml_str(yaml).expect("valid test configuration");
        let token_dir = tempfile::tempdir().expect("temp dir");
        let tokens = Arc::new(
            TokenStore::open(token_dir.path(), config.token_lifetime()).expect("token store"),
        );
        let index = Arc::new(MemoryIndex::new(documents));
        let engine = HarvestEngine::new(config, index.clone(), Arc::clone(&tokens));

        Self {
            engine,
            index,
            tokens,
            token_dir,
        }
    }
}

/// A document updated at `updated` (epoch milliseconds).
pub fn document(pi: &str, updated: i64) -> Document {
    Document::new()
        .with(fields::PI, pi)
        .with(fields::DATE_UPDATED, updated.to_string())
        .with(fields::TITLE, format!("Title of {pi}"))
        .with(fields::CREATOR, "Doe, Jane")
}

/// `count` documents named `D0000`, `D0001`, ...
pub fn documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| document(&format!("D{i:04}"), JAN_2024 + i as i64 * 1000))
        .collect()
}

/// Unwrap the record list of a `ListIdentifiers` or `ListRecords` response.
pub fn record_list(response: VerbResponse) -> RecordList {
    match response {
        VerbResponse::ListIdentifiers(list) | VerbResponse::ListRecords(list) => list,
        other => panic!("expected a record list, got {other:?}"),
    }
}

pub fn identifiers(list: &RecordList) -> Vec<String> {
    list.records
        .iter()
        .map(|r| r.header.identifier.clone())
        .collect()
}
