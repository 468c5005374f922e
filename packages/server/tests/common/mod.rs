#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use oai_harvest::config::OaiConfig;
use oai_harvest::index::{fields, Document, MemoryIndex};
use oai_harvest::token::TokenStore;
use oai_harvest::HarvestEngine;
use oai_server::{router, AppState};
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub tokens: Arc<TokenStore>,
    // Keeps the token directory alive for the duration of the test
    _token_dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new(count: usize, yaml: &str) -> Self {
        let token_dir = tempfile::tempdir().unwrap();
        let config = OaiConfig::from_yaml_str(yaml).unwrap();
        let tokens =
            Arc::new(TokenStore::open(token_dir.path(), config.token_lifetime()).unwrap());
        let documents = (0..count)
            .map(|i| {
                Document::new()
                    .with(fields::PI, format!("PPN{i:03}"))
                    .with(fields::DATE_UPDATED, (1_704_067_200_000 + i as i64).to_string())
                    .with(fields::TITLE, format!("Record {i}"))
            })
            .collect();
        let engine = HarvestEngine::new(
            config,
            Arc::new(MemoryIndex::new(documents)),
            Arc::clone(&tokens),
        );

        Self {
            router: router(AppState::new(engine)),
            tokens,
            _token_dir: token_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Option<String>, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Option<String>, String) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }
}

/// Text of the first element with the given local name.
pub fn element_text(xml: &str, name: &str) -> Option<String> {
    let doc = roxmltree::Document::parse(xml).unwrap();
    doc.descendants()
        .find(|n| n.has_tag_name(name))
        .and_then(|n| n.text().map(str::to_string))
}
