//! OAI-PMH harvesting engine.
//!
//! This crate answers OAI-PMH 2.0 requests from documents held in a search
//! index. It parses protocol requests, resolves metadata formats, pages
//! through large result sets with persisted resumption tokens and renders
//! the XML response envelope. The HTTP surface lives in a separate crate.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use oai_harvest::config::OaiConfig;
//! use oai_harvest::index::MemoryIndex;
//! use oai_harvest::token::TokenStore;
//! use oai_harvest::HarvestEngine;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let tokens = TokenStore::open(dir.path(), Duration::from_secs(60)).unwrap();
//! let engine = HarvestEngine::new(
//!     OaiConfig::default(),
//!     Arc::new(MemoryIndex::default()),
//!     Arc::new(tokens),
//! );
//!
//! let xml = engine.respond([("verb", "Identify")]).unwrap();
//! assert!(xml.contains("<protocolVersion>2.0</protocolVersion>"));
//! ```
//!
//! # Architecture
//!
//! - [`config`]: repository configuration and defaults
//! - [`date`]: `from`/`until` parsing and datestamps
//! - [`engine`]: verb dispatch and pagination
//! - [`error`]: protocol error vocabulary
//! - [`formats`]: metadata formats and the format registry
//! - [`index`]: the search index seam and its implementations
//! - [`request`]: request model and argument validation
//! - [`sets`]: set hierarchy
//! - [`token`]: resumption token persistence
//! - [`xml`]: XML helpers and the response envelope

pub mod config;
pub mod date;
pub mod engine;
pub mod error;
pub mod formats;
pub mod index;
pub mod request;
pub mod sets;
pub mod token;
pub mod xml;

pub use engine::{HarvestEngine, VerbResponse};
pub use error::{OaiError, Result};
pub use request::{MetadataPrefix, OaiRequest, Verb};
