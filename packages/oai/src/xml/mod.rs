//! XML reading and writing.
//!
//! - [`utils`]: roxmltree helpers for stored source documents
//! - [`writer`]: a small builder over quick-xml used by the renderers
//! - [`response`]: the OAI-PMH response envelope

pub mod response;
mod utils;
mod writer;

use thiserror::Error;

pub use response::render_response;
pub use utils::{extract_element, find_descendant, get_tag_name};
pub use writer::XmlBuilder;

/// XML parsing and writing errors.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The input is not well-formed XML.
    #[error("XML parsing failed: {0}")]
    Parse(#[from] roxmltree::Error),

    /// A required element is missing.
    #[error("Missing required XML element: {element} in {context}")]
    MissingElement { element: String, context: String },

    /// Writing output failed.
    #[error("XML writing failed: {0}")]
    Write(String),
}
