//! Europeana Semantic Elements (`ese`).

use super::dublin_core::write_dc_elements;
use super::{
    schema_location, FormatContext, MetadataFormat, RenderError, DC_NAMESPACE, XSI_NAMESPACE,
};
use crate::index::{fields, Clause, Document};
use crate::request::MetadataPrefix;
use crate::xml::XmlBuilder;

const NAMESPACE: &str = "http://www.europeana.eu/schemas/ese/";
const SCHEMA: &str = "http://www.europeana.eu/schemas/ese/ESE-V3.4.xsd";
const DCTERMS_NAMESPACE: &str = "http://purl.org/dc/terms/";

/// Europeana resource type for everything this repository holds.
const EUROPEANA_TYPE: &str = "TEXT";

pub struct Ese {
    ctx: FormatContext,
}

impl Ese {
    pub fn new(ctx: FormatContext) -> Self {
        Self { ctx }
    }
}

impl MetadataFormat for Ese {
    fn prefix(&self) -> MetadataPrefix {
        MetadataPrefix::Ese
    }

    fn schema(&self) -> &'static str {
        SCHEMA
    }

    fn namespace(&self) -> &'static str {
        NAMESPACE
    }

    fn context(&self) -> &FormatContext {
        &self.ctx
    }

    /// Europeana requires a title.
    fn format_clauses(&self) -> Vec<Clause> {
        vec![Clause::exists(fields::TITLE)]
    }

    fn render(&self, document: &Document, _version: Option<&str>) -> Result<String, RenderError> {
        let pi = document.pi().ok_or(RenderError::MissingField(fields::PI))?;
        let location = schema_location(self);

        let mut xml = XmlBuilder::new();
        xml.start(
            "europeana:record",
            &[
                ("xmlns:europeana", NAMESPACE),
                ("xmlns:dc", DC_NAMESPACE),
                ("xmlns:dcterms", DCTERMS_NAMESPACE),
                ("xmlns:xsi", XSI_NAMESPACE),
                ("xsi:schemaLocation", location.as_str()),
            ],
        )?;
        write_dc_elements(&mut xml, &self.ctx, document)?;
        xml.text_element("europeana:provider", &self.ctx.repository_name)?;
        xml.text_element("europeana:type", EUROPEANA_TYPE)?;
        xml.text_element("europeana:dataProvider", &self.ctx.repository_name)?;
        if let Some(url) = self.ctx.record_url_for(pi) {
            xml.text_element("europeana:isShownAt", &url)?;
        }
        xml.end()?;
        Ok(xml.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::index::MemoryIndex;

    #[test]
    fn test_render_adds_europeana_elements() {
        let mut ctx = FormatContext::new(Arc::new(MemoryIndex::default()))
            .with_record_url("https://example.org/{id}");
        ctx.repository_name = "Example Library".to_string();
        let document = Document::new()
            .with(fields::PI, "PPN9")
            .with(fields::TITLE, "Atlas");

        let xml = Ese::new(ctx).render(&document, None).unwrap();

        assert!(xml.contains("<dc:title>Atlas</dc:title>"));
        assert!(xml.contains("<europeana:provider>Example Library</europeana:provider>"));
        assert!(xml.contains("<europeana:type>TEXT</europeana:type>"));
        assert!(xml.contains("<europeana:isShownAt>https://example.org/PPN9</europeana:isShownAt>"));
    }

    #[test]
    fn test_untitled_documents_cannot_be_disseminated() {
        let format = Ese::new(FormatContext::new(Arc::new(MemoryIndex::default())));
        assert!(!format.can_disseminate(&Document::new().with(fields::PI, "X")));
        assert!(format.can_disseminate(
            &Document::new()
                .with(fields::PI, "X")
                .with(fields::TITLE, "T")
        ));
    }
}
