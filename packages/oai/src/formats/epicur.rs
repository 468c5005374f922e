//! URN resolver registration records (`epicur`).

use super::{schema_location, FormatContext, MetadataFormat, RenderError, XSI_NAMESPACE};
use crate::index::{fields, Clause, Document};
use crate::request::MetadataPrefix;
use crate::xml::XmlBuilder;

const NAMESPACE: &str = "urn:nbn:de:1111-2004033116";
const SCHEMA: &str = "http://www.persistent-identifier.de/xepicur/version1.0/xepicur.xsd";

pub struct Epicur {
    ctx: FormatContext,
}

impl Epicur {
    pub fn new(ctx: FormatContext) -> Self {
        Self { ctx }
    }
}

impl MetadataFormat for Epicur {
    fn prefix(&self) -> MetadataPrefix {
        MetadataPrefix::Epicur
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

    fn format_clauses(&self) -> Vec<Clause> {
        vec![Clause::exists(fields::URN)]
    }

    fn render(&self, document: &Document, _version: Option<&str>) -> Result<String, RenderError> {
        let pi = document.pi().ok_or(RenderError::MissingField(fields::PI))?;
        let urn = document
            .first(fields::URN)
            .ok_or(RenderError::MissingField(fields::URN))?;
        let location = schema_location(self);

        let mut xml = XmlBuilder::new();
        xml.start(
            "epicur",
            &[
                ("xmlns", NAMESPACE),
                ("xmlns:xsi", XSI_NAMESPACE),
                ("xsi:schemaLocation", location.as_str()),
            ],
        )?;
        xml.start("administrative_data", &[])?;
        xml.start("delivery", &[])?;
        xml.empty("update_status", &[("type", "urn_new")])?;
        xml.end()?;
        xml.end()?;

        xml.start("record", &[])?;
        xml.text_element_with("identifier", &[("scheme", "urn:nbn:de")], urn)?;
        if let Some(url) = self.ctx.record_url_for(pi) {
            xml.start("resource", &[])?;
            xml.text_element_with(
                "identifier",
                &[
                    ("scheme", "url"),
                    ("type", "frontpage"),
                    ("role", "primary"),
                    ("origin", "original"),
                ],
                &url,
            )?;
            xml.text_element_with("format", &[("scheme", "imt")], "text/html")?;
            xml.end()?;
        }
        xml.end()?;

        xml.end()?;
        Ok(xml.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::formats::{HarvestFilter, PageWindow};
    use crate::index::MemoryIndex;

    #[test]
    fn test_only_documents_with_urn_are_listed() {
        let index = MemoryIndex::new(vec![
            Document::new()
                .with(fields::PI, "A")
                .with(fields::DATE_UPDATED, "1000")
                .with(fields::URN, "urn:nbn:de:a-1"),
            Document::new()
                .with(fields::PI, "B")
                .with(fields::DATE_UPDATED, "1000"),
        ]);
        let format = Epicur::new(
            FormatContext::new(Arc::new(index)).with_record_url("https://example.org/{id}"),
        );

        let page = format
            .list_records(&HarvestFilter::default(), PageWindow::first(10))
            .unwrap();
        assert_eq!(page.hits.raw_hits, 1);

        let xml = page.records[0].metadata.as_deref().unwrap();
        assert!(xml.contains(r#"<identifier scheme="urn:nbn:de">urn:nbn:de:a-1</identifier>"#));
        assert!(xml.contains(">https://example.org/A</identifier>"));
        assert!(roxmltree::Document::parse(xml).is_ok());
    }
}
