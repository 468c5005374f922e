//! Unqualified Dublin Core (`oai_dc`).

use super::{
    schema_location, FormatContext, MetadataFormat, RenderError, DC_NAMESPACE, XSI_NAMESPACE,
};
use crate::index::{fields, Document};
use crate::request::MetadataPrefix;
use crate::xml::{XmlBuilder, XmlError};

const NAMESPACE: &str = "http://www.openarchives.org/OAI/2.0/oai_dc/";
const SCHEMA: &str = "http://www.openarchives.org/OAI/2.0/oai_dc.xsd";

/// Dublin Core element per index field, in output order.
const ELEMENTS: &[(&str, &str)] = &[
    ("dc:title", fields::TITLE),
    ("dc:creator", fields::CREATOR),
    ("dc:subject", fields::SUBJECT),
    ("dc:description", fields::DESCRIPTION),
    ("dc:publisher", fields::PUBLISHER),
    ("dc:date", fields::YEAR_PUBLISHED),
    ("dc:type", fields::DOC_STRUCT),
    ("dc:language", fields::LANGUAGE),
    ("dc:rights", fields::RIGHTS),
];

pub struct DublinCore {
    ctx: FormatContext,
}

impl DublinCore {
    pub fn new(ctx: FormatContext) -> Self {
        Self { ctx }
    }
}

impl MetadataFormat for DublinCore {
    fn prefix(&self) -> MetadataPrefix {
        MetadataPrefix::OaiDc
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

    fn render(&self, document: &Document, _version: Option<&str>) -> Result<String, RenderError> {
        let location = schema_location(self);
        let mut xml = XmlBuilder::new();
        xml.start(
            "oai_dc:dc",
            &[
                ("xmlns:oai_dc", NAMESPACE),
                ("xmlns:dc", DC_NAMESPACE),
                ("xmlns:xsi", XSI_NAMESPACE),
                ("xsi:schemaLocation", location.as_str()),
            ],
        )?;
        write_dc_elements(&mut xml, &self.ctx, document)?;
        xml.end()?;
        Ok(xml.finish()?)
    }
}

/// Write the `dc:*` elements of a document, identifiers last.
pub(super) fn write_dc_elements(
    xml: &mut XmlBuilder,
    ctx: &FormatContext,
    document: &Document,
) -> Result<(), XmlError> {
    for (element, field) in ELEMENTS {
        for value in document.values(field) {
            xml.text_element(element, value)?;
        }
    }

    if let Some(url) = document.pi().and_then(|pi| ctx.record_url_for(pi)) {
        xml.text_element("dc:identifier", &url)?;
    }
    for urn in document.values(fields::URN) {
        xml.text_element("dc:identifier", urn)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::index::MemoryIndex;

    #[test]
    fn test_render_maps_fields() {
        let ctx = FormatContext::new(Arc::new(MemoryIndex::default()))
            .with_record_url("https://example.org/{id}");
        let document = Document::new()
            .with(fields::PI, "PPN1")
            .with(fields::TITLE, "Reise & Rückkehr")
            .with(fields::CREATOR, "Goethe")
            .with(fields::CREATOR, "Schiller")
            .with(fields::URN, "urn:nbn:de:1");

        let xml = DublinCore::new(ctx).render(&document, None).unwrap();

        assert!(xml.starts_with("<oai_dc:dc xmlns:oai_dc="));
        assert!(xml.contains("<dc:title>Reise &amp; Rückkehr</dc:title>"));
        assert!(xml.contains("<dc:creator>Goethe</dc:creator><dc:creator>Schiller</dc:creator>"));
        assert!(xml.contains("<dc:identifier>https://example.org/PPN1</dc:identifier>"));
        assert!(xml.contains("<dc:identifier>urn:nbn:de:1</dc:identifier>"));
        assert!(roxmltree::Document::parse(&xml).is_ok());
    }
}
