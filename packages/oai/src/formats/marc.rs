//! MARC 21 slim XML (`marcxml`).

use super::{schema_location, FormatContext, MetadataFormat, RenderError, XSI_NAMESPACE};
use crate::index::{fields, Document};
use crate::request::MetadataPrefix;
use crate::xml::{XmlBuilder, XmlError};

const NAMESPACE: &str = "http://www.loc.gov/MARC21/slim";
const SCHEMA: &str = "http://www.loc.gov/standards/marcxml/schema/MARC21slim.xsd";

/// Generic leader for a language material monograph.
const LEADER: &str = "00000nam a2200000 u 4500";

pub struct MarcXml {
    ctx: FormatContext,
}

impl MarcXml {
    pub fn new(ctx: FormatContext) -> Self {
        Self { ctx }
    }
}

impl MetadataFormat for MarcXml {
    fn prefix(&self) -> MetadataPrefix {
        MetadataPrefix::Marcxml
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
        let pi = document.pi().ok_or(RenderError::MissingField(fields::PI))?;
        let location = schema_location(self);

        let mut xml = XmlBuilder::new();
        xml.start(
            "marc:record",
            &[
                ("xmlns:marc", NAMESPACE),
                ("xmlns:xsi", XSI_NAMESPACE),
                ("xsi:schemaLocation", location.as_str()),
            ],
        )?;
        xml.text_element("marc:leader", LEADER)?;
        xml.text_element_with("marc:controlfield", &[("tag", "001")], pi)?;

        for urn in document.values(fields::URN) {
            datafield(&mut xml, "024", ('7', ' '), &[('a', urn.as_str()), ('2', "urn")])?;
        }
        for language in document.values(fields::LANGUAGE) {
            datafield(&mut xml, "041", (' ', ' '), &[('a', language.as_str())])?;
        }

        let creators = document.values(fields::CREATOR);
        if let Some((main, added)) = creators.split_first() {
            datafield(&mut xml, "100", ('1', ' '), &[('a', main.as_str())])?;
            for creator in added {
                datafield(&mut xml, "700", ('1', ' '), &[('a', creator.as_str())])?;
            }
        }

        if let Some(title) = document.first(fields::TITLE) {
            datafield(&mut xml, "245", ('0', '0'), &[('a', title)])?;
        }

        let mut imprint: Vec<(char, &str)> = Vec::new();
        if let Some(publisher) = document.first(fields::PUBLISHER) {
            imprint.push(('b', publisher));
        }
        if let Some(year) = document.first(fields::YEAR_PUBLISHED) {
            imprint.push(('c', year));
        }
        if !imprint.is_empty() {
            datafield(&mut xml, "260", (' ', ' '), &imprint)?;
        }

        for description in document.values(fields::DESCRIPTION) {
            datafield(&mut xml, "520", (' ', ' '), &[('a', description.as_str())])?;
        }
        for rights in document.values(fields::RIGHTS) {
            datafield(&mut xml, "540", (' ', ' '), &[('a', rights.as_str())])?;
        }
        for subject in document.values(fields::SUBJECT) {
            datafield(&mut xml, "650", (' ', '4'), &[('a', subject.as_str())])?;
        }
        if let Some(url) = self.ctx.record_url_for(pi) {
            datafield(&mut xml, "856", ('4', '0'), &[('u', url.as_str())])?;
        }

        xml.end()?;
        Ok(xml.finish()?)
    }
}

fn datafield(
    xml: &mut XmlBuilder,
    tag: &str,
    indicators: (char, char),
    subfields: &[(char, &str)],
) -> Result<(), XmlError> {
    let ind1 = indicators.0.to_string();
    let ind2 = indicators.1.to_string();
    xml.start(
        "marc:datafield",
        &[("tag", tag), ("ind1", ind1.as_str()), ("ind2", ind2.as_str())],
    )?;
    for (code, value) in subfields {
        let code = code.to_string();
        xml.text_element_with("marc:subfield", &[("code", code.as_str())], value)?;
    }
    xml.end()?;
    Ok(())
}
