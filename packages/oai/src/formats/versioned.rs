//! Language-versioned source formats (`tei`, `cmdi`).
//!
//! Each value of the language field yields a separate OAI record with
//! identifier `{PI}_{lang}`, served from
//! `{data_dir}/{subdir}/{PI}/{PI}_{lang}.xml`.

use super::source::load_source_xml;
use super::{FormatContext, MetadataFormat, RenderError};
use crate::index::{fields, Document};
use crate::request::MetadataPrefix;

pub struct VersionedSourceFormat {
    ctx: FormatContext,
    prefix: MetadataPrefix,
    namespace: &'static str,
    schema: &'static str,
    subdir: &'static str,
    root_tag: &'static str,
    version_field: &'static str,
}

impl VersionedSourceFormat {
    pub fn tei(ctx: FormatContext) -> Self {
        Self {
            ctx,
            prefix: MetadataPrefix::Tei,
            namespace: "http://www.tei-c.org/ns/1.0",
            schema: "http://www.tei-c.org/release/xml/tei/custom/schema/xsd/tei_all.xsd",
            subdir: "tei",
            root_tag: "TEI",
            version_field: fields::TEI_LANGUAGES,
        }
    }

    pub fn cmdi(ctx: FormatContext) -> Self {
        Self {
            ctx,
            prefix: MetadataPrefix::Cmdi,
            namespace: "http://www.clarin.eu/cmd/1",
            schema: "http://www.clarin.eu/cmd/1/xsd/cmd-envelop.xsd",
            subdir: "cmdi",
            root_tag: "CMD",
            version_field: fields::CMDI_LANGUAGES,
        }
    }
}

impl MetadataFormat for VersionedSourceFormat {
    fn prefix(&self) -> MetadataPrefix {
        self.prefix
    }

    fn schema(&self) -> &'static str {
        self.schema
    }

    fn namespace(&self) -> &'static str {
        self.namespace
    }

    fn context(&self) -> &FormatContext {
        &self.ctx
    }

    fn version_field(&self) -> Option<&'static str> {
        Some(self.version_field)
    }

    fn render(&self, document: &Document, version: Option<&str>) -> Result<String, RenderError> {
        let pi = document.pi().ok_or(RenderError::MissingField(fields::PI))?;
        let language = version.ok_or(RenderError::MissingField(self.version_field))?;
        let file = format!("{pi}_{language}.xml");
        load_source_xml(
            &self.ctx.data_dir,
            self.subdir,
            &[pi, file.as_str()],
            self.root_tag,
        )
    }
}
