//! Formats that embed a stored source document verbatim (`mets`, `lido`).

use super::source::load_source_xml;
use super::{FormatContext, MetadataFormat, RenderError};
use crate::index::{fields, Clause, Document};
use crate::request::MetadataPrefix;

/// A format served from `{data_dir}/{subdir}/{PI}.xml`.
///
/// Only documents whose source format field names this format are listed.
pub struct EmbeddedSourceFormat {
    ctx: FormatContext,
    prefix: MetadataPrefix,
    namespace: &'static str,
    schema: &'static str,
    subdir: &'static str,
    root_tag: &'static str,
    source_format: &'static str,
}

impl EmbeddedSourceFormat {
    pub fn mets(ctx: FormatContext) -> Self {
        Self {
            ctx,
            prefix: MetadataPrefix::Mets,
            namespace: "http://www.loc.gov/METS/",
            schema: "http://www.loc.gov/standards/mets/mets.xsd",
            subdir: "mets",
            root_tag: "mets",
            source_format: "METS",
        }
    }

    pub fn lido(ctx: FormatContext) -> Self {
        Self {
            ctx,
            prefix: MetadataPrefix::Lido,
            namespace: "http://www.lido-schema.org",
            schema: "http://www.lido-schema.org/schema/v1.0/lido-v1.0.xsd",
            subdir: "lido",
            root_tag: "lido",
            source_format: "LIDO",
        }
    }
}

impl MetadataFormat for EmbeddedSourceFormat {
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

    fn format_clauses(&self) -> Vec<Clause> {
        vec![Clause::equals(fields::SOURCE_FORMAT, self.source_format)]
    }

    fn render(&self, document: &Document, _version: Option<&str>) -> Result<String, RenderError> {
        let pi = document.pi().ok_or(RenderError::MissingField(fields::PI))?;
        let file = format!("{pi}.xml");
        load_source_xml(&self.ctx.data_dir, self.subdir, &[file.as_str()], self.root_tag)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use super::*;
    use crate::formats::{HarvestFilter, PageWindow};
    use crate::index::MemoryIndex;

    fn doc(pi: &str, source_format: &str) -> Document {
        Document::new()
            .with(fields::PI, pi)
            .with(fields::DATE_UPDATED, "1000")
            .with(fields::SOURCE_FORMAT, source_format)
    }

    #[test]
    fn test_lido_filters_by_source_format_and_unwraps() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lido")).unwrap();
        fs::write(
            dir.path().join("lido/OBJ1.xml"),
            r#"<lido:lidoWrap xmlns:lido="http://www.lido-schema.org"><lido:lido><lido:lidoRecID>1</lido:lidoRecID></lido:lido></lido:lidoWrap>"#,
        )
        .unwrap();

        let index = MemoryIndex::new(vec![doc("OBJ1", "LIDO"), doc("PPN1", "METS")]);
        let format =
            EmbeddedSourceFormat::lido(FormatContext::new(Arc::new(index)).with_data_dir(dir.path()));

        let page = format
            .list_records(&HarvestFilter::default(), PageWindow::first(10))
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(
            page.records[0].metadata.as_deref(),
            Some(
                r#"<lido:lido xmlns:lido="http://www.lido-schema.org"><lido:lidoRecID>1</lido:lidoRecID></lido:lido>"#
            )
        );
    }

    #[test]
    fn test_missing_file_skips_record_but_consumes_row() {
        let dir = tempfile::tempdir().unwrap();
        let index = MemoryIndex::new(vec![doc("PPN1", "METS")]);
        let format =
            EmbeddedSourceFormat::mets(FormatContext::new(Arc::new(index)).with_data_dir(dir.path()));

        let page = format
            .list_records(&HarvestFilter::default(), PageWindow::first(10))
            .unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.next.raw_row, 1);
        assert!(!page.has_more());
    }
}
