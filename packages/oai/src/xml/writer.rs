//! Streaming XML builder used by the response writer and the renderers.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::XmlError;

/// Thin wrapper over a quick-xml writer that tracks open elements.
///
/// Text and attribute values are escaped; [`XmlBuilder::raw`] writes
/// pre-serialized markup untouched.
///
/// # Examples
/// ```
/// use oai_harvest::xml::XmlBuilder;
///
/// let mut xml = XmlBuilder::new();
/// xml.start("record", &[("id", "a&b")]).unwrap();
/// xml.text_element("title", "Faust <I>").unwrap();
/// xml.end().unwrap();
/// assert_eq!(
///     xml.finish().unwrap(),
///     r#"<record id="a&amp;b"><title>Faust &lt;I&gt;</title></record>"#
/// );
/// ```
pub struct XmlBuilder {
    writer: Writer<Vec<u8>>,
    open: Vec<String>,
}

impl XmlBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
            open: Vec::new(),
        }
    }

    /// Write the `<?xml version="1.0" encoding="UTF-8"?>` declaration.
    pub fn decl(&mut self) -> Result<&mut Self, XmlError> {
        self.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    /// Open an element.
    pub fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<&mut Self, XmlError> {
        let element = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.write(Event::Start(element))?;
        self.open.push(name.to_string());
        Ok(self)
    }

    /// Close the most recently opened element.
    pub fn end(&mut self) -> Result<&mut Self, XmlError> {
        let name = self
            .open
            .pop()
            .ok_or_else(|| XmlError::Write("end() without open element".to_string()))?;
        self.write(Event::End(BytesEnd::new(name)))
    }

    /// Write `<name>text</name>`.
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, XmlError> {
        self.text_element_with(name, &[], text)
    }

    /// Write `<name attrs...>text</name>`.
    pub fn text_element_with(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> Result<&mut Self, XmlError> {
        self.start(name, attrs)?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.end()
    }

    /// Write a self-closing element.
    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<&mut Self, XmlError> {
        let element = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.write(Event::Empty(element))
    }

    /// Write already serialized markup verbatim.
    pub fn raw(&mut self, markup: &str) -> Result<&mut Self, XmlError> {
        self.write(Event::Text(BytesText::from_escaped(markup)))
    }

    /// Consume the builder and return the document.
    ///
    /// Fails if elements are still open.
    pub fn finish(self) -> Result<String, XmlError> {
        if let Some(name) = self.open.last() {
            return Err(XmlError::Write(format!("unclosed element <{name}>")));
        }
        String::from_utf8(self.writer.into_inner()).map_err(|e| XmlError::Write(e.to_string()))
    }

    fn write(&mut self, event: Event<'_>) -> Result<&mut Self, XmlError> {
        self.writer
            .write_event(event)
            .map_err(|e| XmlError::Write(e.to_string()))?;
        Ok(self)
    }
}

impl Default for XmlBuilder {
    fn default() -> Self {
        Self::new()
    }
}
