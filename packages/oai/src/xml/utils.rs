//! XML utility functions for navigating stored source documents.

use quick_xml::escape::escape;
use roxmltree::{Document, Node};

use super::XmlError;

/// The implicitly bound `xml` prefix, never re-declared.
const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Get the tag name without namespace prefix.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use oai_harvest::xml::get_tag_name;
///
/// let xml = r#"<mets:mets xmlns:mets="http://www.loc.gov/METS/"/>"#;
/// let doc = Document::parse(xml).unwrap();
/// assert_eq!(get_tag_name(doc.root_element()), "mets");
/// ```
pub fn get_tag_name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

/// Find the first element (the node itself included) with the given tag name,
/// in document order.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use oai_harvest::xml::find_descendant;
///
/// let xml = r#"<lidoWrap><lido><lidoRecID>1</lidoRecID></lido></lidoWrap>"#;
/// let doc = Document::parse(xml).unwrap();
/// assert!(find_descendant(doc.root_element(), "lido").is_some());
/// assert!(find_descendant(doc.root_element(), "mets").is_none());
/// ```
pub fn find_descendant<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
) -> Option<Node<'a, 'input>> {
    node.descendants()
        .find(|n| n.is_element() && get_tag_name(*n) == tag)
}

/// Cut the first `tag` element out of a stored document, verbatim.
///
/// The XML declaration, processing instructions and any wrapper elements are
/// dropped so the result can be embedded inside an OAI-PMH `<metadata>`
/// element. Namespaces declared on a wrapper are re-declared on the
/// extracted element.
///
/// # Examples
/// ```
/// use oai_harvest::xml::extract_element;
///
/// let xml = r#"<?xml version="1.0"?><wrap><TEI xmlns="http://www.tei-c.org/ns/1.0"><text/></TEI></wrap>"#;
/// assert_eq!(
///     extract_element(xml, "TEI").unwrap(),
///     r#"<TEI xmlns="http://www.tei-c.org/ns/1.0"><text/></TEI>"#
/// );
/// ```
pub fn extract_element(xml: &str, tag: &str) -> Result<String, XmlError> {
    let doc = Document::parse(xml)?;
    let element = find_descendant(doc.root_element(), tag).ok_or_else(|| {
        XmlError::MissingElement {
            element: tag.to_string(),
            context: get_tag_name(doc.root_element()).to_string(),
        }
    })?;

    let fragment = &xml[element.range()];
    if element == doc.root_element() {
        return Ok(fragment.to_string());
    }

    let start_tag = &fragment[..fragment.find('>').unwrap_or(fragment.len())];
    let mut declarations = String::new();
    for namespace in element.namespaces() {
        if namespace.uri() == XML_NAMESPACE {
            continue;
        }
        let attribute = match namespace.name() {
            Some(prefix) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        };
        if !start_tag.contains(&format!("{attribute}=")) {
            declarations.push_str(&format!(" {attribute}=\"{}\"", escape(namespace.uri())));
        }
    }

    let name_end = fragment
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(fragment.len());
    Ok(format!(
        "{}{declarations}{}",
        &fragment[..name_end],
        &fragment[name_end..]
    ))
}
