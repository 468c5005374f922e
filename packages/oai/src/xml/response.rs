//! OAI-PMH response envelope.

use chrono::{DateTime, Utc};

use super::{XmlBuilder, XmlError};
use crate::date::DATESTAMP_FORMAT;
use crate::engine::{
    FormatDescription, RecordList, RepositoryIdentity, ResumptionElement, VerbResponse,
};
use crate::error::Result;
use crate::formats::{OaiRecord, RecordHeader, XSI_NAMESPACE};
use crate::request::OaiRequest;
use crate::sets::SetDescription;

pub const OAI_NAMESPACE: &str = "http://www.openarchives.org/OAI/2.0/";
pub const OAI_SCHEMA: &str = "http://www.openarchives.org/OAI/2.0/OAI-PMH.xsd";

/// Render a complete response document.
///
/// `request` is `None` when the request could not be parsed at all; the
/// `<request>` element then only carries the base URL. Arguments are also
/// withheld for `badVerb` and `badArgument` errors.
pub fn render_response(
    base_url: &str,
    response_date: DateTime<Utc>,
    request: Option<&OaiRequest>,
    outcome: &Result<VerbResponse>,
) -> std::result::Result<String, XmlError> {
    let schema_location = format!("{OAI_NAMESPACE} {OAI_SCHEMA}");
    let mut xml = XmlBuilder::new();
    xml.decl()?.start(
        "OAI-PMH",
        &[
            ("xmlns", OAI_NAMESPACE),
            ("xmlns:xsi", XSI_NAMESPACE),
            ("xsi:schemaLocation", schema_location.as_str()),
        ],
    )?;
    xml.text_element(
        "responseDate",
        &response_date.format(DATESTAMP_FORMAT).to_string(),
    )?;

    let echo = match (request, outcome) {
        (Some(request), Ok(_)) => request.echo_attributes(),
        (Some(request), Err(e)) if e.echoes_arguments() => request.echo_attributes(),
        _ => Vec::new(),
    };
    let echo: Vec<(&str, &str)> = echo.iter().map(|(k, v)| (*k, v.as_str())).collect();
    xml.text_element_with("request", &echo, base_url)?;

    match outcome {
        Ok(response) => write_verb(&mut xml, response)?,
        Err(e) => {
            xml.text_element_with("error", &[("code", e.code())], &e.to_string())?;
        }
    }

    xml.end()?;
    xml.finish()
}

fn write_verb(xml: &mut XmlBuilder, response: &VerbResponse) -> std::result::Result<(), XmlError> {
    match response {
        VerbResponse::Identify(identity) => write_identify(xml, identity),
        VerbResponse::ListMetadataFormats(formats) => write_formats(xml, formats),
        VerbResponse::ListSets(sets) => write_sets(xml, sets),
        VerbResponse::ListIdentifiers(list) => write_list(xml, "ListIdentifiers", list, false),
        VerbResponse::ListRecords(list) => write_list(xml, "ListRecords", list, true),
        VerbResponse::GetRecord(record) => {
            xml.start("GetRecord", &[])?;
            write_record(xml, record)?;
            xml.end()?;
            Ok(())
        }
    }
}

fn write_identify(
    xml: &mut XmlBuilder,
    identity: &RepositoryIdentity,
) -> std::result::Result<(), XmlError> {
    xml.start("Identify", &[])?
        .text_element("repositoryName", &identity.repository_name)?
        .text_element("baseURL", &identity.base_url)?
        .text_element("protocolVersion", identity.protocol_version)?
        .text_element("adminEmail", &identity.admin_email)?
        .text_element("earliestDatestamp", &identity.earliest_datestamp)?
        .text_element("deletedRecord", identity.deleted_record.as_ref())?
        .text_element("granularity", identity.granularity)?
        .end()?;
    Ok(())
}

fn write_formats(
    xml: &mut XmlBuilder,
    formats: &[FormatDescription],
) -> std::result::Result<(), XmlError> {
    xml.start("ListMetadataFormats", &[])?;
    for format in formats {
        xml.start("metadataFormat", &[])?
            .text_element("metadataPrefix", format.prefix.as_ref())?
            .text_element("schema", format.schema)?
            .text_element("metadataNamespace", format.namespace)?
            .end()?;
    }
    xml.end()?;
    Ok(())
}

fn write_sets(xml: &mut XmlBuilder, sets: &[SetDescription]) -> std::result::Result<(), XmlError> {
    xml.start("ListSets", &[])?;
    for set in sets {
        xml.start("set", &[])?
            .text_element("setSpec", &set.spec)?
            .text_element("setName", &set.name)?
            .end()?;
    }
    xml.end()?;
    Ok(())
}

fn write_list(
    xml: &mut XmlBuilder,
    verb: &str,
    list: &RecordList,
    full_records: bool,
) -> std::result::Result<(), XmlError> {
    xml.start(verb, &[])?;
    for record in &list.records {
        if full_records {
            write_record(xml, record)?;
        } else {
            write_header(xml, &record.header)?;
        }
    }
    if let Some(resumption) = &list.resumption {
        write_resumption(xml, resumption)?;
    }
    xml.end()?;
    Ok(())
}

fn write_record(xml: &mut XmlBuilder, record: &OaiRecord) -> std::result::Result<(), XmlError> {
    xml.start("record", &[])?;
    write_header(xml, &record.header)?;
    if let Some(metadata) = &record.metadata {
        xml.start("metadata", &[])?.raw(metadata)?.end()?;
    }
    xml.end()?;
    Ok(())
}

fn write_header(xml: &mut XmlBuilder, header: &RecordHeader) -> std::result::Result<(), XmlError> {
    let attrs: &[(&str, &str)] = if header.deleted {
        &[("status", "deleted")]
    } else {
        &[]
    };
    xml.start("header", attrs)?
        .text_element("identifier", &header.identifier)?
        .text_element("datestamp", &header.datestamp)?;
    for spec in &header.set_specs {
        xml.text_element("setSpec", spec)?;
    }
    xml.end()?;
    Ok(())
}

fn write_resumption(
    xml: &mut XmlBuilder,
    resumption: &ResumptionElement,
) -> std::result::Result<(), XmlError> {
    let size = resumption.complete_list_size.to_string();
    let cursor = resumption.cursor.to_string();
    let mut attrs: Vec<(&str, &str)> = Vec::new();
    if let Some(expiration) = &resumption.expiration_date {
        attrs.push(("expirationDate", expiration.as_str()));
    }
    attrs.push(("completeListSize", size.as_str()));
    attrs.push(("cursor", cursor.as_str()));

    match &resumption.token {
        Some(token) => xml.text_element_with("resumptionToken", &attrs, token)?,
        None => xml.empty("resumptionToken", &attrs)?,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeletedRecordPolicy;
    use crate::error::OaiError;
    use crate::request::Verb;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
    }

    fn header(identifier: &str, deleted: bool) -> RecordHeader {
        RecordHeader {
            identifier: identifier.to_string(),
            datestamp: "2024-01-01T00:00:00Z".to_string(),
            set_specs: vec!["DOCSTRCT:monograph".to_string()],
            deleted,
        }
    }

    fn render(request: Option<&OaiRequest>, outcome: Result<VerbResponse>) -> String {
        render_response("https://example.org/oai", date(), request, &outcome).unwrap()
    }

    #[test]
    fn test_identify_document() {
        let identity = RepositoryIdentity {
            repository_name: "Example".to_string(),
            base_url: "https://example.org/oai".to_string(),
            protocol_version: "2.0",
            admin_email: "admin@example.org".to_string(),
            earliest_datestamp: "1970-01-01T00:00:00Z".to_string(),
            deleted_record: DeletedRecordPolicy::Persistent,
            granularity: "YYYY-MM-DDThh:mm:ssZ",
        };
        let request = OaiRequest::new(Verb::Identify);
        let xml = render(Some(&request), Ok(VerbResponse::Identify(identity)));

        let doc = roxmltree::Document::parse(&xml).unwrap();
        let root = doc.root_element();
        assert_eq!(root.tag_name().namespace(), Some(OAI_NAMESPACE));
        assert!(xml.contains("<responseDate>2024-05-06T07:08:09Z</responseDate>"));
        assert!(xml.contains(r#"<request verb="Identify">https://example.org/oai</request>"#));
        assert!(xml.contains("<deletedRecord>persistent</deletedRecord>"));
    }

    #[test]
    fn test_bad_argument_does_not_echo() {
        let request = OaiRequest::new(Verb::GetRecord).with_metadata_prefix(
            crate::request::MetadataPrefix::OaiDc,
        );
        let xml = render(
            Some(&request),
            Err(OaiError::BadArgument("Missing required argument: identifier".to_string())),
        );
        assert!(xml.contains("<request>https://example.org/oai</request>"));
        assert!(xml.contains(
            r#"<error code="badArgument">Missing required argument: identifier</error>"#
        ));
    }

    #[test]
    fn test_other_errors_echo_arguments() {
        let request = OaiRequest::new(Verb::ListRecords).with_resumption_token("oai_1");
        let xml = render(Some(&request), Err(OaiError::BadResumptionToken));
        assert!(xml.contains(r#"<request verb="ListRecords" resumptionToken="oai_1">"#));
        assert!(xml.contains(r#"code="badResumptionToken""#));
    }

    #[test]
    fn test_record_list_with_token() {
        let list = RecordList {
            records: vec![
                OaiRecord {
                    header: header("oai:x:A", false),
                    metadata: Some("<dc>A</dc>".to_string()),
                },
                OaiRecord {
                    header: header("oai:x:B", true),
                    metadata: None,
                },
            ],
            resumption: Some(ResumptionElement {
                token: Some("oai_17".to_string()),
                expiration_date: Some("2024-05-09T07:08:09Z".to_string()),
                complete_list_size: 5,
                cursor: 2,
            }),
        };
        let xml = render(None, Ok(VerbResponse::ListRecords(list)));

        assert!(xml.contains("<metadata><dc>A</dc></metadata>"));
        assert!(xml.contains(r#"<record><header status="deleted"><identifier>oai:x:B</identifier>"#));
        assert!(xml.contains(
            r#"<resumptionToken expirationDate="2024-05-09T07:08:09Z" completeListSize="5" cursor="2">oai_17</resumptionToken>"#
        ));
    }

    #[test]
    fn test_last_page_has_empty_token() {
        let list = RecordList {
            records: vec![OaiRecord {
                header: header("oai:x:C", false),
                metadata: None,
            }],
            resumption: Some(ResumptionElement {
                token: None,
                expiration_date: None,
                complete_list_size: 3,
                cursor: 3,
            }),
        };
        let xml = render(None, Ok(VerbResponse::ListIdentifiers(list)));

        assert!(xml.contains("<ListIdentifiers><header><identifier>oai:x:C</identifier>"));
        assert!(xml.contains(r#"<resumptionToken completeListSize="3" cursor="3"/>"#));
        assert!(!xml.contains("<record>"));
    }
}
