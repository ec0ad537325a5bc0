//! WebDAV XML for the CardDAV `addressbook-query` REPORT.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::RawContact;

/// DAV namespace
pub const DAV_NS: &str = "DAV:";
/// CardDAV namespace
pub const CARDDAV_NS: &str = "urn:ietf:params:xml:ns:carddav";

/// Builds the REPORT body asking for every vCard that has a `BDAY`:
///
/// ```xml
/// <C:addressbook-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:carddav">
///   <D:prop><D:getetag/><C:address-data/></D:prop>
///   <C:filter><C:prop-filter name="BDAY"/></C:filter>
/// </C:addressbook-query>
/// ```
pub fn addressbook_query_body() -> ProviderResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut query = BytesStart::new("C:addressbook-query");
    query.push_attribute(("xmlns:D", DAV_NS));
    query.push_attribute(("xmlns:C", CARDDAV_NS));
    write(&mut writer, Event::Start(query))?;

    write(&mut writer, Event::Start(BytesStart::new("D:prop")))?;
    write(&mut writer, Event::Empty(BytesStart::new("D:getetag")))?;
    write(&mut writer, Event::Empty(BytesStart::new("C:address-data")))?;
    write(&mut writer, Event::End(BytesEnd::new("D:prop")))?;

    write(&mut writer, Event::Start(BytesStart::new("C:filter")))?;
    let mut prop_filter = BytesStart::new("C:prop-filter");
    prop_filter.push_attribute(("name", "BDAY"));
    write(&mut writer, Event::Empty(prop_filter))?;
    write(&mut writer, Event::End(BytesEnd::new("C:filter")))?;

    write(&mut writer, Event::End(BytesEnd::new("C:addressbook-query")))?;

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| ProviderError::internal(format!("REPORT body is not UTF-8: {}", e)))
}

/// Parses a `multistatus` REPORT response into raw contacts.
///
/// Element prefixes are ignored, so any namespace binding works. Responses
/// without `address-data` (e.g. the collection itself) are skipped.
///
/// # Errors
///
/// Returns an invalid response error if the XML is not well formed.
pub fn parse_report_response(xml: &str) -> ProviderResult<Vec<RawContact>> {
    let mut contacts = Vec::new();

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut href: Option<String> = None;
    let mut etag: Option<String> = None;
    let mut data = String::new();
    let mut current: Option<Field> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            ProviderError::invalid_response(format!(
                "malformed REPORT response at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"response" => {
                        href = None;
                        etag = None;
                        data.clear();
                    }
                    b"href" => current = Some(Field::Href),
                    b"getetag" => current = Some(Field::Etag),
                    b"address-data" => current = Some(Field::AddressData),
                    _ => {}
                }
            }
            Event::End(e) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"response" {
                    if let Some(h) = href.take() {
                        if !data.trim().is_empty() {
                            contacts.push(RawContact {
                                href: h,
                                etag: etag.take(),
                                vcard: std::mem::take(&mut data),
                            });
                        }
                    }
                    data.clear();
                }
                current = None;
            }
            Event::Text(e) => {
                if let Some(field) = current {
                    let text = e.unescape().map_err(|err| {
                        ProviderError::invalid_response(format!("bad text in REPORT: {}", err))
                    })?;
                    field.store(&text, &mut href, &mut etag, &mut data);
                }
            }
            Event::CData(e) => {
                if let Some(field) = current {
                    let text = String::from_utf8_lossy(&e);
                    field.store(&text, &mut href, &mut etag, &mut data);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(contacts)
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Href,
    Etag,
    AddressData,
}

impl Field {
    fn store(
        self,
        text: &str,
        href: &mut Option<String>,
        etag: &mut Option<String>,
        data: &mut String,
    ) {
        match self {
            Self::Href => *href = Some(text.to_string()),
            Self::Etag => *etag = Some(text.trim_matches('"').to_string()),
            Self::AddressData => data.push_str(text),
        }
    }
}

fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> ProviderResult<()> {
    writer
        .write_event(event)
        .map_err(|e| ProviderError::internal(format!("failed to write REPORT body: {}", e)))
}

/// Strips a `prefix:` from an element name.
fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(i) => &name[i + 1..],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "BEGIN:VCARD\r\nVERSION:3.0\r\nUID:alice\r\nFN:Alice\r\nBDAY:1990-03-01\r\nEND:VCARD";

    #[test]
    fn query_body_shape() {
        let body = addressbook_query_body().unwrap();

        assert!(body.starts_with("<C:addressbook-query"));
        assert!(body.contains(r#"xmlns:C="urn:ietf:params:xml:ns:carddav""#));
        assert!(body.contains("<D:getetag/>"));
        assert!(body.contains("<C:address-data/>"));
        assert!(body.contains(r#"<C:prop-filter name="BDAY"/>"#));
        assert!(body.ends_with("</C:addressbook-query>"));
    }

    #[test]
    fn parses_prefixed_multistatus() {
        let xml = format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:card="urn:ietf:params:xml:ns:carddav">
  <d:response>
    <d:href>/addressbooks/alice/contacts/alice.vcf</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag>"etag-1"</d:getetag>
        <card:address-data>{}</card:address-data>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#,
            ALICE
        );

        let contacts = parse_report_response(&xml).unwrap();

        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].href, "/addressbooks/alice/contacts/alice.vcf");
        assert_eq!(contacts[0].etag.as_deref(), Some("etag-1"));
        assert!(contacts[0].vcard.contains("FN:Alice"));
    }

    #[test]
    fn parses_default_namespace_and_cdata() {
        let xml = format!(
            r#"<multistatus xmlns="DAV:">
  <response>
    <href>/ab/bob.vcf</href>
    <propstat><prop>
      <getetag>&quot;e2&quot;</getetag>
      <address-data xmlns="urn:ietf:params:xml:ns:carddav"><![CDATA[{}]]></address-data>
    </prop></propstat>
  </response>
</multistatus>"#,
            ALICE.replace("Alice", "Bob")
        );

        let contacts = parse_report_response(&xml).unwrap();

        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].etag.as_deref(), Some("e2"));
        assert!(contacts[0].vcard.starts_with("BEGIN:VCARD"));
        assert!(contacts[0].vcard.contains("FN:Bob"));
    }

    #[test]
    fn skips_responses_without_address_data() {
        let xml = r#"<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/ab/</d:href>
    <d:propstat><d:prop><d:getetag>"c"</d:getetag></d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/ab/empty.vcf</d:href>
    <d:propstat><d:prop><C:address-data xmlns:C="urn:ietf:params:xml:ns:carddav"/></d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;

        assert!(parse_report_response(xml).unwrap().is_empty());
    }

    #[test]
    fn escaped_vcard_text_is_unescaped() {
        let xml = r#"<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:carddav">
<d:response><d:href>/ab/x.vcf</d:href><d:propstat><d:prop>
<c:address-data>BEGIN:VCARD&#13;
FN:Tom &amp; Jerry&#13;
BDAY:--05-05&#13;
END:VCARD</c:address-data>
</d:prop></d:propstat></d:response></d:multistatus>"#;

        let contacts = parse_report_response(xml).unwrap();
        assert_eq!(contacts.len(), 1);
        assert!(contacts[0].vcard.contains("FN:Tom & Jerry"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let xml = "<d:multistatus xmlns:d=\"DAV:\"><d:response></d:multistatus>";
        let err = parse_report_response(xml).unwrap_err();
        assert_eq!(
            err.code(),
            crate::error::ProviderErrorCode::InvalidResponse
        );
    }

    #[test]
    fn empty_multistatus() {
        let xml = r#"<d:multistatus xmlns:d="DAV:"/>"#;
        assert!(parse_report_response(xml).unwrap().is_empty());
    }
}
