//! Result payload rendering.
//!
//! The operation's outcome is reported to the host as a small XML
//! document produced with `quick-xml`:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <result>
//!   <success>false</success>
//!   <detail>container-does-not-exist</detail>
//! </result>
//! ```
//!
//! Rendering is fallible on purpose: if the payload cannot be built the
//! caller must surface a distinct fatal signal instead of silently
//! dropping the response.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

/// Render the `<result>` payload.
///
/// A successful invocation carries no detail; any non-success outcome
/// carries its status token or error code in `<detail>`.
pub fn render_result(success: bool, detail: &str) -> Result<String, quick_xml::Error> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("result")))?;

    write_text_element(&mut writer, "success", if success { "true" } else { "false" })?;
    if !detail.is_empty() {
        write_text_element(&mut writer, "detail", detail)?;
    }

    writer.write_event(Event::End(BytesEnd::new("result")))?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| quick_xml::Error::Io(std::sync::Arc::new(
        std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    )))
}

/// Write `<name>text</name>` with escaping.
fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    text: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
