//! Schema-less rendering of a WBXML stream as XML, for logs and debugging.

use std::io::{BufRead, Cursor};

use quick_xml::{
  events::{BytesEnd, BytesStart, BytesText, Event},
  Writer,
};

use crate::{
  decode::Decoder,
  error::WbxmlError,
  token::{Tag, CONTENT_MASK, END, PAGE_MASK, STR_I, SWITCH_PAGE},
};

/// Renders a WBXML document as an XML string with generated `T<page>_<id>`
/// element names.
pub fn to_xml<R: BufRead>(source: R) -> Result<String, WbxmlError> {
  to_xml_with(source, |_| None)
}

/// Same as [`to_xml`], resolving element names through `name_of` where it
/// returns one. Handy when the caller knows the code pages in play.
pub fn to_xml_with<R: BufRead, F>(mut source: R, name_of: F) -> Result<String, WbxmlError>
where
  F: Fn(Tag) -> Option<&'static str>,
{
  let mut decoder = Decoder::new(&mut source);
  decoder.read_prologue()?;
  let mut writer = Writer::new(Cursor::new(Vec::new()));
  let mut open: Vec<String> = Vec::new();
  loop {
    let byte = match decoder.next_byte()? {
      None if open.is_empty() => break,
      None => return Err(WbxmlError::UnexpectedEof(RENDER)),
      Some(byte) => byte,
    };
    match byte {
      SWITCH_PAGE => decoder.page = decoder.require_byte(RENDER)?,
      END => match open.pop() {
        Some(name) => {
          writer
            .write_event(Event::End(BytesEnd::borrowed(name.as_bytes())))
            .map_err(WbxmlError::Xml)?;
        }
        None => return Err(WbxmlError::UnexpectedToken(END, RENDER)),
      },
      STR_I => {
        let body = decoder.read_inline_body(RENDER)?;
        let text = String::from_utf8(body).map_err(WbxmlError::Utf8)?;
        writer
          .write_event(Event::Text(BytesText::from_plain_str(text.as_str())))
          .map_err(WbxmlError::Xml)?;
      }
      opener => {
        let tag = Tag::new(decoder.page, opener & PAGE_MASK);
        let name = match name_of(tag) {
          Some(name) => name.to_string(),
          None => format!("T{}_{:02X}", tag.page(), tag.id()),
        };
        if opener & CONTENT_MASK != 0 {
          writer
            .write_event(Event::Start(BytesStart::borrowed_name(name.as_bytes())))
            .map_err(WbxmlError::Xml)?;
          open.push(name);
        } else {
          writer
            .write_event(Event::Empty(BytesStart::borrowed_name(name.as_bytes())))
            .map_err(WbxmlError::Xml)?;
        }
      }
    }
  }
  String::from_utf8(writer.into_inner().into_inner()).map_err(WbxmlError::Utf8)
}

const RENDER: &str = "XML rendering";
