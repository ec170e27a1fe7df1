//! Token-driven WBXML decoder.

use std::io::{self, BufRead, ErrorKind, Read};

use byteorder::ReadBytesExt;

use crate::{
  error::WbxmlError,
  schema::{schema_of, FieldDef, FieldKind, ItemKind, StreamOps},
  stream::InlineReader,
  token::{Tag, CONTENT_MASK, END, PAGE_MASK, STR_I, SWITCH_PAGE},
  utils,
  value::{FieldSlots, FieldValue},
  StreamableContent, WbxmlRecord,
};

pub(crate) type NestedParseFn = fn(&mut Decoder<'_>) -> Result<FieldValue, WbxmlError>;
pub(crate) type StreamReadFn = fn(&mut InlineReader<'_>) -> Result<FieldValue, WbxmlError>;

/// Parses one record from a WBXML byte stream.
///
/// The source is consumed and dropped on every exit path, successful or not.
pub fn from_reader<T: WbxmlRecord, R: BufRead>(mut source: R) -> Result<T, WbxmlError> {
  let mut decoder = Decoder::new(&mut source);
  decoder.read_prologue()?;
  parse_record::<T>(&mut decoder)
}

/// Parses one record from an in-memory WBXML document.
pub fn from_slice<T: WbxmlRecord>(bytes: &[u8]) -> Result<T, WbxmlError> {
  from_reader(bytes)
}

pub(crate) struct Decoder<'a> {
  pub(crate) source: &'a mut dyn BufRead,
  /// Active code page, shared with nested frames.
  pub(crate) page: u8,
}

impl<'a> Decoder<'a> {
  pub(crate) fn new(source: &'a mut dyn BufRead) -> Self {
    Decoder { source, page: 0 }
  }

  /// Reads the version byte and drains the public id, charset and
  /// string-table length; none of their values is interpreted.
  pub(crate) fn read_prologue(&mut self) -> Result<(), WbxmlError> {
    self.require_byte("prologue")?;
    for _ in 0..3 {
      self.read_mb_uint()?;
    }
    Ok(())
  }

  /// Multi-byte unsigned integer: 7 value bits per byte, high bit set on all
  /// but the last byte.
  fn read_mb_uint(&mut self) -> Result<u64, WbxmlError> {
    let mut value: u64 = 0;
    loop {
      let byte = self.require_byte("prologue")?;
      value = (value << 7) | u64::from(byte & 0x7F);
      if byte & 0x80 == 0 {
        return Ok(value);
      }
    }
  }

  /// Next token byte, `None` at end of stream.
  pub(crate) fn next_byte(&mut self) -> Result<Option<u8>, WbxmlError> {
    match self.source.read_u8() {
      Ok(byte) => Ok(Some(byte)),
      Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(None),
      Err(err) => Err(WbxmlError::Io(err)),
    }
  }

  pub(crate) fn require_byte(&mut self, context: &'static str) -> Result<u8, WbxmlError> {
    self.next_byte()?.ok_or(WbxmlError::UnexpectedEof(context))
  }

  /// Reads one string-element body, the content-form opener already consumed.
  ///
  /// `END` in place of `STR_I` closes the element with an empty string; no
  /// further token is read in that case.
  fn read_string_element(&mut self, context: &'static str) -> Result<String, WbxmlError> {
    match self.require_byte(context)? {
      END => Ok(String::new()),
      STR_I => {
        let body = self.read_inline_body(context)?;
        self.expect_end(context)?;
        String::from_utf8(body).map_err(WbxmlError::Utf8)
      }
      token => Err(WbxmlError::UnexpectedToken(token, context)),
    }
  }

  /// Buffers the bytes between `STR_I` and the terminator.
  pub(crate) fn read_inline_body(&mut self, context: &'static str) -> Result<Vec<u8>, WbxmlError> {
    let mut body = Vec::new();
    InlineReader::new(&mut *self.source)
      .read_to_end(&mut body)
      .map_err(|err| io_to_eof(err, context))?;
    Ok(body)
  }

  /// Discards an inline string without buffering it.
  fn drain_inline(&mut self, context: &'static str) -> Result<(), WbxmlError> {
    InlineReader::new(&mut *self.source)
      .finish()
      .map_err(|err| io_to_eof(err, context))
  }

  pub(crate) fn expect_end(&mut self, context: &'static str) -> Result<(), WbxmlError> {
    match self.require_byte(context)? {
      END => Ok(()),
      token => Err(WbxmlError::UnexpectedToken(token, context)),
    }
  }

  /// Discards a balanced element whose content-form opener has already been
  /// read. Page switches inside the subtree update the shared active page.
  pub(crate) fn skip_element(&mut self, context: &'static str) -> Result<(), WbxmlError> {
    let mut depth = 1usize;
    while depth > 0 {
      match self.require_byte(context)? {
        SWITCH_PAGE => self.page = self.require_byte(context)?,
        END => depth -= 1,
        STR_I => self.drain_inline(context)?,
        token if token & CONTENT_MASK != 0 => depth += 1,
        _ => {}
      }
    }
    Ok(())
  }
}

/// The token loop: dispatches known tags to their kind readers, skips unknown
/// subtrees, and invokes the constructor hook when the frame closes.
///
/// End of stream between elements closes the frame like `END`; whatever slots
/// have been filled are handed to the constructor.
pub(crate) fn parse_record<T: WbxmlRecord>(decoder: &mut Decoder<'_>) -> Result<T, WbxmlError> {
  let schema = schema_of::<T>()?;
  let mut slots = FieldSlots::new(schema.name(), schema.len());
  loop {
    let byte = match decoder.next_byte()? {
      None => return T::from_fields(slots),
      Some(byte) => byte,
    };
    match byte {
      SWITCH_PAGE => decoder.page = decoder.require_byte(schema.name())?,
      END => return T::from_fields(slots),
      STR_I => return Err(WbxmlError::UnexpectedToken(STR_I, schema.name())),
      opener => {
        let has_content = opener & CONTENT_MASK != 0;
        let tag = Tag::new(decoder.page, opener & PAGE_MASK);
        match schema.entry_for(tag) {
          Some(def) => read_field(decoder, schema.name(), *def, &mut slots, has_content)?,
          None => {
            utils::discard_unknown_tag(tag, schema.name());
            if has_content {
              decoder.skip_element(schema.name())?;
            }
          }
        }
      }
    }
  }
}

fn read_field(
  decoder: &mut Decoder<'_>,
  record: &'static str,
  def: FieldDef,
  slots: &mut FieldSlots,
  has_content: bool,
) -> Result<(), WbxmlError> {
  match def.kind() {
    FieldKind::String => {
      let value = if has_content {
        decoder.read_string_element(record)?
      } else {
        String::new()
      };
      slots.set(def.index(), FieldValue::Str(value));
    }
    FieldKind::Integer => {
      let value = if has_content {
        parse_decimal(&decoder.read_string_element(record)?)?
      } else {
        0
      };
      slots.set(def.index(), FieldValue::Int(value));
    }
    FieldKind::Boolean => {
      // Presence alone means true; a content-form body is an anomaly that is
      // skipped so the token stream stays aligned.
      if has_content {
        utils::tolerate_boolean_content(def.tag(), record);
        decoder.skip_element(record)?;
      }
      slots.set(def.index(), FieldValue::Bool(true));
    }
    FieldKind::Record(ops) => {
      if has_content {
        let value = (ops.parse)(decoder)?;
        slots.set(def.index(), value);
      }
    }
    FieldKind::Stream(ops) => {
      if has_content {
        if let Some(value) = read_stream_element(decoder, record, ops)? {
          slots.set(def.index(), value);
        }
      }
    }
    FieldKind::List(item) => {
      slots.ensure_list(def.index(), item);
      if has_content {
        match item {
          ItemKind::String => {
            let value = decoder.read_string_element(record)?;
            slots.push_string(def.index(), value)?;
          }
          ItemKind::Integer => {
            let value = parse_decimal(&decoder.read_string_element(record)?)?;
            slots.push_integer(def.index(), value)?;
          }
          ItemKind::Record(ops) => {
            let value = (ops.parse)(decoder)?;
            slots.push_record(def.index(), value)?;
          }
        }
      }
    }
  }
  Ok(())
}

fn parse_decimal(body: &str) -> Result<i64, WbxmlError> {
  body.parse::<i64>().map_err(WbxmlError::InvalidInt)
}

/// Hands the bounded inline-string source to the caller's read hook, drains
/// whatever the hook left behind, and consumes the element's trailing `END`.
fn read_stream_element(
  decoder: &mut Decoder<'_>,
  record: &'static str,
  ops: StreamOps,
) -> Result<Option<FieldValue>, WbxmlError> {
  match decoder.require_byte(record)? {
    // An immediately closed element carries no content to hand out.
    END => Ok(None),
    STR_I => {
      let value = {
        let mut reader = InlineReader::new(&mut *decoder.source);
        let value = (ops.read)(&mut reader)?;
        reader.finish().map_err(|err| io_to_eof(err, record))?;
        value
      };
      decoder.expect_end(record)?;
      Ok(Some(value))
    }
    token => Err(WbxmlError::UnexpectedToken(token, record)),
  }
}

/// Instantiated per nested record type and stored in its parent's schema.
pub(crate) fn parse_nested<R: WbxmlRecord>(
  decoder: &mut Decoder<'_>,
) -> Result<FieldValue, WbxmlError> {
  parse_record::<R>(decoder).map(|record| FieldValue::Record(Box::new(record)))
}

/// Instantiated per streamable content type and stored in the schema.
pub(crate) fn read_streamable<S: StreamableContent>(
  reader: &mut InlineReader<'_>,
) -> Result<FieldValue, WbxmlError> {
  S::read_from(reader).map(|content| FieldValue::Stream(Box::new(content)))
}

fn io_to_eof(err: io::Error, context: &'static str) -> WbxmlError {
  if err.kind() == ErrorKind::UnexpectedEof {
    WbxmlError::UnexpectedEof(context)
  } else {
    WbxmlError::Io(err)
  }
}

#[cfg(test)]
mod tests {
  use std::io::{Read, Write};

  use super::{from_reader, from_slice};
  use crate::{encode::to_vec, error::WbxmlError, StreamableContent};

  wbxml_record! {
    pub struct Named {
      name: str @ 0x45,
    }
  }

  #[test]
  fn test_decode_simple_string() {
    let record: Named = from_slice(b"\x03\x01\x6A\x00\x00\x01\x45\x03hi\x00\x01").unwrap();
    assert_eq!(record.name, "hi");
  }

  #[test]
  fn test_decode_empty_string_element() {
    let record: Named = from_slice(b"\x03\x01\x6A\x00\x00\x01\x45\x03\x00\x01").unwrap();
    assert_eq!(record.name, "");
  }

  #[test]
  fn test_string_element_closed_without_body() {
    // A content-form opener immediately followed by END decodes as "".
    let record: Named = from_slice(b"\x03\x01\x6A\x00\x00\x01\x45\x01").unwrap();
    assert_eq!(record.name, "");
  }

  #[test]
  fn test_empty_form_string_decodes_empty() {
    let record: Named = from_slice(b"\x03\x01\x6A\x00\x00\x01\x05").unwrap();
    assert_eq!(record.name, "");
  }

  #[test]
  fn test_unknown_content_tag_is_skipped() {
    // A trailing unknown element, id 6 on page 1, with a string body.
    let record: Named =
      from_slice(b"\x03\x01\x6A\x00\x00\x01\x45\x03hi\x00\x01\x46\x03y\x00\x01").unwrap();
    assert_eq!(record.name, "hi");
  }

  #[test]
  fn test_unknown_subtree_is_skipped_balanced() {
    // Unknown element wrapping a nested element and a string, then a known one.
    let doc = b"\x03\x01\x6A\x00\x00\x01\x46\x47\x03deep\x00\x01\x01\x45\x03hi\x00\x01";
    let record: Named = from_slice(doc).unwrap();
    assert_eq!(record.name, "hi");
  }

  #[test]
  fn test_unknown_empty_form_tag_is_discarded() {
    let record: Named = from_slice(b"\x03\x01\x6A\x00\x00\x01\x06\x45\x03hi\x00\x01").unwrap();
    assert_eq!(record.name, "hi");
  }

  #[test]
  fn test_page_switch_inside_skipped_subtree_persists() {
    // The unknown subtree switches to page 1; the following raw id is then
    // resolved against page 1 and matches the schema tag 0x45.
    let doc = b"\x03\x01\x6A\x00\x00\x00\x46\x00\x01\x06\x01\x45\x03hi\x00\x01";
    let record: Named = from_slice(doc).unwrap();
    assert_eq!(record.name, "hi");
  }

  #[test]
  fn test_missing_required_string_is_constructor_error() {
    let err = from_slice::<Named>(b"\x03\x01\x6A\x00").unwrap_err();
    assert!(matches!(err, WbxmlError::MissingField("Named", 0)));
  }

  #[test]
  fn test_truncated_inline_string_is_eof() {
    let err = from_slice::<Named>(b"\x03\x01\x6A\x00\x00\x01\x45\x03hi").unwrap_err();
    assert!(matches!(err, WbxmlError::UnexpectedEof(_)));
  }

  #[test]
  fn test_truncated_prologue_is_eof() {
    let err = from_slice::<Named>(b"\x03\x01").unwrap_err();
    assert!(matches!(err, WbxmlError::UnexpectedEof("prologue")));
  }

  #[test]
  fn test_multibyte_prologue_varints_are_accepted() {
    let record: Named =
      from_slice(b"\x03\x81\x26\x81\x2A\x00\x00\x01\x45\x03hi\x00\x01").unwrap();
    assert_eq!(record.name, "hi");
  }

  #[test]
  fn test_inline_string_at_tag_position_is_malformed() {
    let err = from_slice::<Named>(b"\x03\x01\x6A\x00\x03oops\x00").unwrap_err();
    assert!(matches!(err, WbxmlError::UnexpectedToken(0x03, _)));
  }

  #[test]
  fn test_last_occurrence_wins_for_scalars() {
    let doc = b"\x03\x01\x6A\x00\x00\x01\x45\x03first\x00\x01\x45\x03second\x00\x01";
    let record: Named = from_slice(doc).unwrap();
    assert_eq!(record.name, "second");
  }

  wbxml_record! {
    pub struct Counted {
      n: int @ 0x05,
    }
  }

  #[test]
  fn test_decode_integer() {
    let record: Counted = from_slice(b"\x03\x01\x6A\x00\x00\x00\x45\x0342\x00\x01").unwrap();
    assert_eq!(record.n, 42);
  }

  #[test]
  fn test_empty_form_integer_decodes_zero() {
    let record: Counted = from_slice(b"\x03\x01\x6A\x00\x00\x00\x05").unwrap();
    assert_eq!(record.n, 0);
  }

  #[test]
  fn test_non_decimal_integer_body_is_rejected() {
    let err = from_slice::<Counted>(b"\x03\x01\x6A\x00\x00\x00\x45\x03abc\x00\x01").unwrap_err();
    assert!(matches!(err, WbxmlError::InvalidInt(_)));
  }

  wbxml_record! {
    pub struct Flagged {
      flag: bool @ 0x06,
      s: str @ 0x07,
    }
  }

  #[test]
  fn test_boolean_presence_decodes_true() {
    let record: Flagged = from_slice(b"\x03\x01\x6A\x00\x00\x00\x06\x47\x03x\x00\x01").unwrap();
    assert!(record.flag);
    assert_eq!(record.s, "x");
  }

  #[test]
  fn test_boolean_absence_decodes_false() {
    let record: Flagged = from_slice(b"\x03\x01\x6A\x00\x00\x00\x47\x03x\x00\x01").unwrap();
    assert!(!record.flag);
  }

  #[test]
  fn test_content_form_boolean_is_tolerated() {
    // A nonconforming producer sent a body; it is skipped and the value reads
    // true, leaving the following element intact.
    let doc = b"\x03\x01\x6A\x00\x00\x00\x46\x031\x00\x01\x47\x03x\x00\x01";
    let record: Flagged = from_slice(doc).unwrap();
    assert!(record.flag);
    assert_eq!(record.s, "x");
  }

  wbxml_record! {
    pub struct OnlyFlag {
      flag: bool @ 0x06,
    }
  }

  #[test]
  fn test_eof_at_top_level_closes_the_frame() {
    let record: OnlyFlag = from_slice(b"\x03\x01\x6A\x00").unwrap();
    assert!(!record.flag);
  }

  wbxml_record! {
    pub struct Inner {
      x: str @ 0x46,
    }
  }

  wbxml_record! {
    pub struct Outer {
      inner: (rec Inner) @ 0x45,
    }
  }

  #[test]
  fn test_decode_nested_record() {
    let outer: Outer = from_slice(b"\x03\x01\x6A\x00\x00\x01\x45\x46\x03v\x00\x01\x01").unwrap();
    assert_eq!(outer.inner.unwrap().x, "v");
  }

  #[test]
  fn test_empty_form_nested_element_stays_absent() {
    let outer: Outer = from_slice(b"\x03\x01\x6A\x00\x00\x01\x05").unwrap();
    assert!(outer.inner.is_none());
  }

  wbxml_record! {
    pub struct Listed {
      names: [str] @ 0x05,
      counts: [int] @ 0x06,
      inners: [rec Inner] @ 0x07,
    }
  }

  #[test]
  fn test_lists_preserve_document_order() {
    let record = Listed::new()
      .push_names("a")
      .push_names("b")
      .push_counts(1)
      .push_counts(2)
      .push_inners(Inner::new().set_x("u"))
      .push_inners(Inner::new().set_x("v"));
    let decoded: Listed = from_slice(&to_vec(&record).unwrap()).unwrap();
    assert_eq!(decoded, record);
  }

  #[test]
  fn test_empty_list_element_appends_no_item() {
    // One empty-form occurrence of the names tag, then a real one.
    let doc = b"\x03\x01\x6A\x00\x00\x00\x05\x45\x03a\x00\x01";
    let record: Listed = from_slice(doc).unwrap();
    assert_eq!(record.names, vec!["a"]);
  }

  #[derive(Debug, Clone, PartialEq, Default)]
  struct Blob(Vec<u8>);

  impl StreamableContent for Blob {
    fn read_from<R: Read>(reader: &mut R) -> Result<Self, WbxmlError> {
      let mut buf = Vec::new();
      reader.read_to_end(&mut buf).map_err(WbxmlError::Io)?;
      Ok(Blob(buf))
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), WbxmlError> {
      writer.write_all(&self.0).map_err(WbxmlError::Io)
    }
  }

  /// Reads only the first three bytes of its content.
  #[derive(Debug, Clone, PartialEq, Default)]
  struct Prefix(Vec<u8>);

  impl StreamableContent for Prefix {
    fn read_from<R: Read>(reader: &mut R) -> Result<Self, WbxmlError> {
      let mut buf = [0u8; 3];
      reader.read_exact(&mut buf).map_err(WbxmlError::Io)?;
      Ok(Prefix(buf.to_vec()))
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), WbxmlError> {
      writer.write_all(&self.0).map_err(WbxmlError::Io)
    }
  }

  wbxml_record! {
    pub struct Streamed {
      blob: (stream Blob) @ 0x05,
      after: str @ 0x06,
    }
  }

  #[test]
  fn test_streamable_round_trip() {
    let record = Streamed::new()
      .set_blob(Blob(b"payload".to_vec()))
      .set_after("tail");
    let decoded: Streamed = from_slice(&to_vec(&record).unwrap()).unwrap();
    assert_eq!(decoded, record);
  }

  #[test]
  fn test_streamable_absent_stays_none() {
    let record = Streamed::new().set_after("tail");
    let decoded: Streamed = from_slice(&to_vec(&record).unwrap()).unwrap();
    assert!(decoded.blob.is_none());
  }

  wbxml_record! {
    pub struct PartiallyStreamed {
      prefix: (stream Prefix) @ 0x05,
      after: str @ 0x06,
    }
  }

  #[test]
  fn test_partial_stream_reader_keeps_stream_aligned() {
    // The hook reads 3 of 7 bytes; the decoder drains the rest and the next
    // element still parses.
    let doc = b"\x03\x01\x6A\x00\x00\x00\x45\x03payload\x00\x01\x46\x03tail\x00\x01";
    let record: PartiallyStreamed = from_slice(doc).unwrap();
    assert_eq!(record.prefix.unwrap().0, b"pay");
    assert_eq!(record.after, "tail");
  }

  #[test]
  fn test_from_reader_accepts_any_bufread() {
    let bytes = to_vec(&Named::new().set_name("hi")).unwrap();
    let record: Named = from_reader(std::io::Cursor::new(bytes)).unwrap();
    assert_eq!(record.name, "hi");
  }
}
