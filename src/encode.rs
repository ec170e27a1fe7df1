//! Schema-directed WBXML encoder.

use std::io::Write;

use byteorder::WriteBytesExt;

use crate::{
  error::WbxmlError,
  schema::{FieldDef, FieldKind, ItemKind},
  token::{Tag, CONTENT_MASK, END, PROLOGUE, STR_I, SWITCH_PAGE},
  value::FieldRef,
  ErasedRecord, ErasedStreamable, WbxmlRecord,
};

/// Serializes `record` as a WBXML 1.3 document and flushes the sink.
///
/// The root record has no framing of its own: its fields are the document's
/// top-level elements, emitted in index order right after the fixed prologue.
pub fn to_writer<T: WbxmlRecord, W: Write>(record: &T, mut sink: W) -> Result<(), WbxmlError> {
  {
    let mut encoder = Encoder::new(&mut sink);
    encoder.write_prologue()?;
    encoder.emit_record(record)?;
  }
  sink.flush().map_err(WbxmlError::Io)
}

/// Serializes `record` into a fresh byte vector.
pub fn to_vec<T: WbxmlRecord>(record: &T) -> Result<Vec<u8>, WbxmlError> {
  let mut out = Vec::new();
  to_writer(record, &mut out)?;
  Ok(out)
}

pub(crate) struct Encoder<'a> {
  sink: &'a mut dyn Write,
  /// Active code page; `None` until the first tag forces a switch.
  page: Option<u8>,
}

impl<'a> Encoder<'a> {
  pub(crate) fn new(sink: &'a mut dyn Write) -> Self {
    Encoder { sink, page: None }
  }

  fn write_prologue(&mut self) -> Result<(), WbxmlError> {
    self.sink.write_all(&PROLOGUE).map_err(WbxmlError::Io)
  }

  fn emit_record(&mut self, record: &dyn ErasedRecord) -> Result<(), WbxmlError> {
    let schema = record.record_schema()?;
    for def in schema.entries() {
      self.emit_field(schema.name(), def, record.record_field(def.index()))?;
    }
    Ok(())
  }

  fn emit_field(
    &mut self,
    record: &'static str,
    def: &FieldDef,
    value: FieldRef<'_>,
  ) -> Result<(), WbxmlError> {
    match (def.kind(), value) {
      (_, FieldRef::Absent) => Ok(()),
      (FieldKind::String, FieldRef::Str(s)) => self.emit_string(def.tag(), s.as_bytes()),
      (FieldKind::Integer, FieldRef::Int(n)) => {
        self.emit_string(def.tag(), n.to_string().as_bytes())
      }
      // A set boolean is the bare empty-form token, a cleared one is nothing.
      (FieldKind::Boolean, FieldRef::Bool(true)) => self.write_tag(def.tag(), false),
      (FieldKind::Boolean, FieldRef::Bool(false)) => Ok(()),
      (FieldKind::Record(_), FieldRef::Record(nested)) => self.emit_nested(def.tag(), nested),
      (FieldKind::Stream(_), FieldRef::Stream(content)) => {
        self.emit_streamable(def.tag(), content)
      }
      (FieldKind::List(ItemKind::String), FieldRef::StrList(items)) => {
        for item in items {
          self.emit_string(def.tag(), item.as_bytes())?;
        }
        Ok(())
      }
      (FieldKind::List(ItemKind::Integer), FieldRef::IntList(items)) => {
        for item in items {
          self.emit_string(def.tag(), item.to_string().as_bytes())?;
        }
        Ok(())
      }
      (FieldKind::List(ItemKind::Record(_)), FieldRef::RecordList(items)) => {
        for item in items {
          self.emit_nested(def.tag(), item)?;
        }
        Ok(())
      }
      _ => Err(WbxmlError::FieldKind(record, def.index())),
    }
  }

  fn emit_string(&mut self, tag: Tag, body: &[u8]) -> Result<(), WbxmlError> {
    self.write_tag(tag, true)?;
    self.write_inline(body)?;
    self.write_end()
  }

  fn emit_nested(&mut self, tag: Tag, nested: &dyn ErasedRecord) -> Result<(), WbxmlError> {
    self.write_tag(tag, true)?;
    self.emit_record(nested)?;
    self.write_end()
  }

  /// The caller's write hook is handed the raw sink between `STR_I` and the
  /// terminator; it must not emit `0x00`.
  fn emit_streamable(
    &mut self,
    tag: Tag,
    content: &dyn ErasedStreamable,
  ) -> Result<(), WbxmlError> {
    self.write_tag(tag, true)?;
    self.sink.write_u8(STR_I).map_err(WbxmlError::Io)?;
    content.write_content(&mut *self.sink)?;
    self.sink.write_u8(0x00).map_err(WbxmlError::Io)?;
    self.write_end()
  }

  /// Emits the tag token, switching the active code page first when needed.
  fn write_tag(&mut self, tag: Tag, content: bool) -> Result<(), WbxmlError> {
    let page = tag.page();
    if self.page != Some(page) {
      self.sink.write_u8(SWITCH_PAGE).map_err(WbxmlError::Io)?;
      self.sink.write_u8(page).map_err(WbxmlError::Io)?;
      self.page = Some(page);
    }
    let token = if content { tag.id() | CONTENT_MASK } else { tag.id() };
    self.sink.write_u8(token).map_err(WbxmlError::Io)
  }

  fn write_inline(&mut self, body: &[u8]) -> Result<(), WbxmlError> {
    self.sink.write_u8(STR_I).map_err(WbxmlError::Io)?;
    self.sink.write_all(body).map_err(WbxmlError::Io)?;
    self.sink.write_u8(0x00).map_err(WbxmlError::Io)
  }

  fn write_end(&mut self) -> Result<(), WbxmlError> {
    self.sink.write_u8(END).map_err(WbxmlError::Io)
  }
}

#[cfg(test)]
mod tests {
  use super::to_vec;

  wbxml_record! {
    pub struct Named {
      name: str @ 0x45,
    }
  }

  #[test]
  fn test_empty_string_element() {
    let bytes = to_vec(&Named::new().set_name("")).unwrap();
    assert_eq!(bytes, b"\x03\x01\x6A\x00\x00\x01\x45\x03\x00\x01");
  }

  #[test]
  fn test_simple_string_element() {
    let bytes = to_vec(&Named::new().set_name("hi")).unwrap();
    assert_eq!(bytes, b"\x03\x01\x6A\x00\x00\x01\x45\x03hi\x00\x01");
  }

  wbxml_record! {
    pub struct Counted {
      n: int @ 0x05,
    }
  }

  #[test]
  fn test_integer_element_is_decimal_ascii() {
    let bytes = to_vec(&Counted::new().set_n(42)).unwrap();
    assert_eq!(bytes, b"\x03\x01\x6A\x00\x00\x00\x45\x0342\x00\x01");
  }

  #[test]
  fn test_negative_integer_element() {
    let bytes = to_vec(&Counted::new().set_n(-7)).unwrap();
    assert_eq!(bytes, b"\x03\x01\x6A\x00\x00\x00\x45\x03-7\x00\x01");
  }

  wbxml_record! {
    pub struct Flagged {
      flag: bool @ 0x06,
      s: str @ 0x07,
    }
  }

  #[test]
  fn test_boolean_true_is_empty_form() {
    let bytes = to_vec(&Flagged::new().set_flag(true).set_s("x")).unwrap();
    assert_eq!(bytes, b"\x03\x01\x6A\x00\x00\x00\x06\x47\x03x\x00\x01");
  }

  #[test]
  fn test_boolean_false_emits_nothing() {
    let bytes = to_vec(&Flagged::new().set_s("x")).unwrap();
    assert_eq!(bytes, b"\x03\x01\x6A\x00\x00\x00\x47\x03x\x00\x01");
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
  fn test_nested_record_framing() {
    let outer = Outer::new().set_inner(Inner::new().set_x("v"));
    let bytes = to_vec(&outer).unwrap();
    assert_eq!(bytes, b"\x03\x01\x6A\x00\x00\x01\x45\x46\x03v\x00\x01\x01");
  }

  #[test]
  fn test_absent_nested_record_emits_nothing() {
    let bytes = to_vec(&Outer::new()).unwrap();
    assert_eq!(bytes, b"\x03\x01\x6A\x00");
  }

  wbxml_record! {
    pub struct MultiPage {
      a: str @ 0x05,
      b: str @ 0x45,
      c: str @ 0x46,
    }
  }

  #[test]
  fn test_page_switch_only_on_page_change() {
    let record = MultiPage::new().set_a("a").set_b("b").set_c("c");
    let bytes = to_vec(&record).unwrap();
    // One switch to page 0, one to page 1, none between `b` and `c`.
    assert_eq!(
      bytes,
      b"\x03\x01\x6A\x00\x00\x00\x45\x03a\x00\x01\x00\x01\x45\x03b\x00\x01\x46\x03c\x00\x01"
    );
  }

  wbxml_record! {
    pub struct Listed {
      items: [str] @ 0x05,
    }
  }

  #[test]
  fn test_list_emits_one_element_per_item() {
    let record = Listed::new().push_items("a").push_items("b");
    let bytes = to_vec(&record).unwrap();
    assert_eq!(bytes, b"\x03\x01\x6A\x00\x00\x00\x45\x03a\x00\x01\x45\x03b\x00\x01");
  }

  #[test]
  fn test_empty_list_emits_nothing() {
    let bytes = to_vec(&Listed::new()).unwrap();
    assert_eq!(bytes, b"\x03\x01\x6A\x00");
  }

  #[test]
  fn test_encoding_is_deterministic() {
    let record = MultiPage::new().set_a("a").set_b("b").set_c("c");
    assert_eq!(to_vec(&record).unwrap(), to_vec(&record).unwrap());
  }
}
