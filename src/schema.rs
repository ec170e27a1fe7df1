//! Per-type record schemas: derivation, validation and process-wide caching.

use std::{any::TypeId, collections::HashMap, fmt, sync::RwLock};

use once_cell::sync::Lazy;

use crate::{
  decode::{parse_nested, read_streamable, NestedParseFn, StreamReadFn},
  error::WbxmlError,
  token::{Tag, MIN_TAG_ID, PAGE_SHIFT},
  StreamableContent, WbxmlRecord,
};

/// Parser hook for one nested record type, instantiated by
/// [`FieldKind::nested`] and stored inside the schema.
#[derive(Clone, Copy)]
pub struct NestedOps {
  pub(crate) parse: NestedParseFn,
}

/// Reader hook for one streamable content type, instantiated by
/// [`FieldKind::streamable`].
#[derive(Clone, Copy)]
pub struct StreamOps {
  pub(crate) read: StreamReadFn,
}

/// How a field is mapped onto the wire.
#[derive(Clone, Copy)]
pub enum FieldKind {
  /// Inline-string content.
  String,
  /// Decimal ASCII inline-string content.
  Integer,
  /// Presence means `true`; `true` is emitted as an empty-form element.
  Boolean,
  /// A recursively framed nested record.
  Record(NestedOps),
  /// Inline-string content produced and consumed through caller hooks.
  Stream(StreamOps),
  /// A repeated element, one occurrence per item.
  List(ItemKind),
}

/// Element type of a list field.
#[derive(Clone, Copy)]
pub enum ItemKind {
  String,
  Integer,
  Record(NestedOps),
}

impl FieldKind {
  pub fn nested<R: WbxmlRecord>() -> Self {
    FieldKind::Record(NestedOps {
      parse: parse_nested::<R>,
    })
  }

  pub fn streamable<S: StreamableContent>() -> Self {
    FieldKind::Stream(StreamOps {
      read: read_streamable::<S>,
    })
  }

  pub fn nested_list<R: WbxmlRecord>() -> Self {
    FieldKind::List(ItemKind::Record(NestedOps {
      parse: parse_nested::<R>,
    }))
  }
}

impl fmt::Debug for FieldKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FieldKind::String => write!(f, "String"),
      FieldKind::Integer => write!(f, "Integer"),
      FieldKind::Boolean => write!(f, "Boolean"),
      FieldKind::Record(_) => write!(f, "Record"),
      FieldKind::Stream(_) => write!(f, "Stream"),
      FieldKind::List(item) => write!(f, "List({:?})", item),
    }
  }
}

impl fmt::Debug for ItemKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ItemKind::String => write!(f, "String"),
      ItemKind::Integer => write!(f, "Integer"),
      ItemKind::Record(_) => write!(f, "Record"),
    }
  }
}

/// One annotated record field: composite tag, positional index, wire kind.
#[derive(Clone, Copy, Debug)]
pub struct FieldDef {
  tag: Tag,
  index: usize,
  kind: FieldKind,
}

impl FieldDef {
  pub fn new(tag: Tag, index: usize, kind: FieldKind) -> Self {
    FieldDef { tag, index, kind }
  }

  pub fn tag(&self) -> Tag {
    self.tag
  }

  pub fn index(&self) -> usize {
    self.index
  }

  pub fn kind(&self) -> FieldKind {
    self.kind
  }
}

/// The derived schema of a record type: field definitions sorted by index
/// plus a composite-tag lookup for the decoder.
pub struct RecordSchema {
  name: &'static str,
  defs: Vec<FieldDef>,
  by_tag: HashMap<u16, usize>,
}

impl RecordSchema {
  fn derive(name: &'static str, mut defs: Vec<FieldDef>) -> Result<Self, WbxmlError> {
    defs.sort_by_key(|def| def.index);
    let mut by_tag = HashMap::with_capacity(defs.len());
    for (pos, def) in defs.iter().enumerate() {
      if def.index != pos {
        return Err(schema_err(
          name,
          format!(
            "field indices must cover 0..{} without gaps or repeats, found index {}",
            defs.len(),
            def.index
          ),
        ));
      }
      let tag = def.tag;
      if tag.raw() >> PAGE_SHIFT > 0xFF {
        return Err(schema_err(
          name,
          format!("code page of tag 0x{:04X} exceeds 255", tag.raw()),
        ));
      }
      if tag.id() < MIN_TAG_ID {
        return Err(schema_err(
          name,
          format!("tag id 0x{:02X} collides with a reserved control token", tag.id()),
        ));
      }
      if by_tag.insert(tag.raw(), pos).is_some() {
        return Err(schema_err(name, format!("duplicate tag {}", tag)));
      }
    }
    Ok(RecordSchema { name, defs, by_tag })
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn len(&self) -> usize {
    self.defs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.defs.is_empty()
  }

  /// Field definitions in index order; this is also the emission order.
  pub fn entries(&self) -> &[FieldDef] {
    &self.defs
  }

  pub fn entry_for(&self, tag: Tag) -> Option<&FieldDef> {
    self.by_tag.get(&tag.raw()).map(|&pos| &self.defs[pos])
  }
}

fn schema_err(name: &'static str, msg: String) -> WbxmlError {
  WbxmlError::Schema(format!("record {}: {}", name, msg))
}

/// Schemas are derived once per record type and retained for the life of the
/// process; entries are never evicted.
static SCHEMAS: Lazy<RwLock<HashMap<TypeId, &'static RecordSchema>>> =
  Lazy::new(|| RwLock::new(HashMap::new()));

/// Returns the memoized schema of `R`, deriving and validating it on first
/// use. Concurrent first calls may both derive, but a single result is
/// published and every caller observes that one.
pub fn schema_of<R: WbxmlRecord>() -> Result<&'static RecordSchema, WbxmlError> {
  let key = TypeId::of::<R>();
  {
    let cache = SCHEMAS.read().unwrap_or_else(|err| err.into_inner());
    if let Some(schema) = cache.get(&key) {
      return Ok(schema);
    }
  }
  let derived = RecordSchema::derive(R::NAME, R::fields())?;
  let mut cache = SCHEMAS.write().unwrap_or_else(|err| err.into_inner());
  if let Some(schema) = cache.get(&key) {
    return Ok(schema);
  }
  let schema: &'static RecordSchema = Box::leak(Box::new(derived));
  cache.insert(key, schema);
  Ok(schema)
}
