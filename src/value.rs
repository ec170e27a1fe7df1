//! Dynamic representation of field values flowing between the codec and the
//! record constructors.

use std::{any::Any, fmt, mem};

use crate::{
  error::WbxmlError, schema::ItemKind, ErasedRecord, ErasedStreamable, StreamableContent,
  WbxmlRecord,
};

/// A decoded field slot, owned by the decoder until the constructor hook runs.
///
/// Nested records and streamable contents are type-erased here; the typed
/// takers on [`FieldSlots`] downcast them back.
pub enum FieldValue {
  /// The field's tag never occurred in the stream.
  Absent,
  Str(String),
  Int(i64),
  Bool(bool),
  Record(Box<dyn Any>),
  Stream(Box<dyn Any>),
  StrList(Vec<String>),
  IntList(Vec<i64>),
  RecordList(Vec<Box<dyn Any>>),
}

impl fmt::Debug for FieldValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FieldValue::Absent => write!(f, "Absent"),
      FieldValue::Str(s) => write!(f, "Str({:?})", s),
      FieldValue::Int(n) => write!(f, "Int({})", n),
      FieldValue::Bool(b) => write!(f, "Bool({})", b),
      FieldValue::Record(_) => write!(f, "Record(..)"),
      FieldValue::Stream(_) => write!(f, "Stream(..)"),
      FieldValue::StrList(v) => write!(f, "StrList({:?})", v),
      FieldValue::IntList(v) => write!(f, "IntList({:?})", v),
      FieldValue::RecordList(v) => write!(f, "RecordList(len {})", v.len()),
    }
  }
}

/// A borrowed view of one record field, handed to the encoder.
pub enum FieldRef<'a> {
  /// Nothing to emit for this field.
  Absent,
  Str(&'a str),
  Int(i64),
  Bool(bool),
  Record(&'a dyn ErasedRecord),
  Stream(&'a dyn ErasedStreamable),
  StrList(&'a [String]),
  IntList(&'a [i64]),
  RecordList(Vec<&'a dyn ErasedRecord>),
}

impl<'a> FieldRef<'a> {
  /// Borrows an optional nested record field.
  pub fn record<R: WbxmlRecord>(field: &'a Option<R>) -> Self {
    match field {
      Some(record) => FieldRef::Record(record),
      None => FieldRef::Absent,
    }
  }

  /// Borrows an optional streamable field.
  pub fn streamable<S: StreamableContent>(field: &'a Option<S>) -> Self {
    match field {
      Some(content) => FieldRef::Stream(content),
      None => FieldRef::Absent,
    }
  }

  /// Borrows a list of nested records field.
  pub fn record_list<R: WbxmlRecord>(items: &'a [R]) -> Self {
    FieldRef::RecordList(items.iter().map(|item| item as &dyn ErasedRecord).collect())
  }
}

/// The constructor argument array: one slot per schema entry, in index order.
///
/// The decoder fills it while looping over tokens; the record's constructor
/// hook drains it with the `take_*` methods.
pub struct FieldSlots {
  record: &'static str,
  values: Vec<FieldValue>,
}

impl FieldSlots {
  pub(crate) fn new(record: &'static str, len: usize) -> Self {
    FieldSlots {
      record,
      values: (0..len).map(|_| FieldValue::Absent).collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  fn take(&mut self, index: usize) -> Result<FieldValue, WbxmlError> {
    match self.values.get_mut(index) {
      Some(slot) => Ok(mem::replace(slot, FieldValue::Absent)),
      None => Err(WbxmlError::FieldKind(self.record, index)),
    }
  }

  pub fn take_string(&mut self, index: usize) -> Result<String, WbxmlError> {
    match self.take(index)? {
      FieldValue::Str(s) => Ok(s),
      FieldValue::Absent => Err(WbxmlError::MissingField(self.record, index)),
      _ => Err(WbxmlError::FieldKind(self.record, index)),
    }
  }

  pub fn take_opt_string(&mut self, index: usize) -> Result<Option<String>, WbxmlError> {
    match self.take(index)? {
      FieldValue::Str(s) => Ok(Some(s)),
      FieldValue::Absent => Ok(None),
      _ => Err(WbxmlError::FieldKind(self.record, index)),
    }
  }

  pub fn take_integer(&mut self, index: usize) -> Result<i64, WbxmlError> {
    match self.take(index)? {
      FieldValue::Int(n) => Ok(n),
      FieldValue::Absent => Err(WbxmlError::MissingField(self.record, index)),
      _ => Err(WbxmlError::FieldKind(self.record, index)),
    }
  }

  pub fn take_opt_integer(&mut self, index: usize) -> Result<Option<i64>, WbxmlError> {
    match self.take(index)? {
      FieldValue::Int(n) => Ok(Some(n)),
      FieldValue::Absent => Ok(None),
      _ => Err(WbxmlError::FieldKind(self.record, index)),
    }
  }

  /// An absent boolean tag decodes to `false`.
  pub fn take_boolean(&mut self, index: usize) -> Result<bool, WbxmlError> {
    match self.take(index)? {
      FieldValue::Bool(b) => Ok(b),
      FieldValue::Absent => Ok(false),
      _ => Err(WbxmlError::FieldKind(self.record, index)),
    }
  }

  pub fn take_record<R: WbxmlRecord>(&mut self, index: usize) -> Result<Option<R>, WbxmlError> {
    match self.take(index)? {
      FieldValue::Record(boxed) => boxed
        .downcast::<R>()
        .map(|record| Some(*record))
        .map_err(|_| WbxmlError::FieldKind(self.record, index)),
      FieldValue::Absent => Ok(None),
      _ => Err(WbxmlError::FieldKind(self.record, index)),
    }
  }

  pub fn take_streamable<S: StreamableContent>(
    &mut self,
    index: usize,
  ) -> Result<Option<S>, WbxmlError> {
    match self.take(index)? {
      FieldValue::Stream(boxed) => boxed
        .downcast::<S>()
        .map(|content| Some(*content))
        .map_err(|_| WbxmlError::FieldKind(self.record, index)),
      FieldValue::Absent => Ok(None),
      _ => Err(WbxmlError::FieldKind(self.record, index)),
    }
  }

  pub fn take_string_list(&mut self, index: usize) -> Result<Vec<String>, WbxmlError> {
    match self.take(index)? {
      FieldValue::StrList(items) => Ok(items),
      FieldValue::Absent => Ok(Vec::new()),
      _ => Err(WbxmlError::FieldKind(self.record, index)),
    }
  }

  pub fn take_integer_list(&mut self, index: usize) -> Result<Vec<i64>, WbxmlError> {
    match self.take(index)? {
      FieldValue::IntList(items) => Ok(items),
      FieldValue::Absent => Ok(Vec::new()),
      _ => Err(WbxmlError::FieldKind(self.record, index)),
    }
  }

  pub fn take_record_list<R: WbxmlRecord>(&mut self, index: usize) -> Result<Vec<R>, WbxmlError> {
    match self.take(index)? {
      FieldValue::RecordList(items) => items
        .into_iter()
        .map(|boxed| {
          boxed
            .downcast::<R>()
            .map(|record| *record)
            .map_err(|_| WbxmlError::FieldKind(self.record, index))
        })
        .collect(),
      FieldValue::Absent => Ok(Vec::new()),
      _ => Err(WbxmlError::FieldKind(self.record, index)),
    }
  }

  pub(crate) fn set(&mut self, index: usize, value: FieldValue) {
    self.values[index] = value;
  }

  /// Lists are materialized on the first occurrence of their tag, even when
  /// that occurrence is an empty element contributing no item.
  pub(crate) fn ensure_list(&mut self, index: usize, item: ItemKind) {
    if matches!(self.values[index], FieldValue::Absent) {
      self.values[index] = match item {
        ItemKind::String => FieldValue::StrList(Vec::new()),
        ItemKind::Integer => FieldValue::IntList(Vec::new()),
        ItemKind::Record(_) => FieldValue::RecordList(Vec::new()),
      };
    }
  }

  pub(crate) fn push_string(&mut self, index: usize, item: String) -> Result<(), WbxmlError> {
    match &mut self.values[index] {
      FieldValue::StrList(items) => {
        items.push(item);
        Ok(())
      }
      _ => Err(WbxmlError::FieldKind(self.record, index)),
    }
  }

  pub(crate) fn push_integer(&mut self, index: usize, item: i64) -> Result<(), WbxmlError> {
    match &mut self.values[index] {
      FieldValue::IntList(items) => {
        items.push(item);
        Ok(())
      }
      _ => Err(WbxmlError::FieldKind(self.record, index)),
    }
  }

  pub(crate) fn push_record(&mut self, index: usize, value: FieldValue) -> Result<(), WbxmlError> {
    match (&mut self.values[index], value) {
      (FieldValue::RecordList(items), FieldValue::Record(boxed)) => {
        items.push(boxed);
        Ok(())
      }
      _ => Err(WbxmlError::FieldKind(self.record, index)),
    }
  }
}
