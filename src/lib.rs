//! Mapping of schema-annotated record types to and from the WAP Binary XML
//! (WBXML) 1.3 subset used by Exchange ActiveSync.
//!
//! Two engines share one process-wide schema cache:
//! * [`encode`] turns a record into the tokenized binary form,
//! * [`decode`] parses such a stream back into a fresh record instance.
//!
//! A record type declares, per field, a composite tag `(page << 6) | id` and
//! a wire kind; the [`wbxml_record!`] macro generates the whole mapping,
//! including builder setters. The decoder tolerates unknown tags by skipping
//! their balanced subtrees, so schemas only need to name the fields a caller
//! cares about.
//!
//! Only the inline-string form of content is supported: no string-table
//! references, no OPAQUE data, no attributes, no entities, no processing
//! instructions. Encoding and decoding are single-threaded over one byte
//! sink/source; an encoding session must not be shared between threads.

use std::{
  any::Any,
  io::{Read, Write},
};

#[macro_use]
mod macros;
mod utils;

pub mod decode;
pub mod encode;
pub mod error;
pub mod schema;
pub mod stream;
pub mod token;
pub mod value;
pub mod xml;

pub use self::{
  decode::{from_reader, from_slice},
  encode::{to_vec, to_writer},
  error::WbxmlError,
  schema::{schema_of, FieldDef, FieldKind, ItemKind, RecordSchema},
  stream::InlineReader,
  token::Tag,
  value::{FieldRef, FieldSlots, FieldValue},
};

#[doc(hidden)]
pub use paste::paste as __paste;

/// A record type that maps onto a WBXML element sequence.
///
/// Implementations are usually generated by [`wbxml_record!`]; hand-written
/// impls must keep [`fields`](WbxmlRecord::fields),
/// [`from_fields`](WbxmlRecord::from_fields) and
/// [`field`](WbxmlRecord::field) consistent with one another. The derived
/// schema is validated and cached on first use, per type, for the life of the
/// process.
pub trait WbxmlRecord: Any {
  /// Name used in error messages and logs.
  const NAME: &'static str;

  /// The annotated field table; indices must cover `0..n` without gaps and
  /// tags must be unique.
  fn fields() -> Vec<FieldDef>;

  /// Constructor hook: builds the record from one decoded value per field,
  /// in index order.
  fn from_fields(slots: FieldSlots) -> Result<Self, WbxmlError>
  where
    Self: Sized;

  /// Borrows the field at `index` for encoding.
  fn field(&self, index: usize) -> FieldRef<'_>;
}

/// Object-safe record view used for recursive nested emission.
pub trait ErasedRecord {
  fn record_schema(&self) -> Result<&'static RecordSchema, WbxmlError>;

  fn record_field(&self, index: usize) -> FieldRef<'_>;
}

impl<R: WbxmlRecord> ErasedRecord for R {
  fn record_schema(&self) -> Result<&'static RecordSchema, WbxmlError> {
    schema::schema_of::<R>()
  }

  fn record_field(&self, index: usize) -> FieldRef<'_> {
    self.field(index)
  }
}

/// Content produced and consumed through caller-provided stream hooks rather
/// than buffered by the codec.
///
/// On the wire a streamable field is an ordinary inline string, so the
/// payload written by [`write_to`](StreamableContent::write_to) must never
/// contain a `0x00` byte; such a byte would terminate the string early on
/// decode.
pub trait StreamableContent: Any {
  /// Reads the content from a source that ends at the first `0x00` of the
  /// underlying stream. Bytes left unread are drained by the decoder.
  fn read_from<R: Read>(reader: &mut R) -> Result<Self, WbxmlError>
  where
    Self: Sized;

  /// Writes the content to the sink.
  fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), WbxmlError>;
}

/// Object-safe streamable view used by the encoder.
pub trait ErasedStreamable {
  fn write_content(&self, sink: &mut dyn Write) -> Result<(), WbxmlError>;
}

impl<S: StreamableContent> ErasedStreamable for S {
  fn write_content(&self, mut sink: &mut dyn Write) -> Result<(), WbxmlError> {
    self.write_to(&mut sink)
  }
}
