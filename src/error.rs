use std::{io, num::ParseIntError, string::FromUtf8Error};

use quick_error::quick_error;

quick_error! {
  #[derive(Debug)]
  pub enum WbxmlError {
    Schema(msg: String) {
      display("Invalid record schema: {}", msg)
    }
    MissingField(record: &'static str, index: usize) {
      display("Field {} of record {} is required but absent from the stream", index, record)
    }
    FieldKind(record: &'static str, index: usize) {
      display("Field {} of record {} does not match its declared kind", index, record)
    }
    Io(err: io::Error) {
      display("I/O error: {}", err)
    }
    UnexpectedEof(context: &'static str) {
      display("Premature end of stream while reading {}", context)
    }
    UnexpectedToken(token: u8, context: &'static str) {
      display("Unexpected token 0x{:02X} while reading {}", token, context)
    }
    InvalidInt(err: ParseIntError) {
      display("Error parsing an integer element body: {}", err)
    }
    Utf8(err: FromUtf8Error) {
      display("Inline string is not valid UTF-8: {}", err)
    }
    Xml(err: quick_xml::Error) {
      display("Error while rendering XML: {}", err)
    }
    Custom(msg: String) {
      display("Custom error: {}", msg)
    }
  }
}
