use log::{debug, warn};

use crate::token::Tag;

pub(crate) fn discard_unknown_tag(tag: Tag, record: &'static str) {
  debug!("Discarded unknown tag {} in record {}", tag, record)
}

pub(crate) fn tolerate_boolean_content(tag: Tag, record: &'static str) {
  warn!(
    "Boolean element {} in record {} carries content; body skipped, value read as true",
    tag, record
  )
}
