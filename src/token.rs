//! WBXML 1.3 token vocabulary and composite tag arithmetic.

use std::fmt::{self, Display, Formatter};

/// Selects a new tag code page; followed by a single page byte.
pub const SWITCH_PAGE: u8 = 0x00;
/// Closes the current content-form element.
pub const END: u8 = 0x01;
/// An inline NUL-terminated UTF-8 string follows.
pub const STR_I: u8 = 0x03;
/// OR'd into a tag id when the element carries content.
pub const CONTENT_MASK: u8 = 0x40;
/// Number of bits the code page occupies above the 6-bit tag id.
pub const PAGE_SHIFT: u32 = 6;
/// Mask extracting the tag id from a token byte.
pub const PAGE_MASK: u8 = 0x3F;

/// WBXML version byte (major 1, minor 3).
pub const VERSION_1_3: u8 = 0x03;
/// Public identifier "unknown".
pub const PUBLIC_ID_UNKNOWN: u8 = 0x01;
/// IANA MIBenum of UTF-8.
pub const CHARSET_UTF8: u8 = 0x6A;
/// Smallest id available to user tags; 0x00-0x04 are control tokens.
pub const MIN_TAG_ID: u8 = 0x05;

/// The fixed document head: version, public id, charset, empty string table.
pub(crate) const PROLOGUE: [u8; 4] = [VERSION_1_3, PUBLIC_ID_UNKNOWN, CHARSET_UTF8, 0x00];

/// Composite tag identifier, `(page << 6) | id`.
///
/// The page selects one of 256 tag namespaces, the id one of the user tags
/// within it. The raw form is what record schemas are annotated with, e.g.
/// `0x113` for id `0x13` on code page 4.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(u16);

impl Tag {
  pub const fn new(page: u8, id: u8) -> Self {
    Tag(((page as u16) << PAGE_SHIFT) | (id & PAGE_MASK) as u16)
  }

  pub const fn from_raw(raw: u16) -> Self {
    Tag(raw)
  }

  pub const fn raw(self) -> u16 {
    self.0
  }

  pub const fn page(self) -> u8 {
    (self.0 >> PAGE_SHIFT) as u8
  }

  pub const fn id(self) -> u8 {
    (self.0 as u8) & PAGE_MASK
  }
}

impl Display for Tag {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "0x{:04X} (page {}, id 0x{:02X})", self.0, self.page(), self.id())
  }
}
