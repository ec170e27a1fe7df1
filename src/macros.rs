/// Maps a field-kind spelling to the Rust type stored in the record:
/// `str`, `int` and `bool` are plain values, `(rec R)` and `(stream S)` are
/// optional, list kinds are vectors.
#[doc(hidden)]
#[macro_export]
macro_rules! __wbxml_field_ty {
  (str) => { String };
  (int) => { i64 };
  (bool) => { bool };
  ((rec $t:ty)) => { Option<$t> };
  ((stream $t:ty)) => { Option<$t> };
  ([str]) => { Vec<String> };
  ([int]) => { Vec<i64> };
  ([rec $t:ty]) => { Vec<$t> };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __wbxml_field_kind {
  (str) => { $crate::FieldKind::String };
  (int) => { $crate::FieldKind::Integer };
  (bool) => { $crate::FieldKind::Boolean };
  ((rec $t:ty)) => { $crate::FieldKind::nested::<$t>() };
  ((stream $t:ty)) => { $crate::FieldKind::streamable::<$t>() };
  ([str]) => { $crate::FieldKind::List($crate::ItemKind::String) };
  ([int]) => { $crate::FieldKind::List($crate::ItemKind::Integer) };
  ([rec $t:ty]) => { $crate::FieldKind::nested_list::<$t>() };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __wbxml_take_field {
  ($slots:ident, $index:expr, str) => { $slots.take_string($index)? };
  ($slots:ident, $index:expr, int) => { $slots.take_integer($index)? };
  ($slots:ident, $index:expr, bool) => { $slots.take_boolean($index)? };
  ($slots:ident, $index:expr, (rec $t:ty)) => { $slots.take_record::<$t>($index)? };
  ($slots:ident, $index:expr, (stream $t:ty)) => { $slots.take_streamable::<$t>($index)? };
  ($slots:ident, $index:expr, [str]) => { $slots.take_string_list($index)? };
  ($slots:ident, $index:expr, [int]) => { $slots.take_integer_list($index)? };
  ($slots:ident, $index:expr, [rec $t:ty]) => { $slots.take_record_list::<$t>($index)? };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __wbxml_field_ref {
  ($field:expr, str) => { $crate::FieldRef::Str($field.as_str()) };
  ($field:expr, int) => { $crate::FieldRef::Int(*$field) };
  ($field:expr, bool) => { $crate::FieldRef::Bool(*$field) };
  ($field:expr, (rec $t:ty)) => { $crate::FieldRef::record::<$t>($field) };
  ($field:expr, (stream $t:ty)) => { $crate::FieldRef::streamable::<$t>($field) };
  ($field:expr, [str]) => { $crate::FieldRef::StrList($field.as_slice()) };
  ($field:expr, [int]) => { $crate::FieldRef::IntList($field.as_slice()) };
  ($field:expr, [rec $t:ty]) => { $crate::FieldRef::record_list::<$t>($field.as_slice()) };
}

/// E.g. `__wbxml_field_builder!(Sync, sync_key, str)` leads to
/// ```ignore
/// impl Sync {
///   pub fn set_sync_key<I: Into<String>>(mut self, sync_key: I) -> Self {
///     self.sync_key = sync_key.into();
///     self
///   }
/// }
/// ```
/// List kinds get a `push_*` method instead.
#[doc(hidden)]
#[macro_export]
macro_rules! __wbxml_field_builder {
  ($name:ident, $field:ident, str) => {
    $crate::__paste! {
      impl $name {
        pub fn [<set_ $field>]<I: Into<String>>(mut self, $field: I) -> Self {
          self.$field = $field.into();
          self
        }
      }
    }
  };
  ($name:ident, $field:ident, int) => {
    $crate::__paste! {
      impl $name {
        pub fn [<set_ $field>](mut self, $field: i64) -> Self {
          self.$field = $field;
          self
        }
      }
    }
  };
  ($name:ident, $field:ident, bool) => {
    $crate::__paste! {
      impl $name {
        pub fn [<set_ $field>](mut self, $field: bool) -> Self {
          self.$field = $field;
          self
        }
      }
    }
  };
  ($name:ident, $field:ident, (rec $t:ty)) => {
    $crate::__paste! {
      impl $name {
        pub fn [<set_ $field>](mut self, $field: $t) -> Self {
          self.$field = Some($field);
          self
        }
      }
    }
  };
  ($name:ident, $field:ident, (stream $t:ty)) => {
    $crate::__paste! {
      impl $name {
        pub fn [<set_ $field>](mut self, $field: $t) -> Self {
          self.$field = Some($field);
          self
        }
      }
    }
  };
  ($name:ident, $field:ident, [str]) => {
    $crate::__paste! {
      impl $name {
        pub fn [<push_ $field>]<I: Into<String>>(mut self, item: I) -> Self {
          self.$field.push(item.into());
          self
        }
      }
    }
  };
  ($name:ident, $field:ident, [int]) => {
    $crate::__paste! {
      impl $name {
        pub fn [<push_ $field>](mut self, item: i64) -> Self {
          self.$field.push(item);
          self
        }
      }
    }
  };
  ($name:ident, $field:ident, [rec $t:ty]) => {
    $crate::__paste! {
      impl $name {
        pub fn [<push_ $field>](mut self, item: $t) -> Self {
          self.$field.push(item);
          self
        }
      }
    }
  };
}

/// Declares a WBXML-mapped record: the struct, its
/// [`WbxmlRecord`](crate::WbxmlRecord) impl and builder setters in one go.
///
/// Each field is spelled `name: kind @ tag`, where `kind` is one of `str`,
/// `int`, `bool`, `(rec R)`, `(stream S)`, `[str]`, `[int]`, `[rec R]` and
/// `tag` is the composite `(page << 6) | id` value. Field indices follow
/// declaration order, which is also the emission order.
///
/// ```
/// use wbxml::{from_slice, to_vec};
///
/// wbxml::wbxml_record! {
///   /// AirSync command subset.
///   pub struct SyncRequest {
///     sync_key: str @ 0x0B,
///     window_size: int @ 0x15,
///   }
/// }
///
/// let sync = SyncRequest::new().set_sync_key("1").set_window_size(25);
/// let bytes = to_vec(&sync).unwrap();
/// let back: SyncRequest = from_slice(&bytes).unwrap();
/// assert_eq!(back, sync);
/// ```
///
/// Field types must satisfy the derives placed on the struct (`Debug`,
/// `Clone`, `PartialEq`, `Default`).
#[macro_export]
macro_rules! wbxml_record {
  (
    $(#[$meta:meta])*
    $vis:vis struct $name:ident { }
  ) => {
    $(#[$meta])*
    #[derive(Debug, Clone, PartialEq, Default)]
    $vis struct $name {}

    impl $name {
      pub fn new() -> Self {
        Self::default()
      }
    }

    impl $crate::WbxmlRecord for $name {
      const NAME: &'static str = stringify!($name);

      fn fields() -> Vec<$crate::FieldDef> {
        Vec::new()
      }

      fn from_fields(_slots: $crate::FieldSlots) -> Result<Self, $crate::WbxmlError> {
        Ok(Self {})
      }

      fn field(&self, _index: usize) -> $crate::FieldRef<'_> {
        $crate::FieldRef::Absent
      }
    }
  };
  (
    $(#[$meta:meta])*
    $vis:vis struct $name:ident {
      $( $(#[$field_meta:meta])* $field:ident : $kind:tt @ $tag:expr ),+ $(,)?
    }
  ) => {
    $(#[$meta])*
    #[derive(Debug, Clone, PartialEq, Default)]
    $vis struct $name {
      $( $(#[$field_meta])* pub $field : $crate::__wbxml_field_ty!($kind) ),+
    }

    impl $name {
      pub fn new() -> Self {
        Self::default()
      }
    }

    $( $crate::__wbxml_field_builder!($name, $field, $kind); )+

    impl $crate::WbxmlRecord for $name {
      const NAME: &'static str = stringify!($name);

      fn fields() -> Vec<$crate::FieldDef> {
        let mut defs = Vec::new();
        $(
          defs.push($crate::FieldDef::new(
            $crate::Tag::from_raw($tag),
            defs.len(),
            $crate::__wbxml_field_kind!($kind),
          ));
        )+
        defs
      }

      fn from_fields(mut slots: $crate::FieldSlots) -> Result<Self, $crate::WbxmlError> {
        let mut index = 0usize;
        $(
          let $field = $crate::__wbxml_take_field!(slots, index, $kind);
          index += 1;
        )+
        let _ = index;
        Ok(Self { $( $field ),+ })
      }

      fn field(&self, index: usize) -> $crate::FieldRef<'_> {
        let mut current = 0usize;
        $(
          if index == current {
            return $crate::__wbxml_field_ref!(&self.$field, $kind);
          }
          current += 1;
        )+
        let _ = current;
        $crate::FieldRef::Absent
      }
    }
  };
}
