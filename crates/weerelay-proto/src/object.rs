//! Typed objects carried by relay messages.
//!
//! The relay encodes a small dynamically-typed value format on the wire.
//! Every object is one of the variants of [`Object`]; composite shapes
//! (arrays, hashtables, hdata, infolists) nest further objects inside.
//!
//! Accessors follow the convention of returning `Option`: asking an
//! [`Object`] for the wrong variant is a programming error in the caller,
//! not a runtime condition the protocol layer can recover from.

use std::collections::HashMap;
use std::fmt;

/// The canonical rendering of a null pointer.
pub const NULL_POINTER: &str = "0x0";

/// The 3-character ASCII type tags used on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// `chr` - a single byte.
    Char,
    /// `int` - 32-bit big-endian signed integer.
    Int,
    /// `lon` - length-prefixed ASCII-digit 64-bit integer.
    Long,
    /// `str` - length-prefixed UTF-8 string, possibly null.
    Str,
    /// `buf` - length-prefixed raw bytes, possibly null.
    Buf,
    /// `ptr` - opaque relay-side object identifier.
    Ptr,
    /// `tim` - Unix timestamp, encoded like `lon`.
    Time,
    /// `arr` - homogeneous array.
    Array,
    /// `htb` - hashtable.
    Hashtable,
    /// `hda` - schema-described row set.
    Hdata,
    /// `inf` - named info string.
    Info,
    /// `inl` - infolist with self-tagged fields.
    Infolist,
}

impl ObjectType {
    /// Parse a 3-character wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "chr" => Self::Char,
            "int" => Self::Int,
            "lon" => Self::Long,
            "str" => Self::Str,
            "buf" => Self::Buf,
            "ptr" => Self::Ptr,
            "tim" => Self::Time,
            "arr" => Self::Array,
            "htb" => Self::Hashtable,
            "hda" => Self::Hdata,
            "inf" => Self::Info,
            "inl" => Self::Infolist,
            _ => return None,
        })
    }

    /// The 3-character wire tag for this type.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Char => "chr",
            Self::Int => "int",
            Self::Long => "lon",
            Self::Str => "str",
            Self::Buf => "buf",
            Self::Ptr => "ptr",
            Self::Time => "tim",
            Self::Array => "arr",
            Self::Hashtable => "htb",
            Self::Hdata => "hda",
            Self::Info => "inf",
            Self::Infolist => "inl",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A decoded relay object.
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    /// A single byte (`chr`).
    Char(u8),
    /// A 32-bit signed integer (`int`).
    Int(i32),
    /// A 64-bit signed integer (`lon`).
    Long(i64),
    /// A UTF-8 string (`str`). `None` is the wire-level null string,
    /// distinct from the empty string.
    Str(Option<String>),
    /// Raw bytes (`buf`), possibly null.
    Buf(Option<Vec<u8>>),
    /// An opaque pointer identifier (`ptr`), rendered as `0x...`.
    Ptr(String),
    /// A Unix timestamp in seconds (`tim`).
    Time(i64),
    /// A homogeneous array (`arr`).
    Array(Vec<Object>),
    /// A hashtable (`htb`), in wire order. Keys stringify uniquely;
    /// the decoder rejects collisions.
    Hashtable(Vec<(Object, Object)>),
    /// A schema-described row set (`hda`).
    Hdata(Hdata),
    /// A named info string (`inf`).
    Info {
        /// Info name.
        name: String,
        /// Info value, possibly null.
        value: Option<String>,
    },
    /// An infolist (`inl`).
    Infolist(Infolist),
}

impl Object {
    /// The wire type tag this object would carry.
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Char(_) => ObjectType::Char,
            Self::Int(_) => ObjectType::Int,
            Self::Long(_) => ObjectType::Long,
            Self::Str(_) => ObjectType::Str,
            Self::Buf(_) => ObjectType::Buf,
            Self::Ptr(_) => ObjectType::Ptr,
            Self::Time(_) => ObjectType::Time,
            Self::Array(_) => ObjectType::Array,
            Self::Hashtable(_) => ObjectType::Hashtable,
            Self::Hdata(_) => ObjectType::Hdata,
            Self::Info { .. } => ObjectType::Info,
            Self::Infolist(_) => ObjectType::Infolist,
        }
    }

    /// The byte value, if this is a `chr`.
    pub fn as_char(&self) -> Option<u8> {
        match self {
            Self::Char(c) => Some(*c),
            _ => None,
        }
    }

    /// The integer value, if this is an `int`.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The long value, if this is a `lon` or `tim`.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(l) | Self::Time(l) => Some(*l),
            _ => None,
        }
    }

    /// The string value, if this is a non-null `str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(Some(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The pointer identifier, if this is a `ptr`.
    pub fn as_ptr(&self) -> Option<&str> {
        match self {
            Self::Ptr(p) => Some(p.as_str()),
            _ => None,
        }
    }

    /// The timestamp in Unix seconds, if this is a `tim`.
    pub fn as_time(&self) -> Option<i64> {
        match self {
            Self::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// The element list, if this is an `arr`.
    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The pair list, if this is an `htb`.
    pub fn as_hashtable(&self) -> Option<&[(Object, Object)]> {
        match self {
            Self::Hashtable(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// The row set, if this is an `hda`.
    pub fn as_hdata(&self) -> Option<&Hdata> {
        match self {
            Self::Hdata(h) => Some(h),
            _ => None,
        }
    }

    /// The infolist, if this is an `inl`.
    pub fn as_infolist(&self) -> Option<&Infolist> {
        match self {
            Self::Infolist(l) => Some(l),
            _ => None,
        }
    }

    /// The name/value pair, if this is an `inf`.
    pub fn as_info(&self) -> Option<(&str, Option<&str>)> {
        match self {
            Self::Info { name, value } => Some((name.as_str(), value.as_deref())),
            _ => None,
        }
    }

    /// Stringify this object for use as a hashtable key.
    ///
    /// Returns `None` for composite objects, which cannot be keys.
    pub fn key_string(&self) -> Option<String> {
        match self {
            Self::Char(c) => Some((*c as char).to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Long(l) | Self::Time(l) => Some(l.to_string()),
            Self::Str(s) => Some(s.clone().unwrap_or_default()),
            Self::Ptr(p) => Some(p.clone()),
            Self::Buf(_)
            | Self::Array(_)
            | Self::Hashtable(_)
            | Self::Hdata(_)
            | Self::Info { .. }
            | Self::Infolist(_) => None,
        }
    }

    /// Look up a hashtable value by stringified key.
    pub fn hashtable_get(&self, key: &str) -> Option<&Object> {
        self.as_hashtable()?
            .iter()
            .find(|(k, _)| k.key_string().as_deref() == Some(key))
            .map(|(_, v)| v)
    }
}

/// A schema-described row set over the relay's internal object graph.
///
/// Every entry shares the same `path` (class hierarchy, e.g.
/// `buffer/lines/line/line_data`) and `keys` schema. An hdata with zero
/// entries legally has an unset schema; downstream consumers must treat
/// it as empty rather than malformed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Hdata {
    /// Slash-separated class names, split.
    pub path: Vec<String>,
    /// `name:type` schema pairs, in wire order.
    pub keys: Vec<(String, ObjectType)>,
    /// Decoded entries.
    pub entries: Vec<HdataEntry>,
}

impl Hdata {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the hdata has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the entries.
    pub fn iter(&self) -> impl Iterator<Item = &HdataEntry> {
        self.entries.iter()
    }
}

/// One row of an [`Hdata`].
///
/// Carries one pointer per path segment (the last one is the entry's own
/// identity) plus a field map keyed by schema name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HdataEntry {
    /// One pointer per path segment, in path order.
    pub pointers: Vec<String>,
    /// Field values keyed by schema name.
    pub fields: HashMap<String, Object>,
}

impl HdataEntry {
    /// The entry's own identity: the pointer for the last path segment.
    pub fn own_pointer(&self) -> Option<&str> {
        self.pointers.last().map(String::as_str)
    }

    /// The pointer for the first path segment.
    pub fn root_pointer(&self) -> Option<&str> {
        self.pointers.first().map(String::as_str)
    }

    /// Look up a field by schema name.
    pub fn field(&self, name: &str) -> Option<&Object> {
        self.fields.get(name)
    }

    /// A non-null string field, if present and of string type.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name)?.as_str()
    }

    /// An integer field, if present and of int type.
    pub fn int_field(&self, name: &str) -> Option<i32> {
        self.field(name)?.as_int()
    }

    /// A char field, if present and of char type.
    pub fn char_field(&self, name: &str) -> Option<u8> {
        self.field(name)?.as_char()
    }

    /// A pointer field, if present and of pointer type.
    pub fn ptr_field(&self, name: &str) -> Option<&str> {
        self.field(name)?.as_ptr()
    }

    /// A timestamp field, if present and of time type.
    pub fn time_field(&self, name: &str) -> Option<i64> {
        self.field(name)?.as_time()
    }
}

/// An infolist: a named list of items, each a list of self-tagged fields.
///
/// Unlike [`Hdata`], field types are carried per value on the wire rather
/// than in a shared schema.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Infolist {
    /// Infolist name.
    pub name: String,
    /// Items; each item is a list of `(field name, value)` pairs.
    pub items: Vec<Vec<(String, Object)>>,
}

impl Infolist {
    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the infolist has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a field by name within one item.
    pub fn item_field<'a>(&'a self, item: usize, name: &str) -> Option<&'a Object> {
        self.items
            .get(item)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// A fully decoded relay message: an identifier plus its payload objects.
///
/// The identifier is either a correlation id chosen by this client when
/// issuing the request, or a `_`-prefixed push identifier chosen by the
/// relay for unsolicited events. An absent or null id decodes as empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelayMessage {
    /// Message identifier, empty when the relay sent none.
    pub id: String,
    /// Payload objects, in wire order.
    pub objects: Vec<Object>,
}

impl RelayMessage {
    /// The first payload object, if any.
    pub fn first(&self) -> Option<&Object> {
        self.objects.first()
    }

    /// The first payload object as an hdata, if it is one.
    pub fn hdata(&self) -> Option<&Hdata> {
        self.first()?.as_hdata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tags_round_trip() {
        for tag in [
            "chr", "int", "lon", "str", "buf", "ptr", "tim", "arr", "htb", "hda", "inf", "inl",
        ] {
            let ty = ObjectType::from_tag(tag).unwrap();
            assert_eq!(ty.tag(), tag);
        }
        assert_eq!(ObjectType::from_tag("xyz"), None);
    }

    #[test]
    fn test_accessor_mismatch_is_none() {
        let obj = Object::Int(42);
        assert_eq!(obj.as_int(), Some(42));
        assert_eq!(obj.as_str(), None);
        assert_eq!(obj.as_ptr(), None);
    }

    #[test]
    fn test_null_string_distinct_from_empty() {
        assert_eq!(Object::Str(Some(String::new())).as_str(), Some(""));
        assert_eq!(Object::Str(None).as_str(), None);
    }

    #[test]
    fn test_key_string() {
        assert_eq!(Object::Int(7).key_string().as_deref(), Some("7"));
        assert_eq!(Object::Char(b'x').key_string().as_deref(), Some("x"));
        assert_eq!(
            Object::Ptr("0xabcd".into()).key_string().as_deref(),
            Some("0xabcd")
        );
        assert_eq!(Object::Array(vec![]).key_string(), None);
    }

    #[test]
    fn test_hdata_entry_pointers() {
        let entry = HdataEntry {
            pointers: vec!["0x1".into(), "0x2".into(), "0x3".into()],
            fields: HashMap::new(),
        };
        assert_eq!(entry.root_pointer(), Some("0x1"));
        assert_eq!(entry.own_pointer(), Some("0x3"));
    }

    #[test]
    fn test_empty_hdata_is_safe() {
        let hdata = Hdata::default();
        assert!(hdata.is_empty());
        assert_eq!(hdata.iter().count(), 0);
    }
}
