//! Wire encoding for typed objects.
//!
//! The client itself only ever sends textual commands, but the object
//! encoder is the exact inverse of [`crate::decode`] and backs the
//! round-trip test suite and fixture construction for the session layer.

use std::io::{self, Write};

use crate::object::{Hdata, Infolist, Object, ObjectType, NULL_POINTER};

/// A trait for encoding relay protocol objects directly to a byte stream.
pub trait RelayEncode {
    /// Encode this value to the given writer.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the write fails.
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    /// Encode this value to a new `Vec<u8>`.
    #[must_use]
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        let _ = self.encode(&mut buf);
        buf
    }
}

impl RelayEncode for Object {
    /// Encode with a leading 3-character type tag.
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.object_type().tag().as_bytes())?;
        encode_body(self, writer)
    }
}

/// Encode an object without its type tag, as hdata entry fields are laid
/// out on the wire.
pub fn encode_untagged<W: Write>(obj: &Object, writer: &mut W) -> io::Result<()> {
    encode_body(obj, writer)
}

fn encode_body<W: Write>(obj: &Object, writer: &mut W) -> io::Result<()> {
    match obj {
        Object::Char(c) => writer.write_all(&[*c]),
        Object::Int(i) => writer.write_all(&i.to_be_bytes()),
        Object::Long(l) | Object::Time(l) => encode_long(*l, writer),
        Object::Str(s) => encode_string(s.as_deref(), writer),
        Object::Buf(b) => encode_bytes(b.as_deref(), writer),
        Object::Ptr(p) => encode_pointer(p, writer),
        Object::Array(items) => {
            let elem_ty = items
                .first()
                .map(Object::object_type)
                .unwrap_or(ObjectType::Str);
            writer.write_all(elem_ty.tag().as_bytes())?;
            writer.write_all(&(items.len() as i32).to_be_bytes())?;
            for item in items {
                encode_body(item, writer)?;
            }
            Ok(())
        }
        Object::Hashtable(pairs) => {
            let key_ty = pairs
                .first()
                .map(|(k, _)| k.object_type())
                .unwrap_or(ObjectType::Str);
            let val_ty = pairs
                .first()
                .map(|(_, v)| v.object_type())
                .unwrap_or(ObjectType::Str);
            writer.write_all(key_ty.tag().as_bytes())?;
            writer.write_all(val_ty.tag().as_bytes())?;
            writer.write_all(&(pairs.len() as i32).to_be_bytes())?;
            for (key, value) in pairs {
                encode_body(key, writer)?;
                encode_body(value, writer)?;
            }
            Ok(())
        }
        Object::Hdata(hdata) => encode_hdata(hdata, writer),
        Object::Info { name, value } => {
            encode_string(Some(name), writer)?;
            encode_string(value.as_deref(), writer)
        }
        Object::Infolist(list) => encode_infolist(list, writer),
    }
}

fn encode_long<W: Write>(value: i64, writer: &mut W) -> io::Result<()> {
    let digits = value.to_string();
    writer.write_all(&[digits.len() as u8])?;
    writer.write_all(digits.as_bytes())
}

fn encode_string<W: Write>(value: Option<&str>, writer: &mut W) -> io::Result<()> {
    encode_bytes(value.map(str::as_bytes), writer)
}

fn encode_bytes<W: Write>(value: Option<&[u8]>, writer: &mut W) -> io::Result<()> {
    match value {
        None => writer.write_all(&(-1i32).to_be_bytes()),
        Some(bytes) => {
            writer.write_all(&(bytes.len() as i32).to_be_bytes())?;
            writer.write_all(bytes)
        }
    }
}

fn encode_pointer<W: Write>(ptr: &str, writer: &mut W) -> io::Result<()> {
    let hex = if ptr == NULL_POINTER {
        "0"
    } else {
        ptr.strip_prefix("0x").unwrap_or(ptr)
    };
    writer.write_all(&[hex.len() as u8])?;
    writer.write_all(hex.as_bytes())
}

fn encode_hdata<W: Write>(hdata: &Hdata, writer: &mut W) -> io::Result<()> {
    if hdata.entries.is_empty() && hdata.path.is_empty() && hdata.keys.is_empty() {
        // Unset schema: null path, null keys, zero count.
        encode_string(None, writer)?;
        encode_string(None, writer)?;
        return writer.write_all(&0i32.to_be_bytes());
    }

    encode_string(Some(&hdata.path.join("/")), writer)?;
    let keys = hdata
        .keys
        .iter()
        .map(|(name, ty)| format!("{}:{}", name, ty.tag()))
        .collect::<Vec<_>>()
        .join(",");
    encode_string(Some(&keys), writer)?;
    writer.write_all(&(hdata.entries.len() as i32).to_be_bytes())?;

    for entry in &hdata.entries {
        for ptr in &entry.pointers {
            encode_pointer(ptr, writer)?;
        }
        // Fields go out in schema order, not map order.
        for (name, _) in &hdata.keys {
            if let Some(value) = entry.fields.get(name) {
                encode_body(value, writer)?;
            }
        }
    }
    Ok(())
}

fn encode_infolist<W: Write>(list: &Infolist, writer: &mut W) -> io::Result<()> {
    encode_string(Some(&list.name), writer)?;
    writer.write_all(&(list.items.len() as i32).to_be_bytes())?;
    for item in &list.items {
        writer.write_all(&(item.len() as i32).to_be_bytes())?;
        for (name, value) in item {
            encode_string(Some(name), writer)?;
            value.encode(writer)?;
        }
    }
    Ok(())
}
