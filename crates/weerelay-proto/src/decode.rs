//! Recursive decoder for the typed object format.
//!
//! Every object on the wire is preceded by a 3-character ASCII type tag,
//! except inside hdata entries and infolist items where the type is
//! supplied contextually (hdata: by the schema; infolist: by a per-field
//! tag). The decoder is a plain cursor over a fully received payload;
//! framing and decompression happen in [`crate::frame`] before this
//! module runs.

use crate::error::ProtocolError;
use crate::object::{Hdata, HdataEntry, Infolist, Object, ObjectType, NULL_POINTER};
use std::collections::HashMap;

/// Cursor over a decompressed message payload.
#[derive(Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Create a decoder over a payload.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether the payload is exhausted.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < n {
            return Err(ProtocolError::Truncated {
                needed: n,
                have: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a 3-character type tag.
    pub fn read_type(&mut self) -> Result<ObjectType, ProtocolError> {
        let raw = self.take(3)?;
        let tag = std::str::from_utf8(raw)
            .map_err(|_| ProtocolError::UnknownType(format!("{:?}", raw)))?;
        ObjectType::from_tag(tag).ok_or_else(|| ProtocolError::UnknownType(tag.to_string()))
    }

    /// Read an object of the given type, without a leading tag.
    pub fn read_object(&mut self, ty: ObjectType) -> Result<Object, ProtocolError> {
        match ty {
            ObjectType::Char => Ok(Object::Char(self.read_u8()?)),
            ObjectType::Int => Ok(Object::Int(self.read_i32()?)),
            ObjectType::Long => Ok(Object::Long(self.read_long()?)),
            ObjectType::Str => Ok(Object::Str(self.read_string()?)),
            ObjectType::Buf => Ok(Object::Buf(self.read_buffer()?)),
            ObjectType::Ptr => Ok(Object::Ptr(self.read_pointer()?)),
            ObjectType::Time => Ok(Object::Time(self.read_long()?)),
            ObjectType::Array => self.read_array(),
            ObjectType::Hashtable => self.read_hashtable(),
            ObjectType::Hdata => Ok(Object::Hdata(self.read_hdata()?)),
            ObjectType::Info => self.read_info(),
            ObjectType::Infolist => Ok(Object::Infolist(self.read_infolist()?)),
        }
    }

    /// Read a type tag followed by the object it announces.
    pub fn read_tagged(&mut self) -> Result<Object, ProtocolError> {
        let ty = self.read_type()?;
        self.read_object(ty)
    }

    /// Read a `lon`/`tim` value: a 1-byte length followed by that many
    /// ASCII digits.
    ///
    /// A zero length legally decodes to 0 rather than erroring; some
    /// relays emit it and the leniency is deliberate.
    fn read_long(&mut self) -> Result<i64, ProtocolError> {
        let len = self.read_u8()? as usize;
        if len == 0 {
            return Ok(0);
        }
        let raw = self.take(len)?;
        let text = std::str::from_utf8(raw)
            .map_err(|_| ProtocolError::InvalidNumber(format!("{:?}", raw)))?;
        text.parse::<i64>()
            .map_err(|_| ProtocolError::InvalidNumber(text.to_string()))
    }

    /// Read a `str` value. Length 0 is the empty string; length -1 (as a
    /// signed Int32) is the null string, distinct from empty.
    fn read_string(&mut self) -> Result<Option<String>, ProtocolError> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(None);
        }
        let raw = self.take(len as usize)?;
        Ok(Some(String::from_utf8(raw.to_vec())?))
    }

    /// Read a `buf` value: same prefixing as `str`, raw bytes out.
    fn read_buffer(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(None);
        }
        Ok(Some(self.take(len as usize)?.to_vec()))
    }

    /// Read a `ptr` value: a 1-byte length followed by ASCII hex.
    ///
    /// A single `'0'` payload is the canonical null pointer and renders
    /// as `"0x0"`; all others render as `"0x"` plus the hex characters.
    fn read_pointer(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u8()? as usize;
        let raw = self.take(len)?;
        let hex = std::str::from_utf8(raw)
            .map_err(|_| ProtocolError::InvalidNumber(format!("{:?}", raw)))?;
        if hex.is_empty() || hex == "0" {
            return Ok(NULL_POINTER.to_string());
        }
        Ok(format!("0x{}", hex))
    }

    fn read_array(&mut self) -> Result<Object, ProtocolError> {
        let elem_ty = self.read_type()?;
        let count = self.read_i32()?.max(0) as usize;
        let mut items = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            items.push(self.read_object(elem_ty)?);
        }
        Ok(Object::Array(items))
    }

    fn read_hashtable(&mut self) -> Result<Object, ProtocolError> {
        let key_ty = self.read_type()?;
        let val_ty = self.read_type()?;
        let count = self.read_i32()?.max(0) as usize;
        let mut pairs = Vec::with_capacity(count.min(4096));
        let mut seen: HashMap<String, ()> = HashMap::with_capacity(count.min(4096));
        for _ in 0..count {
            let key = self.read_object(key_ty)?;
            let value = self.read_object(val_ty)?;
            if let Some(key_str) = key.key_string() {
                if seen.insert(key_str.clone(), ()).is_some() {
                    return Err(ProtocolError::KeyCollision(key_str));
                }
            }
            pairs.push((key, value));
        }
        Ok(Object::Hashtable(pairs))
    }

    /// Read an `hda` row set: path string, `name:type` key schema, then
    /// the entry count. Each entry carries one pointer per path segment
    /// followed by one typed value per schema key.
    fn read_hdata(&mut self) -> Result<Hdata, ProtocolError> {
        let path_str = self.read_string()?;
        let keys_str = self.read_string()?;
        let count = self.read_i32()?.max(0) as usize;

        let path: Vec<String> = path_str
            .as_deref()
            .unwrap_or("")
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let mut keys = Vec::new();
        for pair in keys_str.as_deref().unwrap_or("").split(',') {
            if pair.is_empty() {
                continue;
            }
            let (name, ty_tag) = pair
                .split_once(':')
                .ok_or_else(|| ProtocolError::InvalidNumber(pair.to_string()))?;
            let ty = ObjectType::from_tag(ty_tag)
                .ok_or_else(|| ProtocolError::UnknownType(ty_tag.to_string()))?;
            keys.push((name.to_string(), ty));
        }

        let mut entries = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let mut pointers = Vec::with_capacity(path.len());
            for _ in 0..path.len() {
                pointers.push(self.read_pointer()?);
            }
            let mut fields = HashMap::with_capacity(keys.len());
            for (name, ty) in &keys {
                fields.insert(name.clone(), self.read_object(*ty)?);
            }
            entries.push(HdataEntry { pointers, fields });
        }

        Ok(Hdata {
            path,
            keys,
            entries,
        })
    }

    fn read_info(&mut self) -> Result<Object, ProtocolError> {
        let name = self.read_string()?.unwrap_or_default();
        let value = self.read_string()?;
        Ok(Object::Info { name, value })
    }

    /// Read an `inl` infolist. Field values are self-tagged, unlike hdata
    /// which relies on the shared schema.
    fn read_infolist(&mut self) -> Result<Infolist, ProtocolError> {
        let name = self.read_string()?.unwrap_or_default();
        let count = self.read_i32()?.max(0) as usize;
        let mut items = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let field_count = self.read_i32()?.max(0) as usize;
            let mut fields = Vec::with_capacity(field_count.min(4096));
            for _ in 0..field_count {
                let field_name = self.read_string()?.unwrap_or_default();
                let value = self.read_tagged()?;
                fields.push((field_name, value));
            }
            items.push(fields);
        }
        Ok(Infolist { name, items })
    }
}
