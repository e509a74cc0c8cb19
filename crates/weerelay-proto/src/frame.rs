//! Binary framing and decompression.
//!
//! Each relay frame starts with a 4-byte big-endian length that counts
//! itself, followed by one compression flag byte, followed by the
//! payload. A truncated frame is fatal: the wire format offers no
//! resynchronization marker, so callers must close the connection
//! instead of hunting for the next frame boundary.

use std::io::Read;

use bytes::BytesMut;
use flate2::read::ZlibDecoder;

use crate::decode::Decoder;
use crate::error::ProtocolError;
use crate::object::RelayMessage;

/// Frame header size: 4-byte length plus 1 compression flag byte.
pub const FRAME_HEADER_LEN: usize = 5;

/// Maximum accepted frame length (16 MiB), bounding allocation on a
/// hostile or corrupted stream.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Compression flag: payload is raw.
pub const COMPRESSION_NONE: u8 = 0x00;

/// Compression flag: payload is zlib-compressed.
pub const COMPRESSION_ZLIB: u8 = 0x01;

/// Try to split one complete frame off the front of `buf`.
///
/// Returns `Ok(None)` if the buffer does not yet hold a complete frame,
/// or the decompressed payload (message id plus objects, still encoded)
/// once it does.
pub fn split_frame(buf: &mut BytesMut) -> Result<Option<Vec<u8>>, ProtocolError> {
    if buf.len() < FRAME_HEADER_LEN {
        return Ok(None);
    }

    let total = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if total < FRAME_HEADER_LEN {
        return Err(ProtocolError::FrameTooShort(total));
    }
    if total > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLong {
            actual: total,
            limit: MAX_FRAME_LEN,
        });
    }
    if buf.len() < total {
        buf.reserve(total - buf.len());
        return Ok(None);
    }

    let frame = buf.split_to(total);
    let flag = frame[4];
    let payload = &frame[FRAME_HEADER_LEN..];

    match flag {
        COMPRESSION_NONE => Ok(Some(payload.to_vec())),
        COMPRESSION_ZLIB => {
            let mut inflated = Vec::with_capacity(payload.len() * 4);
            ZlibDecoder::new(payload)
                .read_to_end(&mut inflated)
                .map_err(|e| ProtocolError::Compression(e.to_string()))?;
            Ok(Some(inflated))
        }
        other => Err(ProtocolError::UnknownCompression(other)),
    }
}

/// Decode a decompressed payload into a [`RelayMessage`].
///
/// The payload is a length-prefixed message id string (possibly empty,
/// possibly null) followed by tagged objects until exhaustion.
pub fn decode_message(payload: &[u8]) -> Result<RelayMessage, ProtocolError> {
    let mut cursor = Decoder::new(payload);

    // The id is a bare string without a type tag.
    let id = match cursor.read_object(crate::object::ObjectType::Str)? {
        crate::object::Object::Str(s) => s.unwrap_or_default(),
        _ => unreachable!("read_object(Str) yields Str"),
    };

    let mut objects = Vec::new();
    while !cursor.is_empty() {
        objects.push(cursor.read_tagged()?);
    }

    Ok(RelayMessage { id, objects })
}

/// Consume buffered bytes and decode the next complete message, if any.
pub fn next_message(buf: &mut BytesMut) -> Result<Option<RelayMessage>, ProtocolError> {
    match split_frame(buf)? {
        Some(payload) => decode_message(&payload).map(Some),
        None => Ok(None),
    }
}

/// Encode a message as one complete uncompressed frame.
///
/// The exact inverse of [`next_message`]; backs fixture construction
/// and test doubles standing in for a relay.
pub fn encode_frame(msg: &RelayMessage) -> Vec<u8> {
    use crate::encode::{encode_untagged, RelayEncode};
    use crate::object::Object;

    let mut payload = Vec::new();
    let _ = encode_untagged(&Object::Str(Some(msg.id.clone())), &mut payload);
    for obj in &msg.objects {
        let _ = obj.encode(&mut payload);
    }

    let total = (FRAME_HEADER_LEN + payload.len()) as u32;
    let mut frame = Vec::with_capacity(total as usize);
    frame.extend_from_slice(&total.to_be_bytes());
    frame.push(COMPRESSION_NONE);
    frame.extend_from_slice(&payload);
    frame
}
