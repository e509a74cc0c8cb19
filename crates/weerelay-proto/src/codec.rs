//! Tokio codec glue for the binary frame format.
//!
//! Incoming bytes are split into frames, decompressed, and decoded into
//! [`RelayMessage`] values; outgoing writes are pre-rendered command
//! lines (see [`crate::command`]) passed through verbatim so a batch
//! stays one atomic write.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::error::ProtocolError;
use crate::frame;
use crate::object::RelayMessage;

/// Codec pairing frame decoding with command-line encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct RelayCodec;

impl RelayCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for RelayCodec {
    type Item = RelayMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let msg = frame::next_message(src)?;
        if let Some(ref msg) = msg {
            trace!(id = %msg.id, objects = msg.objects.len(), "decoded frame");
        }
        Ok(msg)
    }
}

impl Encoder<String> for RelayCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(line.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    fn frame_bytes(id: &str) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&(id.len() as i32).to_be_bytes());
        payload.extend_from_slice(id.as_bytes());
        payload.extend_from_slice(&[b'i', b'n', b't', 0, 0, 0, 1]);

        let total = (frame::FRAME_HEADER_LEN + payload.len()) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&total.to_be_bytes());
        bytes.push(frame::COMPRESSION_NONE);
        bytes.extend_from_slice(&payload);
        bytes
    }

    #[test]
    fn test_decoder_handles_split_input() {
        let mut codec = RelayCodec::new();
        let bytes = frame_bytes("_pong");
        let mut buf = BytesMut::new();

        buf.extend_from_slice(&bytes[..3]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[3..]);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.id, "_pong");
        assert_eq!(msg.objects, vec![Object::Int(1)]);
    }

    #[test]
    fn test_encoder_passes_lines_through() {
        let mut codec = RelayCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("ping 1\nping 2\n".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"ping 1\nping 2\n");
    }
}
