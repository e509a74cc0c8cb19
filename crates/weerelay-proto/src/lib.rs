//! # weerelay-proto
//!
//! A Rust library for the WeeChat relay protocol: binary framing with
//! optional zlib compression, the typed object format (hdata, infolists,
//! hashtables, and friends), textual command serialization, and the
//! password handshake hashing schemes.
//!
//! ## Features
//!
//! - Length-prefixed frame splitting with zlib decompression
//! - Recursive decoding of every relay object type
//! - Exact-inverse object encoding for round-trip testing and fixtures
//! - Outgoing command construction with correlation ids and atomic batches
//! - Handshake negotiation with plain, SHA-2, and PBKDF2 password hashing
//! - Optional Tokio codec integration (`tokio` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use weerelay_proto::{Command, InitAuth, Compression};
//!
//! let init = Command::Init {
//!     auth: InitAuth::Password("secret".into()),
//!     compression: Compression::Off,
//! };
//! assert_eq!(init.to_line(None), "init password=secret,compression=off\n");
//!
//! let buffers = Command::Hdata {
//!     path: "buffer:gui_buffers(*)".into(),
//!     keys: Some("number,full_name".into()),
//! };
//! assert_eq!(
//!     buffers.to_line(Some("listbuffers")),
//!     "(listbuffers) hdata buffer:gui_buffers(*) number,full_name\n"
//! );
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod command;
pub mod decode;
pub mod encode;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod object;

pub use self::command::{Command, CommandBatch, Compression, InitAuth};
pub use self::decode::Decoder;
pub use self::encode::RelayEncode;
pub use self::error::{AuthError, BatchError, ProtocolError};
pub use self::frame::{decode_message, encode_frame, next_message, split_frame, MAX_FRAME_LEN};
pub use self::handshake::{
    compute_password_hash, generate_client_nonce, negotiate, HandshakeReply, HashAlgo,
};
pub use self::object::{
    Hdata, HdataEntry, Infolist, Object, ObjectType, RelayMessage, NULL_POINTER,
};

#[cfg(feature = "tokio")]
pub mod codec;
#[cfg(feature = "tokio")]
pub use self::codec::RelayCodec;
