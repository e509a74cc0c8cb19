//! WeeChat relay client core.
//!
//! This crate mirrors a remote WeeChat instance over its relay
//! protocol: it connects (TCP, TLS, or WebSocket), authenticates,
//! subscribes to updates, and maintains a local copy of the buffer
//! list, scrollback, nicklists, unread counters, and relay options.
//! Consumers read the mirror through a shared [`session::SessionState`]
//! and react to [`events::RelayEvent`]s; they never parse protocol data
//! themselves.
//!
//! The wire format lives in the [`weerelay_proto`] crate; this crate
//! adds the session semantics on top.
//!
//! ```no_run
//! use weerelay::{connect, RelayConfig, RelayEvent};
//!
//! # async fn run() -> Result<(), weerelay::RelayError> {
//! let mut config = RelayConfig::new("relay.example.org", 9001);
//! config.password = "s3cret".into();
//!
//! let (handle, mut events) = connect(config).await?;
//! while let Some(event) = events.recv().await {
//!     match event {
//!         RelayEvent::LoggedIn => println!("connected"),
//!         RelayEvent::MessageAdded { buffer, message } => {
//!             println!("{buffer}: {}", message.text);
//!         }
//!         RelayEvent::ConnectionLost { reason } => {
//!             eprintln!("lost: {reason}");
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! # let _ = handle;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod session;
pub mod transport;

pub use client::{connect, RelayHandle};
pub use config::{ConnectionType, HandshakeMode, RelayConfig};
pub use error::RelayError;
pub use events::RelayEvent;
pub use session::SessionState;

pub use weerelay_proto as proto;
