//! Domain events emitted by the session core.
//!
//! The core never calls into UI code: consumers receive these events on
//! an mpsc channel and read session state through the shared registry.
//! Event delivery is best-effort; a consumer that stops draining its
//! channel loses events rather than blocking the read loop.

use tokio::sync::mpsc;
use tracing::warn;

use crate::session::buffer::BufferMessage;

/// Events delivered to the consumer of a relay session.
#[derive(Clone, Debug)]
pub enum RelayEvent {
    /// The transport is up; authentication is in progress.
    Connected,
    /// Authentication succeeded and the initial sync was requested.
    LoggedIn,
    /// The connection dropped; the caller decides whether to reconnect.
    ConnectionLost {
        /// Human-readable cause.
        reason: String,
    },
    /// Buffers were created, removed, renamed, or reordered.
    BufferListChanged,
    /// A single buffer's metadata changed (title, hidden flag, ...).
    BufferChanged {
        /// Pointer of the affected buffer.
        buffer: String,
    },
    /// One line arrived on a synced buffer.
    MessageAdded {
        /// Pointer of the receiving buffer.
        buffer: String,
        /// The stored message.
        message: BufferMessage,
    },
    /// A backlog batch was inserted into a buffer.
    MessageBatch {
        /// Pointer of the receiving buffer.
        buffer: String,
        /// Number of lines inserted.
        count: usize,
    },
    /// A buffer's nicklist changed.
    NicklistChanged {
        /// Pointer of the affected buffer.
        buffer: String,
    },
    /// A highlighted line arrived that had not been notified before.
    Highlight {
        /// Pointer of the receiving buffer.
        buffer: String,
        /// The highlighted message.
        message: BufferMessage,
    },
    /// Hotlist counters were re-derived.
    HotlistChanged,
    /// The option cache was refreshed.
    OptionsParsed,
    /// The relay is restarting; all buffers were cleared.
    UpgradeStarted,
    /// The relay finished restarting; a full re-sync was requested.
    UpgradeEnded,
}

/// Best-effort sender for [`RelayEvent`]s.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::Sender<RelayEvent>,
}

impl EventSink {
    /// Create a sink and its receiving half.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RelayEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Emit an event, dropping it if the consumer has fallen behind.
    pub fn emit(&self, event: RelayEvent) {
        if let Err(e) = self.tx.try_send(event) {
            warn!(error = %e, "dropping event, consumer not keeping up");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_and_receive() {
        let (sink, mut rx) = EventSink::channel(4);
        sink.emit(RelayEvent::Connected);
        sink.emit(RelayEvent::BufferListChanged);
        assert!(matches!(rx.try_recv().unwrap(), RelayEvent::Connected));
        assert!(matches!(
            rx.try_recv().unwrap(),
            RelayEvent::BufferListChanged
        ));
    }

    #[test]
    fn test_full_channel_drops_instead_of_blocking() {
        let (sink, mut rx) = EventSink::channel(1);
        sink.emit(RelayEvent::Connected);
        sink.emit(RelayEvent::LoggedIn); // dropped
        assert!(matches!(rx.try_recv().unwrap(), RelayEvent::Connected));
        assert!(rx.try_recv().is_err());
    }
}
