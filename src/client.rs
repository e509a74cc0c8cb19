//! Connection orchestration: the read loop, the writer task, and the
//! consumer-facing handle.
//!
//! One connection runs two tasks. The writer task owns the transport's
//! write half and drains a line queue, so a queued blob (including a
//! multi-command batch) is always written in full before the next one.
//! The read loop owns the read half, dispatches every decoded message
//! through the handler registry, and doubles as the keep-alive timer.
//!
//! Reconnecting is the caller's decision: on any loss the loop emits
//! [`RelayEvent::ConnectionLost`] and stops, and the handle's
//! [`RelayHandle::reconnect_delay`] says how long to wait before trying
//! again.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use weerelay_proto::handshake::HashAlgo;
use weerelay_proto::{Command, CommandBatch, Compression, InitAuth};

use crate::config::{HandshakeMode, RelayConfig};
use crate::error::RelayError;
use crate::events::{EventSink, RelayEvent};
use crate::handlers::{ids, requests, Context, Outbox, Registry};
use crate::session::SessionState;
use crate::transport::{self, TransportReader, TransportWriter};

/// Queue depth for outgoing lines and for events to the consumer.
const CHANNEL_CAPACITY: usize = 256;

/// Handle to a live relay connection.
///
/// Cheap to clone; all clones drive the same connection.
#[derive(Clone)]
pub struct RelayHandle {
    session: Arc<RwLock<SessionState>>,
    outbox: Outbox,
    cancel: CancellationToken,
    config: Arc<RelayConfig>,
}

/// Connect, authenticate, and start the session tasks.
///
/// Returns once the transport is up and the login sequence has been
/// queued; [`RelayEvent::LoggedIn`] on the returned channel signals
/// that authentication actually succeeded.
pub async fn connect(
    config: RelayConfig,
) -> Result<(RelayHandle, mpsc::Receiver<RelayEvent>), RelayError> {
    let config = Arc::new(config);
    info!(host = %config.host, port = config.port, "connecting");
    let (reader, writer) = transport::connect(&config).await?;

    let (line_tx, line_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (events, event_rx) = EventSink::channel(CHANNEL_CAPACITY);
    let session = Arc::new(RwLock::new(SessionState::default()));
    session.write().connected = true;

    let outbox = Outbox::new(line_tx);
    let cancel = CancellationToken::new();

    tokio::spawn(writer_task(writer, line_rx, cancel.clone()));

    let ctx = Context {
        session: Arc::clone(&session),
        outbox: outbox.clone(),
        events: events.clone(),
        config: Arc::clone(&config),
    };
    events.emit(RelayEvent::Connected);

    // Kick off authentication; everything after this is reply-driven.
    match config.handshake_mode {
        HandshakeMode::Modern => {
            let command = Command::Handshake {
                algos: HashAlgo::CLIENT_PREFERENCE.to_vec(),
            };
            outbox.send(&command, Some(ids::HANDSHAKE)).await?;
        }
        HandshakeMode::Legacy => {
            outbox.send_raw(legacy_login_batch(&config)).await?;
        }
    }

    tokio::spawn(read_loop(reader, ctx, cancel.clone()));

    Ok((
        RelayHandle {
            session,
            outbox,
            cancel,
            config,
        },
        event_rx,
    ))
}

/// Clear-text `init` plus the version probe, for relays without the
/// `handshake` command. One write, like the modern path.
fn legacy_login_batch(config: &RelayConfig) -> String {
    let mut batch = CommandBatch::default();
    batch.begin().expect("fresh batch");
    batch
        .push(
            &Command::Init {
                auth: InitAuth::Password(config.password.clone()),
                compression: Compression::Default,
            },
            None,
        )
        .expect("open batch");
    let (probe, id) = requests::version_probe();
    batch.push(&probe, Some(id)).expect("open batch");
    batch.end().expect("open batch")
}

async fn writer_task(
    mut writer: TransportWriter,
    mut lines: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.recv() => match line {
                Some(line) => {
                    if let Err(e) = writer.send_line(line).await {
                        warn!(error = %e, "write failed, closing connection");
                        cancel.cancel();
                        break;
                    }
                }
                None => break,
            },
        }
    }
    // Flush lines queued before the cancellation landed (quit, mostly).
    while let Ok(line) = lines.try_recv() {
        if writer.send_line(line).await.is_err() {
            break;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "transport shutdown");
    }
}

#[instrument(skip_all, fields(host = %ctx.config.host))]
async fn read_loop(mut reader: TransportReader, ctx: Context, cancel: CancellationToken) {
    let registry = Registry::new();
    let mut ping = tokio::time::interval(Duration::from_secs(ctx.config.ping_interval_secs));
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.tick().await; // the first tick fires immediately

    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => break None,
            _ = ping.tick() => {
                let command = Command::Ping {
                    payload: chrono::Utc::now().timestamp_millis().to_string(),
                };
                if ctx.outbox.send(&command, None).await.is_err() {
                    break Some("command writer closed".to_string());
                }
            }
            message = reader.next_message() => match message {
                Ok(Some(message)) => {
                    if let Err(e) = registry.dispatch(&ctx, &message).await {
                        error!(id = %message.id, error = %e, "handler failed");
                        break Some(e.to_string());
                    }
                }
                Ok(None) => break Some("connection closed by relay".to_string()),
                Err(e) => {
                    error!(error = %e, "read failed");
                    break Some(e.to_string());
                }
            },
        }
    };

    {
        let mut session = ctx.session.write();
        session.connected = false;
        session.logged_in = false;
    }
    cancel.cancel();
    if let Some(reason) = reason {
        warn!(reason = %reason, "connection lost");
        ctx.events.emit(RelayEvent::ConnectionLost { reason });
    }
}

impl RelayHandle {
    /// The shared session mirror.
    pub fn session(&self) -> Arc<RwLock<SessionState>> {
        Arc::clone(&self.session)
    }

    /// Whether the connection tasks are still running.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// How long the caller should wait before reconnecting after a
    /// post-login loss.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.config.reconnect_delay_secs)
    }

    /// Send input text to a buffer, as if typed there.
    pub async fn send_input(&self, buffer: &str, text: &str) -> Result<(), RelayError> {
        let command = Command::Input {
            buffer: buffer.to_string(),
            text: text.to_string(),
        };
        self.outbox.send(&command, None).await
    }

    /// Mark a buffer as the one being looked at.
    ///
    /// The active buffer's counters are cleared and its live lines stop
    /// moving counters until another buffer (or none) becomes active.
    pub fn set_active(&self, buffer: Option<&str>) {
        let mut session = self.session.write();
        session.active = buffer.map(str::to_string);
        if let Some(ptr) = buffer {
            if let Some(b) = session.buffer_mut(ptr) {
                b.clear_counters();
            }
        }
    }

    /// Subscribe to updates for one buffer.
    pub async fn sync_buffer(&self, buffer: &str) -> Result<(), RelayError> {
        let command = Command::Sync {
            buffers: vec![buffer.to_string()],
            signals: vec![],
        };
        self.outbox.send(&command, None).await
    }

    /// Unsubscribe from updates for one buffer.
    pub async fn desync_buffer(&self, buffer: &str) -> Result<(), RelayError> {
        let command = Command::Desync {
            buffers: vec![buffer.to_string()],
            signals: vec![],
        };
        self.outbox.send(&command, None).await
    }

    /// Re-request the backlog for one buffer.
    pub async fn request_backlog(&self, buffer: &str) -> Result<(), RelayError> {
        let (command, id) = requests::list_lines(buffer, self.config.backlog_size);
        self.outbox.send(&command, Some(id)).await
    }

    /// Close the session cleanly.
    pub async fn quit(self) -> Result<(), RelayError> {
        // Best effort: the relay may already be gone.
        let _ = self.outbox.send(&Command::Quit, None).await;
        self.cancel.cancel();
        Ok(())
    }
}
