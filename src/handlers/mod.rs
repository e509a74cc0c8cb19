//! Message handlers and the dispatch registry.
//!
//! Every relay message carries an id: either a correlation id this
//! client attached to a request, or a `_`-prefixed push id the relay
//! chose. The registry maps ids to handlers; unknown ids are logged and
//! dropped so newer relays never break the session.

mod buffers;
mod lines;
mod login;
mod nicklist;
mod state;

pub use buffers::{
    BufferClearedHandler, BufferClosingHandler, BufferListHandler, BufferMetaHandler,
    BufferOpenedHandler,
};
pub use lines::{BacklogHandler, LineAddedHandler};
pub use login::{HandshakeHandler, PongHandler, UpgradeEndedHandler, UpgradeHandler, VersionHandler};
pub use nicklist::{NicklistDiffHandler, NicklistHandler};
pub use state::{HotlistHandler, OptionsHandler, ServersHandler};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;
use weerelay_proto::{Command, RelayMessage};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::events::EventSink;
use crate::session::SessionState;

/// Correlation ids this client attaches to its requests.
pub mod ids {
    /// Full buffer listing.
    pub const LISTBUFFERS: &str = "listbuffers";
    /// Per-buffer backlog.
    pub const LISTLINES: &str = "listlines";
    /// Nicklist snapshot.
    pub const NICKLIST: &str = "nicklist";
    /// Hotlist snapshot.
    pub const HOTLIST: &str = "hotlist";
    /// Option dump.
    pub const GETOPTIONS: &str = "getoptions";
    /// IRC server capability dump.
    pub const SERVERS: &str = "servers";
    /// Hash negotiation reply.
    pub const HANDSHAKE: &str = "handshake";
    /// Post-init version probe; doubles as the login acknowledgement.
    pub const VERSION: &str = "version";
}

/// Request constructors shared by the login flow and the handlers.
///
/// Keeping them in one place keeps every request's hdata path and key
/// list next to the correlation id its reply comes back under.
pub mod requests {
    use super::ids;
    use weerelay_proto::Command;

    /// Keys requested for every scrollback line.
    const LINE_KEYS: &str = "buffer,date,displayed,highlight,prefix,message,tags_array";

    /// The full buffer listing.
    pub fn list_buffers() -> (Command, &'static str) {
        (
            Command::Hdata {
                path: "buffer:gui_buffers(*)".into(),
                keys: Some(
                    "number,name,full_name,short_name,title,hidden,local_variables".into(),
                ),
            },
            ids::LISTBUFFERS,
        )
    }

    /// The last `count` lines of one buffer.
    pub fn list_lines(ptr: &str, count: u32) -> (Command, &'static str) {
        (
            Command::Hdata {
                path: format!("buffer:{ptr}/own_lines/last_line(-{count})/data"),
                keys: Some(LINE_KEYS.into()),
            },
            ids::LISTLINES,
        )
    }

    /// The nicklist of one buffer.
    pub fn nicklist(ptr: &str) -> (Command, &'static str) {
        (
            Command::Nicklist {
                buffer: Some(ptr.to_string()),
            },
            ids::NICKLIST,
        )
    }

    /// The full hotlist.
    pub fn hotlist() -> (Command, &'static str) {
        (
            Command::Hdata {
                path: "hotlist:gui_hotlist(*)".into(),
                keys: None,
            },
            ids::HOTLIST,
        )
    }

    /// Every relay option.
    pub fn get_options() -> (Command, &'static str) {
        (
            Command::Infolist {
                name: "option".into(),
                pointer: None,
                args: None,
            },
            ids::GETOPTIONS,
        )
    }

    /// IRC server capabilities.
    pub fn servers() -> (Command, &'static str) {
        (
            Command::Hdata {
                path: "irc_server:irc_servers(*)".into(),
                keys: Some(
                    "name,buffer,nick,nick_modes,isupport,chantypes,chanmodes,\
                     prefix_modes,prefix_chars"
                        .into(),
                ),
            },
            ids::SERVERS,
        )
    }

    /// Relay version probe.
    pub fn version_probe() -> (Command, &'static str) {
        (
            Command::Info {
                name: "version".into(),
            },
            ids::VERSION,
        )
    }

    /// Subscribe to everything.
    pub fn sync_all() -> Command {
        Command::Sync {
            buffers: vec![],
            signals: vec![],
        }
    }

    /// Unsubscribe from everything.
    pub fn desync_all() -> Command {
        Command::Desync {
            buffers: vec![],
            signals: vec![],
        }
    }
}

/// Sending half of the connection, shared by handlers and the client.
///
/// Lines are rendered here and queued to the writer task; a queued line
/// is written in full before the next one starts.
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: mpsc::Sender<String>,
}

impl Outbox {
    /// Wrap a writer-task channel.
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    /// Render and queue one command.
    pub async fn send(&self, command: &Command, id: Option<&str>) -> Result<(), RelayError> {
        self.send_raw(command.to_line(id)).await
    }

    /// Queue an already-rendered blob (a single line or a batch).
    pub async fn send_raw(&self, rendered: String) -> Result<(), RelayError> {
        self.tx
            .send(rendered)
            .await
            .map_err(|_| RelayError::ConnectionLost("command writer closed".into()))
    }
}

/// Everything a handler may touch.
#[derive(Clone)]
pub struct Context {
    /// Shared session mirror. Handlers are the only writers.
    pub session: Arc<RwLock<SessionState>>,
    /// Outgoing command queue.
    pub outbox: Outbox,
    /// Event channel to the consumer.
    pub events: EventSink,
    /// Connection settings.
    pub config: Arc<RelayConfig>,
}

/// Result type for message handlers.
pub type HandlerResult = Result<(), RelayError>;

/// Trait implemented by all message handlers.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle one incoming message.
    async fn handle(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult;
}

/// Registry of message handlers, keyed by message id.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Registry {
    /// Create a registry with every handler registered.
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

        // Replies to our own requests.
        handlers.insert(ids::HANDSHAKE, Box::new(HandshakeHandler));
        handlers.insert(ids::VERSION, Box::new(VersionHandler));
        handlers.insert(ids::LISTBUFFERS, Box::new(BufferListHandler));
        handlers.insert(ids::LISTLINES, Box::new(BacklogHandler));
        handlers.insert(ids::NICKLIST, Box::new(NicklistHandler));
        handlers.insert(ids::HOTLIST, Box::new(HotlistHandler));
        handlers.insert(ids::GETOPTIONS, Box::new(OptionsHandler));
        handlers.insert(ids::SERVERS, Box::new(ServersHandler));

        // Pushes from the sync subscription.
        handlers.insert("_buffer_line_added", Box::new(LineAddedHandler));
        handlers.insert("_buffer_opened", Box::new(BufferOpenedHandler));
        handlers.insert("_buffer_closing", Box::new(BufferClosingHandler));
        handlers.insert("_buffer_cleared", Box::new(BufferClearedHandler));
        handlers.insert("_buffer_renamed", Box::new(BufferMetaHandler));
        handlers.insert("_buffer_title_changed", Box::new(BufferMetaHandler));
        handlers.insert("_buffer_moved", Box::new(BufferMetaHandler));
        handlers.insert("_buffer_hidden", Box::new(BufferMetaHandler));
        handlers.insert("_buffer_unhidden", Box::new(BufferMetaHandler));
        handlers.insert("_buffer_localvar_added", Box::new(BufferMetaHandler));
        handlers.insert("_buffer_localvar_changed", Box::new(BufferMetaHandler));
        handlers.insert("_buffer_localvar_removed", Box::new(BufferMetaHandler));
        handlers.insert("_buffer_type_changed", Box::new(BufferMetaHandler));
        handlers.insert("_nicklist", Box::new(NicklistHandler));
        handlers.insert("_nicklist_diff", Box::new(NicklistDiffHandler));
        handlers.insert("_pong", Box::new(PongHandler));
        handlers.insert("_upgrade", Box::new(UpgradeHandler));
        handlers.insert("_upgrade_ended", Box::new(UpgradeEndedHandler));

        Self { handlers }
    }

    /// Dispatch one message to its handler.
    ///
    /// Messages with unknown ids are logged at debug level and dropped;
    /// a relay is free to push ids this client never asked about.
    pub async fn dispatch(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        match self.handlers.get(msg.id.as_str()) {
            Some(handler) => handler.handle(ctx, msg).await,
            None => {
                debug!(id = %msg.id, objects = msg.objects.len(), "no handler for message id");
                Ok(())
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::events::RelayEvent;

    /// A context wired to in-memory channels, for handler tests.
    pub fn context() -> (
        Context,
        mpsc::Receiver<String>,
        mpsc::Receiver<RelayEvent>,
    ) {
        let (out_tx, out_rx) = mpsc::channel(64);
        let (events, event_rx) = EventSink::channel(64);
        let ctx = Context {
            session: Arc::new(RwLock::new(SessionState::default())),
            outbox: Outbox::new(out_tx),
            events,
            config: Arc::new(RelayConfig::new("relay.test", 9001)),
        };
        (ctx, out_rx, event_rx)
    }
}
