//! Buffers and their message lists.
//!
//! A buffer is identified by its relay pointer, an opaque string that
//! stays stable until the relay restarts or upgrades. Parent/child
//! relationships are stored as pointer identifiers and resolved through
//! the registry on demand, never as live references.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use weerelay_proto::HdataEntry;

/// What a buffer represents, derived from its `type` local variable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BufferKind {
    /// An IRC server buffer.
    Server,
    /// A channel.
    Channel,
    /// A private query.
    Private,
    /// Anything else (core buffer, plugin buffers, ...).
    #[default]
    Other,
}

impl BufferKind {
    fn from_local_var(value: Option<&str>) -> Self {
        match value {
            Some("server") => Self::Server,
            Some("channel") => Self::Channel,
            Some("private") => Self::Private,
            _ => Self::Other,
        }
    }
}

/// Broad classification of a line, derived from its tags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MessageKind {
    /// Regular channel/private message.
    Privmsg,
    /// `/me` action.
    Action,
    /// Join announcement.
    Join,
    /// Part announcement.
    Part,
    /// Quit announcement.
    Quit,
    /// Nick change.
    NickChange,
    /// Topic change.
    Topic,
    /// Notice.
    Notice,
    /// Everything else.
    #[default]
    Other,
}

/// One line of scrollback.
///
/// Identity is the `(line_ptr, buffer_ptr)` pair, which is also the
/// deduplication key. Everything except `notified` is immutable after
/// creation.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferMessage {
    /// Pointer of the line object on the relay side.
    pub line_ptr: String,
    /// Pointer of the owning buffer.
    pub buffer_ptr: String,
    /// Line timestamp.
    pub date: DateTime<Utc>,
    /// Whether the relay flagged this line as a highlight.
    pub highlight: bool,
    /// Whether the line is displayed (filtered lines are not).
    pub displayed: bool,
    /// Raw tag list.
    pub tags: Vec<String>,
    /// Prefix column (usually the nick, with color codes).
    pub prefix: String,
    /// Message body.
    pub text: String,
    /// Sender nick derived from the `nick_*` tag.
    pub nick: Option<String>,
    /// Classification derived from the `irc_*` tags.
    pub kind: MessageKind,
    /// Whether a highlight notification was already fired for this line.
    /// The only mutable field.
    pub notified: bool,
}

impl BufferMessage {
    /// Build a message from a line hdata entry.
    ///
    /// The line pointer is the entry's own identity; the buffer pointer
    /// comes from the `buffer` field, falling back to the entry's root
    /// pointer for paths that start at the buffer.
    pub fn from_entry(entry: &HdataEntry) -> Option<Self> {
        let line_ptr = entry.own_pointer()?.to_string();
        let buffer_ptr = entry
            .ptr_field("buffer")
            .or_else(|| entry.root_pointer())?
            .to_string();

        let tags: Vec<String> = entry
            .field("tags_array")
            .and_then(|o| o.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|o| o.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let date = entry.time_field("date").unwrap_or(0);
        let (nick, kind) = parse_tags(&tags);

        Some(Self {
            line_ptr,
            buffer_ptr,
            date: Utc
                .timestamp_opt(date, 0)
                .single()
                .unwrap_or(DateTime::UNIX_EPOCH),
            highlight: entry.char_field("highlight").unwrap_or(0) != 0,
            displayed: entry.char_field("displayed").unwrap_or(1) != 0,
            prefix: entry.str_field("prefix").unwrap_or_default().to_string(),
            text: entry.str_field("message").unwrap_or_default().to_string(),
            nick,
            kind,
            tags,
            notified: false,
        })
    }

    /// Whether the tags mark this line as counting toward unread state.
    ///
    /// Lines without any `notify_*` tag (or explicitly tagged
    /// `notify_none`) are joins/parts/noise and never bump counters.
    pub fn counts_toward_unread(&self) -> bool {
        self.tags.iter().any(|t| {
            matches!(
                t.as_str(),
                "notify_message" | "notify_private" | "notify_highlight"
            )
        })
    }
}

fn parse_tags(tags: &[String]) -> (Option<String>, MessageKind) {
    let mut nick = None;
    let mut kind = MessageKind::Other;
    for tag in tags {
        if let Some(n) = tag.strip_prefix("nick_") {
            nick = Some(n.to_string());
        }
        kind = match tag.as_str() {
            "irc_privmsg" if kind != MessageKind::Action => MessageKind::Privmsg,
            "irc_action" => MessageKind::Action,
            "irc_join" => MessageKind::Join,
            "irc_part" => MessageKind::Part,
            "irc_quit" => MessageKind::Quit,
            "irc_nick" => MessageKind::NickChange,
            "irc_topic" => MessageKind::Topic,
            "irc_notice" => MessageKind::Notice,
            _ => kind,
        };
    }
    (nick, kind)
}

/// A mirrored buffer: metadata, scrollback, and nicklist.
#[derive(Clone, Debug, Default)]
pub struct Buffer {
    /// Relay pointer, immutable after creation.
    pub ptr: String,
    /// Display order number.
    pub number: i32,
    /// Buffer name.
    pub name: String,
    /// Short name, when set.
    pub short_name: Option<String>,
    /// Fully qualified name (`plugin.name`).
    pub full_name: String,
    /// Title/topic line.
    pub title: String,
    /// Whether the relay flags this buffer as hidden.
    pub hidden: bool,
    /// Classification from local variables.
    pub kind: BufferKind,
    /// Owning server name from the `server` local variable.
    pub server: Option<String>,
    /// Parent buffer pointer (the server buffer for channels/queries).
    pub parent: Option<String>,
    /// Child buffer pointers (for server buffers).
    pub children: Vec<String>,
    /// Scrollback, in arrival order.
    pub messages: Vec<BufferMessage>,
    /// Nicklist entries.
    pub nicklist: Vec<crate::session::nicklist::NicklistEntry>,
    /// Unread line counter.
    pub unread: i32,
    /// Highlight counter.
    pub highlighted: i32,
    /// Raw local variables.
    pub local_vars: HashMap<String, String>,
    /// Set on creation until the detail/backlog follow-up was requested.
    pub needs_details: bool,
}

impl Buffer {
    /// Create an empty buffer for a pointer.
    pub fn new(ptr: impl Into<String>) -> Self {
        Self {
            ptr: ptr.into(),
            needs_details: true,
            ..Default::default()
        }
    }

    /// Apply metadata from a buffer-list hdata entry.
    pub fn update_from_entry(&mut self, entry: &HdataEntry) {
        if let Some(n) = entry.int_field("number") {
            self.number = n;
        }
        if let Some(name) = entry.str_field("name") {
            self.name = name.to_string();
        }
        if let Some(full) = entry.str_field("full_name") {
            self.full_name = full.to_string();
            if self.name.is_empty() {
                // full_name is "plugin.name"
                self.name = full.split_once('.').map(|(_, n)| n).unwrap_or(full).into();
            }
        }
        self.short_name = entry.str_field("short_name").map(str::to_string);
        if let Some(title) = entry.str_field("title") {
            self.title = title.to_string();
        }
        if let Some(hidden) = entry.int_field("hidden") {
            self.hidden = hidden != 0;
        } else if let Some(hidden) = entry.char_field("hidden") {
            self.hidden = hidden != 0;
        }
        if let Some(vars) = entry.field("local_variables") {
            if let Some(pairs) = vars.as_hashtable() {
                self.local_vars = pairs
                    .iter()
                    .filter_map(|(k, v)| {
                        Some((k.key_string()?, v.as_str().unwrap_or_default().to_string()))
                    })
                    .collect();
            }
        }
        self.kind = BufferKind::from_local_var(self.local_vars.get("type").map(String::as_str));
        self.server = self.local_vars.get("server").cloned();
    }

    /// The name shown to users: short name when present, else name.
    pub fn display_name(&self) -> &str {
        match self.short_name.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => &self.name,
        }
    }

    /// Append a message unless its identity is already present.
    ///
    /// Returns `false` for duplicates.
    pub fn push_message(&mut self, message: BufferMessage) -> bool {
        let dup = self
            .messages
            .iter()
            .any(|m| m.line_ptr == message.line_ptr && m.buffer_ptr == message.buffer_ptr);
        if dup {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Drop all scrollback and nicklist state, keeping metadata.
    ///
    /// Used when the remote buffer was recreated under the same pointer
    /// and on relay upgrades.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.nicklist.clear();
        self.unread = 0;
        self.highlighted = 0;
    }

    /// Zero the unread/highlight counters.
    pub fn clear_counters(&mut self) {
        self.unread = 0;
        self.highlighted = 0;
    }
}
