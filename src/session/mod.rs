//! Mirrored session state.
//!
//! [`SessionState`] is the single shared mirror of the remote side:
//! buffers keyed by pointer, per-server IRC capabilities, and the
//! option cache. It is owned behind an `Arc<RwLock<_>>`; only the
//! dispatch task writes, consumers take short read locks.

pub mod buffer;
pub mod hotlist;
pub mod nicklist;
pub mod options;
pub mod server;

use std::collections::{HashMap, HashSet};

use weerelay_proto::Hdata;

use buffer::Buffer;
use hotlist::{CounterAssign, HotlistEntry};
use options::OptionCache;
use server::IrcServer;

/// Outcome of one buffer-list reconciliation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Pointers of buffers created by this pass. These need a detail
    /// follow-up (backlog and nicklist requests).
    pub created: Vec<String>,
    /// Pointers of buffers removed by this pass.
    pub removed: Vec<String>,
}

impl ReconcileOutcome {
    /// Whether the pass changed the buffer set at all.
    pub fn changed(&self) -> bool {
        !self.created.is_empty() || !self.removed.is_empty()
    }
}

/// The complete mirrored state of one relay session.
#[derive(Debug, Default)]
pub struct SessionState {
    /// All known buffers, keyed by pointer.
    pub buffers: HashMap<String, Buffer>,
    /// Buffer pointers in display order.
    pub order: Vec<String>,
    /// Pointer of the buffer the consumer is looking at, if any.
    pub active: Option<String>,
    /// Whether the transport is up.
    pub connected: bool,
    /// Whether authentication completed.
    pub logged_in: bool,
    /// Remote relay version string, once probed.
    pub relay_version: Option<String>,
    /// IRC server capabilities, keyed by server name.
    pub servers: HashMap<String, IrcServer>,
    /// Cached relay options.
    pub options: OptionCache,
}

impl SessionState {
    /// Look up a buffer by pointer.
    pub fn buffer(&self, ptr: &str) -> Option<&Buffer> {
        self.buffers.get(ptr)
    }

    /// Look up a buffer mutably by pointer.
    pub fn buffer_mut(&mut self, ptr: &str) -> Option<&mut Buffer> {
        self.buffers.get_mut(ptr)
    }

    /// Find a buffer by its full name.
    pub fn buffer_by_full_name(&self, full_name: &str) -> Option<&Buffer> {
        self.buffers.values().find(|b| b.full_name == full_name)
    }

    /// Buffers in display order.
    pub fn ordered_buffers(&self) -> impl Iterator<Item = &Buffer> {
        self.order.iter().filter_map(|ptr| self.buffers.get(ptr))
    }

    /// Reconcile the buffer set against a full buffer-list hdata.
    ///
    /// The listing is authoritative:
    /// - an unknown, non-hidden pointer creates a buffer;
    /// - a known pointer that reappears with existing scrollback is
    ///   reset (the remote buffer was recreated under the same pointer);
    /// - known pointers absent from the listing, and listed-but-hidden
    ///   pointers, are removed.
    ///
    /// Metadata on surviving buffers is refreshed in place, display
    /// order is rebuilt, and channel/query buffers are linked to their
    /// server buffer through the `server` local variable.
    pub fn reconcile_buffers(&mut self, hdata: &Hdata) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut order = Vec::with_capacity(hdata.entries.len());

        for entry in &hdata.entries {
            let Some(ptr) = entry.own_pointer() else {
                continue;
            };
            let ptr = ptr.to_string();
            seen.insert(ptr.clone());

            match self.buffers.get_mut(&ptr) {
                Some(existing) => {
                    if !existing.messages.is_empty() {
                        existing.reset();
                    }
                    existing.update_from_entry(entry);
                }
                None => {
                    let mut created = Buffer::new(ptr.clone());
                    created.update_from_entry(entry);
                    if created.hidden {
                        continue;
                    }
                    self.buffers.insert(ptr.clone(), created);
                    outcome.created.push(ptr.clone());
                }
            }

            // A surviving buffer that turned hidden drops out too.
            if self.buffers.get(&ptr).is_some_and(|b| b.hidden) {
                self.buffers.remove(&ptr);
                seen.remove(&ptr);
                outcome.created.retain(|p| p != &ptr);
                outcome.removed.push(ptr);
                continue;
            }
            order.push(ptr);
        }

        let stale: Vec<String> = self
            .buffers
            .keys()
            .filter(|ptr| !seen.contains(*ptr))
            .cloned()
            .collect();
        for ptr in stale {
            self.buffers.remove(&ptr);
            outcome.removed.push(ptr);
        }

        self.order = order;
        self.link_parents();
        if self
            .active
            .as_ref()
            .is_some_and(|ptr| !self.buffers.contains_key(ptr))
        {
            self.active = None;
        }
        outcome
    }

    /// Remove a single buffer by pointer, unlinking it from its parent.
    pub fn remove_buffer(&mut self, ptr: &str) -> bool {
        if self.buffers.remove(ptr).is_none() {
            return false;
        }
        self.order.retain(|p| p != ptr);
        for buffer in self.buffers.values_mut() {
            buffer.children.retain(|p| p != ptr);
        }
        if self.active.as_deref() == Some(ptr) {
            self.active = None;
        }
        true
    }

    /// Rebuild parent/child links from the `server` local variables.
    pub(crate) fn link_parents(&mut self) {
        let mut server_ptrs: HashMap<String, String> = HashMap::new();
        for buffer in self.buffers.values_mut() {
            buffer.children.clear();
            buffer.parent = None;
            if buffer.kind == buffer::BufferKind::Server {
                if let Some(server) = &buffer.server {
                    server_ptrs.insert(server.clone(), buffer.ptr.clone());
                }
            }
        }

        let links: Vec<(String, String)> = self
            .buffers
            .values()
            .filter(|b| b.kind != buffer::BufferKind::Server)
            .filter_map(|b| {
                let server = b.server.as_ref()?;
                let parent = server_ptrs.get(server)?;
                Some((b.ptr.clone(), parent.clone()))
            })
            .collect();
        for (child, parent) in links {
            if let Some(b) = self.buffers.get_mut(&child) {
                b.parent = Some(parent.clone());
            }
            if let Some(p) = self.buffers.get_mut(&parent) {
                p.children.push(child);
            }
        }
    }

    /// Re-derive unread/highlight counters from a full hotlist.
    ///
    /// All counters are reset first; rows then assign (not add) their
    /// own bucket's count, so the last row for a buffer wins the
    /// counter it targets.
    pub fn apply_hotlist(&mut self, entries: &[HotlistEntry]) {
        for buffer in self.buffers.values_mut() {
            buffer.clear_counters();
        }
        for entry in entries {
            let Some(buffer) = self.buffers.get_mut(&entry.buffer_ptr) else {
                continue;
            };
            match entry.assignment() {
                CounterAssign::None => {}
                CounterAssign::Unread(n) => buffer.unread = n,
                CounterAssign::Highlighted(n) => buffer.highlighted = n,
            }
        }
    }

    /// Replace the server capability set wholesale.
    pub fn replace_servers(&mut self, servers: Vec<IrcServer>) {
        self.servers = servers.into_iter().map(|s| (s.name.clone(), s)).collect();
    }

    /// The server record owning a buffer, if known.
    pub fn server_for_buffer(&self, ptr: &str) -> Option<&IrcServer> {
        let name = self.buffers.get(ptr)?.server.as_ref()?;
        self.servers.get(name)
    }

    /// Drop all buffers and servers; used when the relay upgrades.
    pub fn clear_all_buffers(&mut self) {
        self.buffers.clear();
        self.order.clear();
        self.servers.clear();
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weerelay_proto::{HdataEntry, Object, ObjectType};

    fn list_entry(ptr: &str, number: i32, hidden: i32, locals: &[(&str, &str)]) -> HdataEntry {
        let table = locals
            .iter()
            .map(|(k, v)| {
                (
                    Object::Str(Some(k.to_string())),
                    Object::Str(Some(v.to_string())),
                )
            })
            .collect();
        HdataEntry {
            pointers: vec![ptr.to_string()],
            fields: [
                ("number".to_string(), Object::Int(number)),
                (
                    "full_name".to_string(),
                    Object::Str(Some(format!("irc.{ptr}"))),
                ),
                ("hidden".to_string(), Object::Int(hidden)),
                ("local_variables".to_string(), Object::Hashtable(table)),
            ]
            .into_iter()
            .collect(),
        }
    }

    fn listing(entries: Vec<HdataEntry>) -> Hdata {
        Hdata {
            path: vec!["buffer".to_string()],
            keys: vec![("number".to_string(), ObjectType::Int)],
            entries,
        }
    }

    #[test]
    fn test_reconcile_creates_and_orders() {
        let mut state = SessionState::default();
        let outcome = state.reconcile_buffers(&listing(vec![
            list_entry("0xa", 1, 0, &[]),
            list_entry("0xb", 2, 0, &[]),
        ]));
        assert_eq!(outcome.created, vec!["0xa", "0xb"]);
        assert!(outcome.removed.is_empty());
        assert_eq!(state.order, vec!["0xa", "0xb"]);
        assert!(state.buffer("0xa").unwrap().needs_details);
    }

    #[test]
    fn test_reconcile_skips_hidden_and_removes_absent() {
        let mut state = SessionState::default();
        state.reconcile_buffers(&listing(vec![
            list_entry("0xa", 1, 0, &[]),
            list_entry("0xb", 2, 0, &[]),
        ]));

        let outcome = state.reconcile_buffers(&listing(vec![
            list_entry("0xa", 1, 0, &[]),
            list_entry("0xc", 2, 1, &[]),
            list_entry("0xd", 3, 0, &[]),
        ]));
        assert_eq!(outcome.created, vec!["0xd"]);
        assert_eq!(outcome.removed, vec!["0xb"]);
        assert!(state.buffer("0xc").is_none());
        assert_eq!(state.order, vec!["0xa", "0xd"]);
    }

    #[test]
    fn test_reconcile_resets_buffer_with_messages() {
        let mut state = SessionState::default();
        state.reconcile_buffers(&listing(vec![list_entry("0xa", 1, 0, &[])]));

        let buffer = state.buffer_mut("0xa").unwrap();
        buffer.messages.push(buffer::BufferMessage {
            line_ptr: "0x1".into(),
            buffer_ptr: "0xa".into(),
            date: chrono::DateTime::<chrono::Utc>::MIN_UTC,
            highlight: false,
            displayed: true,
            tags: vec![],
            prefix: String::new(),
            text: "old".into(),
            nick: None,
            kind: buffer::MessageKind::Privmsg,
            notified: false,
        });

        let outcome = state.reconcile_buffers(&listing(vec![list_entry("0xa", 1, 0, &[])]));
        assert!(!outcome.changed());
        assert!(state.buffer("0xa").unwrap().messages.is_empty());
    }

    #[test]
    fn test_reconcile_links_parents() {
        let mut state = SessionState::default();
        state.reconcile_buffers(&listing(vec![
            list_entry("0xs", 1, 0, &[("type", "server"), ("server", "libera")]),
            list_entry(
                "0xc",
                2,
                0,
                &[("type", "channel"), ("server", "libera")],
            ),
            list_entry("0xq", 3, 0, &[("type", "private"), ("server", "libera")]),
        ]));

        assert_eq!(state.buffer("0xc").unwrap().parent.as_deref(), Some("0xs"));
        assert_eq!(state.buffer("0xq").unwrap().parent.as_deref(), Some("0xs"));
        let mut children = state.buffer("0xs").unwrap().children.clone();
        children.sort();
        assert_eq!(children, vec!["0xc", "0xq"]);
    }

    #[test]
    fn test_remove_buffer_unlinks_and_clears_active() {
        let mut state = SessionState::default();
        state.reconcile_buffers(&listing(vec![
            list_entry("0xs", 1, 0, &[("type", "server"), ("server", "libera")]),
            list_entry("0xc", 2, 0, &[("type", "channel"), ("server", "libera")]),
        ]));
        state.active = Some("0xc".into());

        assert!(state.remove_buffer("0xc"));
        assert!(state.buffer("0xs").unwrap().children.is_empty());
        assert_eq!(state.active, None);
        assert!(!state.remove_buffer("0xc"));
    }

    #[test]
    fn test_apply_hotlist_resets_then_assigns() {
        let mut state = SessionState::default();
        state.reconcile_buffers(&listing(vec![
            list_entry("0xa", 1, 0, &[]),
            list_entry("0xb", 2, 0, &[]),
        ]));
        state.buffer_mut("0xa").unwrap().unread = 99;

        state.apply_hotlist(&[
            HotlistEntry {
                buffer_ptr: "0xb".into(),
                priority: 1,
                counts: vec![0, 7, 0, 0],
            },
            HotlistEntry {
                buffer_ptr: "0xb".into(),
                priority: 3,
                counts: vec![0, 0, 0, 2],
            },
            HotlistEntry {
                buffer_ptr: "0xdead".into(),
                priority: 1,
                counts: vec![0, 5, 0, 0],
            },
        ]);

        // Stale counter on 0xa was reset by the pass.
        assert_eq!(state.buffer("0xa").unwrap().unread, 0);
        let b = state.buffer("0xb").unwrap();
        assert_eq!(b.unread, 7);
        assert_eq!(b.highlighted, 2);
    }

    #[test]
    fn test_clear_all_buffers() {
        let mut state = SessionState::default();
        state.reconcile_buffers(&listing(vec![list_entry("0xa", 1, 0, &[])]));
        state.active = Some("0xa".into());
        state.clear_all_buffers();
        assert!(state.buffers.is_empty());
        assert!(state.order.is_empty());
        assert_eq!(state.active, None);
    }
}
