//! Nicklist handlers: full snapshots and diffs.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;
use weerelay_proto::RelayMessage;

use crate::events::RelayEvent;
use crate::session::nicklist::{
    apply_add, apply_remove, apply_update, sort_entries, NicklistEntry, DIFF_ADD, DIFF_REMOVE,
    DIFF_UPDATE,
};

use super::{Context, Handler, HandlerResult};

/// Handles `nicklist` replies and `_nicklist` pushes: a full snapshot
/// that replaces each mentioned buffer's list wholesale.
///
/// Group rows are skipped; only nicks are mirrored.
pub struct NicklistHandler;

#[async_trait]
impl Handler for NicklistHandler {
    async fn handle(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        let Some(hdata) = msg.hdata() else {
            return Ok(());
        };

        let mut touched = Vec::new();
        {
            let mut session = ctx.session.write();
            let mut cleared: HashSet<String> = HashSet::new();
            for entry in &hdata.entries {
                let Some(ptr) = entry.root_pointer().map(str::to_string) else {
                    continue;
                };
                let Some(buffer) = session.buffer_mut(&ptr) else {
                    debug!(buffer = %ptr, "nicklist for unknown buffer");
                    continue;
                };
                if cleared.insert(ptr.clone()) {
                    buffer.nicklist.clear();
                    touched.push(ptr);
                }
                let Some(nick) = NicklistEntry::from_entry(entry) else {
                    continue;
                };
                if !nick.group {
                    buffer.nicklist.push(nick);
                }
            }
            for ptr in &touched {
                if let Some(buffer) = session.buffer_mut(ptr) {
                    sort_entries(&mut buffer.nicklist);
                }
            }
        }

        for buffer in touched {
            ctx.events.emit(RelayEvent::NicklistChanged { buffer });
        }
        Ok(())
    }
}

/// Handles `_nicklist_diff`: incremental add/remove/update rows.
///
/// Every action is idempotent against the mirrored list; a diff racing a
/// buffer removal or a lost snapshot degrades to no-ops instead of
/// failing the session.
pub struct NicklistDiffHandler;

#[async_trait]
impl Handler for NicklistDiffHandler {
    async fn handle(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        let Some(hdata) = msg.hdata() else {
            return Ok(());
        };

        let mut changed: Vec<String> = Vec::new();
        {
            let mut session = ctx.session.write();
            for entry in &hdata.entries {
                let Some(ptr) = entry.root_pointer().map(str::to_string) else {
                    continue;
                };
                let Some(diff) = entry.char_field("_diff") else {
                    continue;
                };
                let Some(nick) = NicklistEntry::from_entry(entry) else {
                    continue;
                };
                if nick.group {
                    continue;
                }
                let Some(buffer) = session.buffer_mut(&ptr) else {
                    debug!(buffer = %ptr, "nicklist diff for unknown buffer");
                    continue;
                };

                let applied = match diff {
                    DIFF_ADD => apply_add(&mut buffer.nicklist, nick),
                    DIFF_REMOVE => apply_remove(&mut buffer.nicklist, &nick.name),
                    DIFF_UPDATE => apply_update(&mut buffer.nicklist, &nick),
                    other => {
                        debug!(diff = %(other as char), "unknown nicklist diff action");
                        false
                    }
                };
                if applied && !changed.contains(&ptr) {
                    changed.push(ptr);
                }
            }
            for ptr in &changed {
                if let Some(buffer) = session.buffer_mut(ptr) {
                    sort_entries(&mut buffer.nicklist);
                }
            }
        }

        for buffer in changed {
            ctx.events.emit(RelayEvent::NicklistChanged { buffer });
        }
        Ok(())
    }
}
