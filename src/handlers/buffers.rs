//! Buffer lifecycle handlers: listing replies and buffer pushes.

use async_trait::async_trait;
use tracing::debug;
use weerelay_proto::RelayMessage;

use crate::events::RelayEvent;

use super::{requests, Context, Handler, HandlerResult};

/// Handles the `listbuffers` reply: reconciles the mirrored buffer set
/// against the authoritative listing and requests backlog and nicklists
/// for every buffer the pass created.
pub struct BufferListHandler;

#[async_trait]
impl Handler for BufferListHandler {
    async fn handle(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        let Some(hdata) = msg.hdata() else {
            debug!("buffer listing without hdata payload");
            return Ok(());
        };

        // Reconcile under the lock, send follow-ups after releasing it.
        let outcome = {
            let mut session = ctx.session.write();
            let outcome = session.reconcile_buffers(hdata);
            for ptr in &outcome.created {
                if let Some(buffer) = session.buffer_mut(ptr) {
                    buffer.needs_details = false;
                }
            }
            outcome
        };

        debug!(
            created = outcome.created.len(),
            removed = outcome.removed.len(),
            "reconciled buffer listing"
        );

        for ptr in &outcome.created {
            let (command, id) = requests::list_lines(ptr, ctx.config.backlog_size);
            ctx.outbox.send(&command, Some(id)).await?;
            let (command, id) = requests::nicklist(ptr);
            ctx.outbox.send(&command, Some(id)).await?;
        }

        // Server capabilities follow the buffer set.
        let (command, id) = requests::servers();
        ctx.outbox.send(&command, Some(id)).await?;

        ctx.events.emit(RelayEvent::BufferListChanged);
        Ok(())
    }
}

/// Handles `_buffer_opened` by re-requesting the full listing.
///
/// The push carries the new buffer's fields, but a full listing keeps
/// numbering and ordering authoritative in one code path.
pub struct BufferOpenedHandler;

#[async_trait]
impl Handler for BufferOpenedHandler {
    async fn handle(&self, ctx: &Context, _msg: &RelayMessage) -> HandlerResult {
        let (command, id) = requests::list_buffers();
        ctx.outbox.send(&command, Some(id)).await
    }
}

/// Handles `_buffer_closing`: drops the buffer from the mirror.
pub struct BufferClosingHandler;

#[async_trait]
impl Handler for BufferClosingHandler {
    async fn handle(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        let Some(hdata) = msg.hdata() else {
            return Ok(());
        };

        let mut removed_any = false;
        {
            let mut session = ctx.session.write();
            for entry in &hdata.entries {
                if let Some(ptr) = entry.own_pointer() {
                    removed_any |= session.remove_buffer(ptr);
                }
            }
        }
        if removed_any {
            ctx.events.emit(RelayEvent::BufferListChanged);
        }
        Ok(())
    }
}

/// Handles `_buffer_cleared`: drops scrollback, keeps the buffer.
pub struct BufferClearedHandler;

#[async_trait]
impl Handler for BufferClearedHandler {
    async fn handle(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        let Some(hdata) = msg.hdata() else {
            return Ok(());
        };

        let mut cleared = Vec::new();
        {
            let mut session = ctx.session.write();
            for entry in &hdata.entries {
                let Some(ptr) = entry.own_pointer() else {
                    continue;
                };
                if let Some(buffer) = session.buffer_mut(ptr) {
                    buffer.reset();
                    cleared.push(ptr.to_string());
                }
            }
        }
        for buffer in cleared {
            ctx.events.emit(RelayEvent::BufferChanged { buffer });
        }
        Ok(())
    }
}

/// Handles the metadata pushes (`_buffer_renamed`, `_buffer_title_changed`,
/// `_buffer_moved`, hidden flips, local variable changes).
///
/// A buffer that flips to hidden leaves the mirror, matching the
/// listing reconciliation rules. Renames and moves affect ordering and
/// so escalate to a list-changed event.
pub struct BufferMetaHandler;

#[async_trait]
impl Handler for BufferMetaHandler {
    async fn handle(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        let Some(hdata) = msg.hdata() else {
            return Ok(());
        };
        let list_level = matches!(msg.id.as_str(), "_buffer_renamed" | "_buffer_moved");
        let localvar_change = msg.id.starts_with("_buffer_localvar");

        let mut changed = Vec::new();
        let mut list_changed = false;
        {
            let mut session = ctx.session.write();
            for entry in &hdata.entries {
                let Some(ptr) = entry.own_pointer().map(str::to_string) else {
                    continue;
                };
                let hidden = match session.buffer_mut(&ptr) {
                    Some(buffer) => {
                        buffer.update_from_entry(entry);
                        buffer.hidden
                    }
                    None => {
                        debug!(id = %msg.id, ptr = %ptr, "metadata push for unknown buffer");
                        continue;
                    }
                };
                if hidden {
                    session.remove_buffer(&ptr);
                    list_changed = true;
                } else {
                    changed.push(ptr);
                }
            }
            if localvar_change {
                session.link_parents();
            }
        }

        if list_changed || (list_level && !changed.is_empty()) {
            ctx.events.emit(RelayEvent::BufferListChanged);
        }
        for buffer in changed {
            ctx.events.emit(RelayEvent::BufferChanged { buffer });
        }
        Ok(())
    }
}
