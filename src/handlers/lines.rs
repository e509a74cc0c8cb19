//! Line handlers: live pushes and backlog replies.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;
use weerelay_proto::RelayMessage;

use crate::events::RelayEvent;
use crate::session::buffer::BufferMessage;

use super::{Context, Handler, HandlerResult};

/// Handles `_buffer_line_added`: one line per entry, pushed live.
///
/// Counters only move for lines carrying a `notify_*` tag and only when
/// the receiving buffer is not the active one. A highlighted line fires
/// a highlight event once; the stored message remembers that it was
/// notified.
pub struct LineAddedHandler;

#[async_trait]
impl Handler for LineAddedHandler {
    async fn handle(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        let Some(hdata) = msg.hdata() else {
            return Ok(());
        };

        let mut added = Vec::new();
        {
            let mut session = ctx.session.write();
            let active = session.active.clone();
            for entry in &hdata.entries {
                let Some(mut message) = BufferMessage::from_entry(entry) else {
                    continue;
                };
                let ptr = message.buffer_ptr.clone();
                let Some(buffer) = session.buffer_mut(&ptr) else {
                    debug!(buffer = %ptr, "line for unknown buffer");
                    continue;
                };

                let is_active = active.as_deref() == Some(ptr.as_str());
                let notify_highlight = message.highlight && !is_active;
                if notify_highlight {
                    message.notified = true;
                }

                let counts = message.counts_toward_unread();
                let highlight = message.highlight;
                if !buffer.push_message(message.clone()) {
                    continue;
                }
                if !is_active {
                    if highlight {
                        buffer.highlighted += 1;
                    } else if counts {
                        buffer.unread += 1;
                    }
                }
                added.push((ptr, message, notify_highlight));
            }
        }

        for (buffer, message, notify) in added {
            if notify {
                ctx.events.emit(RelayEvent::Highlight {
                    buffer: buffer.clone(),
                    message: message.clone(),
                });
            }
            ctx.events.emit(RelayEvent::MessageAdded { buffer, message });
        }
        Ok(())
    }
}

/// Handles the `listlines` backlog reply.
///
/// Backlog lines arrive newest first (the request walks back from the
/// last line), are inserted in chronological order ahead of anything
/// already present, never move counters, and never fire highlight
/// events. Duplicates against already-mirrored lines are dropped.
pub struct BacklogHandler;

#[async_trait]
impl Handler for BacklogHandler {
    async fn handle(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        let Some(hdata) = msg.hdata() else {
            return Ok(());
        };

        // Group per buffer, preserving wire order within each group.
        let mut grouped: HashMap<String, Vec<BufferMessage>> = HashMap::new();
        for entry in &hdata.entries {
            let Some(mut message) = BufferMessage::from_entry(entry) else {
                continue;
            };
            message.notified = true;
            grouped
                .entry(message.buffer_ptr.clone())
                .or_default()
                .push(message);
        }

        let mut batches = Vec::new();
        {
            let mut session = ctx.session.write();
            for (ptr, mut messages) in grouped {
                let Some(buffer) = session.buffer_mut(&ptr) else {
                    debug!(buffer = %ptr, "backlog for unknown buffer");
                    continue;
                };
                messages.reverse();
                messages.retain(|m| {
                    !buffer
                        .messages
                        .iter()
                        .any(|e| e.line_ptr == m.line_ptr && e.buffer_ptr == m.buffer_ptr)
                });
                if messages.is_empty() {
                    continue;
                }
                let count = messages.len();
                messages.extend(buffer.messages.drain(..));
                buffer.messages = messages;
                batches.push((ptr, count));
            }
        }

        for (buffer, count) in batches {
            ctx.events.emit(RelayEvent::MessageBatch { buffer, count });
        }
        Ok(())
    }
}
