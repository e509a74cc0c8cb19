//! Session-wide state replies: hotlist, options, server capabilities.

use async_trait::async_trait;
use tracing::debug;
use weerelay_proto::RelayMessage;

use crate::events::RelayEvent;
use crate::session::hotlist::HotlistEntry;
use crate::session::server::IrcServer;

use super::{Context, Handler, HandlerResult};

/// Handles the `hotlist` reply: re-derives every buffer's counters.
pub struct HotlistHandler;

#[async_trait]
impl Handler for HotlistHandler {
    async fn handle(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        let Some(hdata) = msg.hdata() else {
            return Ok(());
        };
        let entries: Vec<HotlistEntry> = hdata
            .entries
            .iter()
            .filter_map(HotlistEntry::from_entry)
            .collect();
        debug!(rows = entries.len(), "applying hotlist");

        ctx.session.write().apply_hotlist(&entries);
        ctx.events.emit(RelayEvent::HotlistChanged);
        Ok(())
    }
}

/// Handles the `getoptions` reply: replaces the option cache.
pub struct OptionsHandler;

#[async_trait]
impl Handler for OptionsHandler {
    async fn handle(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        let Some(infolist) = msg.first().and_then(|obj| obj.as_infolist()) else {
            return Ok(());
        };
        let stored = ctx.session.write().options.replace_from_infolist(infolist);
        debug!(options = stored, "option cache refreshed");
        ctx.events.emit(RelayEvent::OptionsParsed);
        Ok(())
    }
}

/// Handles the `servers` reply: replaces the IRC capability set.
pub struct ServersHandler;

#[async_trait]
impl Handler for ServersHandler {
    async fn handle(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        let Some(hdata) = msg.hdata() else {
            return Ok(());
        };
        let servers: Vec<IrcServer> = hdata
            .entries
            .iter()
            .filter_map(IrcServer::from_entry)
            .collect();
        debug!(servers = servers.len(), "server capabilities refreshed");
        ctx.session.write().replace_servers(servers);
        Ok(())
    }
}
