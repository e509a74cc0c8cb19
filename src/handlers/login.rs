//! Login flow and session-level pushes.
//!
//! The modern flow runs `handshake` first; its reply picks the hash
//! algorithm for `init`. The relay never acknowledges `init` directly,
//! so a correlated `info version` probe doubles as the login check: any
//! reply means authentication succeeded, because a failed `init` closes
//! the connection.

use async_trait::async_trait;
use tracing::{debug, info, warn};
use weerelay_proto::handshake::{negotiate, HandshakeReply};
use weerelay_proto::{Command, CommandBatch, Compression, RelayMessage};

use crate::events::RelayEvent;

use super::{requests, Context, Handler, HandlerResult};

/// Handles the `handshake` reply: derives the `init` payload and sends
/// it, followed by the version probe.
pub struct HandshakeHandler;

#[async_trait]
impl Handler for HandshakeHandler {
    async fn handle(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        let reply = match msg.first() {
            Some(obj) => HandshakeReply::from_object(obj),
            None => HandshakeReply::default(),
        };
        debug!(algo = %reply.algo_name, totp = reply.totp, "handshake reply");

        let auth = negotiate(&reply, &ctx.config.password)?;

        // init and the probe go out in one write so nothing can slip
        // between them.
        let mut batch = CommandBatch::default();
        batch.begin().expect("fresh batch");
        batch
            .push(
                &Command::Init {
                    auth,
                    compression: Compression::Default,
                },
                None,
            )
            .expect("open batch");
        let (probe, id) = requests::version_probe();
        batch.push(&probe, Some(id)).expect("open batch");
        ctx.outbox
            .send_raw(batch.end().expect("open batch"))
            .await
    }
}

/// Handles the `version` reply: records the relay version, flips the
/// session to logged-in, and requests the initial state in one batch.
pub struct VersionHandler;

#[async_trait]
impl Handler for VersionHandler {
    async fn handle(&self, ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        let version = msg
            .first()
            .and_then(|obj| obj.as_info())
            .and_then(|(_, value)| value)
            .map(str::to_string);

        let first_login = {
            let mut session = ctx.session.write();
            session.relay_version = version.clone();
            let first = !session.logged_in;
            session.logged_in = true;
            first
        };
        if !first_login {
            return Ok(());
        }
        info!(version = version.as_deref().unwrap_or("unknown"), "logged in");
        ctx.events.emit(RelayEvent::LoggedIn);

        ctx.outbox.send_raw(initial_sync_batch()).await
    }
}

/// The post-login burst: buffer listing, hotlist, options, and the sync
/// subscription, batched into a single write.
fn initial_sync_batch() -> String {
    let mut batch = CommandBatch::default();
    batch.begin().expect("fresh batch");
    for (command, id) in [
        requests::list_buffers(),
        requests::hotlist(),
        requests::get_options(),
    ] {
        batch.push(&command, Some(id)).expect("open batch");
    }
    batch.push(&requests::sync_all(), None).expect("open batch");
    batch.end().expect("open batch")
}

/// Handles `_pong`. Liveness is implied by the frame itself; the payload
/// is only logged.
pub struct PongHandler;

#[async_trait]
impl Handler for PongHandler {
    async fn handle(&self, _ctx: &Context, msg: &RelayMessage) -> HandlerResult {
        let payload = msg.first().and_then(|obj| obj.as_str()).unwrap_or("");
        debug!(payload = %payload, "pong");
        Ok(())
    }
}

/// Handles `_upgrade`: the relay is restarting in place. All pointers
/// become invalid, so the mirror is dropped and updates unsubscribed
/// until `_upgrade_ended`.
pub struct UpgradeHandler;

#[async_trait]
impl Handler for UpgradeHandler {
    async fn handle(&self, ctx: &Context, _msg: &RelayMessage) -> HandlerResult {
        warn!("relay upgrade started, dropping mirrored state");
        ctx.session.write().clear_all_buffers();
        ctx.outbox.send(&requests::desync_all(), None).await?;
        ctx.events.emit(RelayEvent::UpgradeStarted);
        Ok(())
    }
}

/// Handles `_upgrade_ended`: resubscribes and rebuilds the mirror.
pub struct UpgradeEndedHandler;

#[async_trait]
impl Handler for UpgradeEndedHandler {
    async fn handle(&self, ctx: &Context, _msg: &RelayMessage) -> HandlerResult {
        info!("relay upgrade finished, resynchronizing");
        ctx.outbox.send_raw(initial_sync_batch()).await?;
        ctx.events.emit(RelayEvent::UpgradeEnded);
        Ok(())
    }
}
