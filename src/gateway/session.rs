use super::App;
use super::Binding;
use crate::PlayerId;
use crate::RoomId;
use crate::limiter::ActionKind;
use crate::limiter::Verdict;
use crate::protocol::Cancelled;
use crate::protocol::ChatSend;
use crate::protocol::ClientEvent;
use crate::protocol::ErrorCode;
use crate::protocol::Notice;
use crate::protocol::Outbox;
use crate::protocol::Queued;
use crate::protocol::ServerEvent;
use crate::reconnect::Resolution;
use crate::room::Cmd;
use crate::telemetry::SecurityKind;
use crate::telemetry::Telemetry;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// One connected socket: identity, outbox, and the dispatch rules that
/// stand between the wire and the domain.
struct Session {
    app: Arc<App>,
    player: PlayerId,
    outbox: Outbox,
}

/// Bridges a websocket to the session layer: outbox events flow out as
/// text frames, inbound frames are validated and dispatched, and an idle
/// peer is pinged and eventually dropped.
pub async fn run(app: Arc<App>, mut ws: actix_ws::Session, mut stream: actix_ws::MessageStream) {
    let player = app.sessions.mint();
    let (tx, mut rx) = unbounded_channel();
    app.sessions.insert(player, tx.clone()).await;
    log::info!("session {} connected", player);
    let mut session = Session {
        app: app.clone(),
        player,
        outbox: tx,
    };
    let ping_every = std::time::Duration::from_millis(app.settings.ready_ping_ms.max(1_000));
    let mut ping = tokio::time::interval(ping_every);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_seen = crate::now();
    'sesh: loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Some(event) => {
                    match serde_json::to_string(&event) {
                        Ok(json) => if ws.text(json).await.is_err() { break 'sesh },
                        Err(e) => log::error!("session {}: unserializable event: {}", session.player, e),
                    }
                    if session.audit(&event).await {
                        let ban = ServerEvent::Error(Notice::of(ErrorCode::SoftBan));
                        if let Ok(json) = serde_json::to_string(&ban) {
                            let _ = ws.text(json).await;
                        }
                        break 'sesh;
                    }
                }
                None => break 'sesh,
            },
            msg = stream.next() => match msg {
                Some(Ok(actix_ws::Message::Text(text))) => {
                    last_seen = crate::now();
                    if session.dispatch(text.to_string()).await == Flow::Close {
                        break 'sesh;
                    }
                }
                Some(Ok(actix_ws::Message::Ping(bytes))) => {
                    last_seen = crate::now();
                    if ws.pong(&bytes).await.is_err() { break 'sesh }
                }
                Some(Ok(actix_ws::Message::Pong(_))) => last_seen = crate::now(),
                Some(Ok(actix_ws::Message::Close(_))) => break 'sesh,
                Some(Err(_)) => break 'sesh,
                None => break 'sesh,
                _ => continue 'sesh,
            },
            _ = ping.tick() => {
                if crate::now().saturating_sub(last_seen) > 2 * app.settings.ready_ping_ms {
                    log::info!("session {}: keepalive lapsed", session.player);
                    break 'sesh;
                }
                if ws.ping(b"").await.is_err() { break 'sesh }
            }
        }
    }
    session.teardown().await;
    let _ = ws.close(None).await;
}

impl Session {
    async fn dispatch(&mut self, raw: String) -> Flow {
        let event = match serde_json::from_str::<ClientEvent>(&raw) {
            Ok(event) => event,
            Err(e) => {
                log::debug!("session {}: malformed frame: {}", self.player, e);
                self.send(ServerEvent::Error(Notice::of(ErrorCode::InvalidPayload)));
                return Flow::Continue;
            }
        };
        match event {
            ClientEvent::SearchJoin(join) => {
                self.on_search_join(join.nickname, join.reconnect_token).await
            }
            ClientEvent::SearchCancel(_) => self.on_search_cancel().await,
            ClientEvent::PlaceShips(req) => {
                let board = req.board;
                self.room_cmd(req.room_id, ActionKind::PlaceShips, move |player| {
                    Cmd::PlaceShips { player, board }
                })
                .await
            }
            ClientEvent::Shot(req) => {
                self.room_cmd(req.room_id, ActionKind::Shot, move |player| Cmd::Shoot {
                    player,
                    coord: req.coord,
                })
                .await
            }
            ClientEvent::Cancel(req) => {
                self.room_cmd(req.room_id, ActionKind::Cancel, move |player| Cmd::Cancel {
                    player,
                })
                .await
            }
            ClientEvent::ChatSend(send) => self.on_chat(send).await,
        }
    }

    /// Every client-fault error relayed to the peer burns the
    /// invalid-request budget, wherever it originated; exhausting the
    /// budget is a soft ban: the connection closes and security events
    /// land.
    async fn audit(&self, event: &ServerEvent) -> bool {
        let ServerEvent::Error(notice) = event else {
            return false;
        };
        if !notice.code.is_client_fault() {
            return false;
        }
        match self
            .app
            .limiter
            .check(self.player, ActionKind::InvalidRequests)
            .await
        {
            Verdict::Banned => {
                crate::telemetry::record(
                    &self.app.sink,
                    Telemetry::Security {
                        player: self.player,
                        kind: SecurityKind::InvalidFlood,
                        detail: String::from("invalid request budget exhausted"),
                    },
                );
                crate::telemetry::record(
                    &self.app.sink,
                    Telemetry::Security {
                        player: self.player,
                        kind: SecurityKind::SoftBan,
                        detail: String::from("connection closed"),
                    },
                );
                true
            }
            _ => false,
        }
    }

    /// Applies the per-kind budget; a trip is recorded as a security
    /// event and reported by the caller in its own vocabulary.
    async fn throttled(&self, kind: ActionKind) -> bool {
        match self.app.limiter.check(self.player, kind).await {
            Verdict::Allowed => false,
            _ => {
                crate::telemetry::record(
                    &self.app.sink,
                    Telemetry::Security {
                        player: self.player,
                        kind: SecurityKind::RateLimit,
                        detail: String::from(kind.as_str()),
                    },
                );
                true
            }
        }
    }

    async fn on_search_join(
        &mut self,
        nickname: Option<String>,
        token: Option<String>,
    ) -> Flow {
        if token.is_some() && self.throttled(ActionKind::ReconnectAttempt).await {
            self.send(ServerEvent::Error(Notice::of(ErrorCode::RateLimited)));
            return Flow::Continue;
        }
        if self.throttled(ActionKind::SearchJoin).await {
            self.send(ServerEvent::Error(Notice::of(ErrorCode::RateLimited)));
            return Flow::Continue;
        }
        match self.app.sessions.binding(self.player).await {
            Some(Binding::Queued) => {
                self.send(ServerEvent::Error(Notice::of(ErrorCode::General)));
                return Flow::Continue;
            }
            Some(Binding::Room { tx, .. }) if !tx.is_closed() => {
                self.send(ServerEvent::Error(Notice::of(ErrorCode::General)));
                return Flow::Continue;
            }
            _ => {}
        }
        match self.app.reconnect.resolve(self.player, nickname, token).await {
            Err(e) => {
                log::warn!("session {}: join failed: {}", self.player, e);
                self.send(ServerEvent::Error(Notice::of(ErrorCode::General)));
            }
            Ok(Resolution::InUse) => {
                self.send(ServerEvent::Error(Notice::of(
                    ErrorCode::ReconnectTokenInUse,
                )));
            }
            Ok(Resolution::Resumed {
                player,
                handle,
                token,
            }) => {
                self.adopt(player).await;
                self.app
                    .sessions
                    .set_binding(
                        player,
                        Binding::Room {
                            id: handle.id,
                            tx: handle.tx.clone(),
                        },
                    )
                    .await;
                let _ = handle.tx.send(Cmd::Resume {
                    player,
                    token,
                    outbox: self.outbox.clone(),
                });
            }
            Ok(Resolution::Recovered { entry }) => {
                self.adopt(entry.player).await;
                self.enqueue(entry, Some(true)).await;
            }
            Ok(Resolution::Waiting { entry }) => {
                self.adopt(entry.player).await;
                self.enqueue(entry, None).await;
            }
            Ok(Resolution::Fresh {
                entry,
                expired_token,
            }) => {
                if expired_token {
                    self.send(ServerEvent::Error(Notice::of(
                        ErrorCode::ReconnectTokenExpired,
                    )));
                }
                self.enqueue(entry, None).await;
            }
        }
        Flow::Continue
    }

    async fn enqueue(&self, entry: crate::queue::QueueEntry, recovered: Option<bool>) {
        self.app
            .sessions
            .set_binding(entry.player, Binding::Queued)
            .await;
        self.send(ServerEvent::Queued(Queued {
            player_id: entry.player,
            joined_at: entry.joined_at,
            timeout_ms: self.app.settings.queue_wait_ms,
            reconnect_token: entry.token,
            recovered,
            message: Some(String::from("searching for an opponent")),
        }));
    }

    async fn on_search_cancel(&self) -> Flow {
        match self.app.sessions.binding(self.player).await {
            Some(Binding::Queued) => {
                if let Err(e) = self.app.queue.remove_by_player(self.player).await {
                    log::warn!("session {}: queue removal failed: {}", self.player, e);
                }
                self.app
                    .sessions
                    .set_binding(self.player, Binding::Unbound)
                    .await;
                self.send(ServerEvent::Cancelled(Cancelled {
                    room_id: None,
                    reason: "search_cancel",
                    message: String::from("left the queue"),
                }));
            }
            _ => self.send(ServerEvent::Error(Notice::of(ErrorCode::General))),
        }
        Flow::Continue
    }

    /// Room-scoped frames must carry the roomId of the current binding;
    /// anything else is answered with `room_mismatch` and ignored.
    async fn room_cmd<F>(&self, room_id: RoomId, kind: ActionKind, make: F) -> Flow
    where
        F: FnOnce(PlayerId) -> Cmd,
    {
        if self.throttled(kind).await {
            self.send(ServerEvent::Error(Notice::of(ErrorCode::RateLimited)));
            return Flow::Continue;
        }
        match self.app.sessions.binding(self.player).await {
            Some(Binding::Room { id, tx }) if id == room_id => {
                if tx.send(make(self.player)).is_err() {
                    self.app
                        .sessions
                        .set_binding(self.player, Binding::Unbound)
                        .await;
                    self.send(ServerEvent::Error(Notice::of(ErrorCode::General)));
                }
            }
            _ => self.send(ServerEvent::Error(Notice::of(ErrorCode::RoomMismatch))),
        }
        Flow::Continue
    }

    /// Chat rides its own error event for throttling so that a chatty
    /// player never sees a `game:error` out of it.
    async fn on_chat(&self, send: ChatSend) -> Flow {
        if self.throttled(ActionKind::ChatSend).await {
            self.send(ServerEvent::ChatError(Notice::in_room(
                ErrorCode::ChatRateLimited,
                send.room_id,
            )));
            return Flow::Continue;
        }
        match self.app.sessions.binding(self.player).await {
            Some(Binding::Room { id, tx }) if id == send.room_id => {
                let _ = tx.send(Cmd::Chat {
                    player: self.player,
                    send,
                });
            }
            _ => self.send(ServerEvent::Error(Notice::of(ErrorCode::ChatRoomMismatch))),
        }
        Flow::Continue
    }

    /// Takes over a recovered identity: the registry entry moves from
    /// the freshly minted connection id onto the resumed player id.
    async fn adopt(&mut self, player: PlayerId) {
        if player != self.player {
            self.app.sessions.rebind(self.player, player).await;
            log::info!("session {} adopts identity {}", self.player, player);
            self.player = player;
        }
    }

    fn send(&self, event: ServerEvent) {
        let _ = self.outbox.send(event);
    }

    /// Connection gone: park a queued player for the grace window, or
    /// hand a roomed player to the room's disconnect handling.
    async fn teardown(&self) {
        match self.app.sessions.binding(self.player).await {
            Some(Binding::Queued) => {
                if let Err(e) = self
                    .app
                    .queue
                    .park(self.player, self.app.settings.grace_ms)
                    .await
                {
                    log::warn!("session {}: parking failed: {}", self.player, e);
                }
            }
            Some(Binding::Room { tx, .. }) => {
                let _ = tx.send(Cmd::Disconnect {
                    player: self.player,
                });
            }
            _ => {}
        }
        self.app.sessions.remove(self.player).await;
        self.app.limiter.forget(self.player).await;
        log::info!("session {} disconnected", self.player);
    }
}
