use super::BOT_ID;
use super::EndReason;
use super::Phase;
use super::Room;
use super::engine;
use super::engine::DisconnectOutcome;
use super::engine::PlaceOutcome;
use super::registry::RoomRegistry;
use crate::BOT_THINK_MAX_MS;
use crate::BOT_THINK_MIN_MS;
use crate::Millis;
use crate::PlayerId;
use crate::Token;
use crate::board::Coord;
use crate::bot::Seeker;
use crate::chat;
use crate::chat::ChatMessage;
use crate::protocol::BoardState;
use crate::protocol::Cancelled;
use crate::protocol::ChatHistory;
use crate::protocol::ChatRelay;
use crate::protocol::ChatSend;
use crate::protocol::ErrorCode;
use crate::protocol::Notice;
use crate::protocol::Outbox;
use crate::protocol::ServerEvent;
use crate::telemetry::Telemetry;
use futures::FutureExt;
use rand::Rng;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Everything a room can be asked to do. The mailbox serializes these,
/// making the actor the room's single writer.
#[derive(Debug)]
pub enum Cmd {
    PlaceShips {
        player: PlayerId,
        board: BoardState,
    },
    Shoot {
        player: PlayerId,
        coord: Coord,
    },
    Cancel {
        player: PlayerId,
    },
    Chat {
        player: PlayerId,
        send: ChatSend,
    },
    Disconnect {
        player: PlayerId,
    },
    Resume {
        player: PlayerId,
        token: Token,
        outbox: Outbox,
    },
}

/// Owner task of one room. Runs a select loop over the mailbox and the
/// earliest pending deadline (grace, inactivity, bot think, destruction).
/// A panic while applying a command closes the room with `general`
/// instead of taking the process down.
pub struct RoomActor {
    room: Room,
    seeker: Option<Seeker>,
    mailbox: UnboundedReceiver<Cmd>,
    registry: Arc<RoomRegistry>,
    bot_due: Option<Millis>,
    destroy_at: Option<Millis>,
    done: bool,
}

impl RoomActor {
    pub fn launch(room: Room, mailbox: UnboundedReceiver<Cmd>, registry: Arc<RoomRegistry>) {
        let seeker = room.vs_bot.then(Seeker::new);
        let actor = Self {
            room,
            seeker,
            mailbox,
            registry,
            bot_due: None,
            destroy_at: None,
            done: false,
        };
        tokio::spawn(actor.run());
    }

    async fn run(mut self) {
        self.persist();
        loop {
            let wake = self.next_wake();
            tokio::select! {
                cmd = self.mailbox.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                _ = alarm(wake) => self.tick().await,
            }
            if self.done {
                break;
            }
        }
        self.teardown().await;
    }

    async fn handle(&mut self, cmd: Cmd) {
        let applied = AssertUnwindSafe(self.dispatch(cmd)).catch_unwind().await;
        if applied.is_err() {
            log::error!("room {} writer panicked, closing room", self.room.id);
            engine::finish(&mut self.room, EndReason::General, None);
            self.broadcast_over();
            self.done = true;
        }
    }

    async fn dispatch(&mut self, cmd: Cmd) {
        match cmd {
            Cmd::PlaceShips { player, board } => self.on_place(player, board).await,
            Cmd::Shoot { player, coord } => self.on_shoot(player, coord).await,
            Cmd::Cancel { player } => self.on_cancel(player).await,
            Cmd::Chat { player, send } => self.on_chat(player, send),
            Cmd::Disconnect { player } => self.on_disconnect(player).await,
            Cmd::Resume {
                player,
                token,
                outbox,
            } => self.on_resume(player, token, outbox),
        }
        self.persist();
    }

    async fn tick(&mut self) {
        let now = crate::now();
        if engine::expire_grace(&mut self.room, now) {
            self.finish_room().await;
        } else if engine::expire_inactivity(&mut self.room, now, self.registry.settings.inactivity_ms)
        {
            self.finish_room().await;
        } else if self.bot_due.is_some_and(|at| at <= now) {
            self.bot_due = None;
            self.bot_shot().await;
        }
        if self.destroy_at.is_some_and(|at| at <= now) {
            self.done = true;
        }
        self.persist();
    }

    async fn on_place(&mut self, player: PlayerId, board: BoardState) {
        match engine::place_ships(&mut self.room, player, board) {
            Err(rejection) => self.reject(player, rejection),
            Ok(PlaceOutcome::Waiting) => self.broadcast_state(),
            Ok(PlaceOutcome::Started) => {
                self.broadcast_state();
                self.broadcast_turn();
                self.arm_bot();
            }
        }
    }

    async fn on_shoot(&mut self, player: PlayerId, coord: Coord) {
        match engine::shoot(&mut self.room, player, coord) {
            Err(rejection) => self.reject(player, rejection),
            Ok(record) => {
                let event = engine::shot_event(&self.room, player, coord, record.outcome);
                self.broadcast(ServerEvent::ShotResult(event));
                if record.over {
                    self.finish_room().await;
                } else {
                    self.broadcast_turn();
                    self.arm_bot();
                }
            }
        }
    }

    async fn on_cancel(&mut self, player: PlayerId) {
        match engine::cancel(&mut self.room, player) {
            Err(rejection) => self.reject(player, rejection),
            Ok(()) => {
                self.finish_room().await;
                self.broadcast(ServerEvent::Cancelled(Cancelled {
                    room_id: Some(self.room.id),
                    reason: "manual_cancel",
                    message: String::from("the game was cancelled"),
                }));
            }
        }
    }

    fn on_chat(&mut self, player: PlayerId, send: ChatSend) {
        if self.room.vs_bot {
            return self.reject(player, ErrorCode::ChatNotAllowed.into());
        }
        if self.room.phase == Phase::Over
            && self.room.chat_until.is_none_or(|at| at <= crate::now())
        {
            return self.reject(player, ErrorCode::ChatNotAllowed.into());
        }
        let Some(index) = self.room.index_of(player) else {
            return self.reject(player, ErrorCode::General.into());
        };
        match chat::validate(&send) {
            Err(code) => self.reject(player, code.into()),
            Ok((kind, body)) => {
                let message = ChatMessage {
                    kind,
                    sender: Some(player),
                    nickname: self.room.slots[index].nickname.clone(),
                    created_at: crate::now(),
                    body,
                };
                chat::append(&mut self.room.chat, message.clone());
                self.broadcast(ServerEvent::ChatMessage(ChatRelay {
                    room_id: self.room.id,
                    message,
                }));
            }
        }
    }

    async fn on_disconnect(&mut self, player: PlayerId) {
        match engine::disconnect(&mut self.room, player, self.registry.settings.grace_ms) {
            DisconnectOutcome::Ignored => {}
            DisconnectOutcome::Over => self.finish_room().await,
            DisconnectOutcome::Grace { deadline } => {
                log::info!("room {}: player {} disconnected, grace open", self.room.id, player);
                let remaining = deadline.saturating_sub(crate::now());
                let notice = Notice::in_room(ErrorCode::ReconnectGrace, self.room.id)
                    .with_remaining(remaining);
                self.broadcast(ServerEvent::Error(notice));
                if let Some(slot) = self.room.slot(player) {
                    let line = format!("{} lost connection", slot.nickname);
                    self.system_chat(line);
                }
            }
        }
    }

    fn on_resume(&mut self, player: PlayerId, token: Token, outbox: Outbox) {
        match engine::resume(&mut self.room, player, &token, outbox.clone()) {
            Err(rejection) => {
                let mut notice = Notice::in_room(rejection.code, self.room.id);
                notice.remaining_ms = rejection.remaining_ms;
                let _ = outbox.send(ServerEvent::Error(notice));
            }
            Ok(()) => {
                log::info!("room {}: player {} resumed", self.room.id, player);
                self.broadcast(ServerEvent::Error(Notice::in_room(
                    ErrorCode::ReconnectRestored,
                    self.room.id,
                )));
                let index = self.room.index_of(player).expect("resumed player seated");
                self.send_to(index, ServerEvent::State(engine::snapshot_for(&self.room, index)));
                self.send_to(
                    index,
                    ServerEvent::ChatHistory(ChatHistory {
                        room_id: self.room.id,
                        messages: self.room.chat.iter().cloned().collect(),
                    }),
                );
                let line = format!("{} reconnected", self.room.slots[index].nickname);
                self.system_chat(line);
                self.arm_bot();
            }
        }
    }

    /// One bot shot per think delay; hits re-arm immediately, a miss
    /// hands the turn back and the bot sleeps until it moves again.
    async fn bot_shot(&mut self) {
        if self.room.phase != Phase::Playing || self.room.turn != BOT_ID {
            return;
        }
        let Some(seeker) = self.seeker.as_mut() else {
            return;
        };
        let Some(coord) = seeker.next_shot(&self.room.slots[0].board) else {
            log::error!("room {}: bot exhausted the board", self.room.id);
            engine::finish(&mut self.room, EndReason::General, None);
            self.finish_room().await;
            return;
        };
        match engine::shoot(&mut self.room, BOT_ID, coord) {
            Err(_) => {
                // grace is running; the resume path re-arms the bot
            }
            Ok(record) => {
                seeker.register(&self.room.slots[0].board, coord, record.outcome);
                let event = engine::shot_event(&self.room, BOT_ID, coord, record.outcome);
                self.broadcast(ServerEvent::ShotResult(event));
                if record.over {
                    self.finish_room().await;
                } else {
                    self.broadcast_turn();
                    self.arm_bot();
                }
            }
        }
    }

    fn arm_bot(&mut self) {
        if self.room.vs_bot && self.room.phase == Phase::Playing && self.room.turn == BOT_ID {
            let ref mut rng = rand::rng();
            let think = rng.random_range(BOT_THINK_MIN_MS..=BOT_THINK_MAX_MS);
            self.bot_due = Some(crate::now() + think);
        }
    }

    /// Terminal transition bookkeeping: final events, token invalidation,
    /// and the post-game linger for PvP chat.
    async fn finish_room(&mut self) {
        self.bot_due = None;
        self.broadcast_over();
        let tokens: Vec<Token> = self
            .room
            .slots
            .iter()
            .filter_map(|s| s.token.clone())
            .collect();
        self.registry.invalidate(&tokens).await;
        if self.room.vs_bot || self.room.reason == Some(EndReason::General) {
            self.done = true;
        } else {
            let until = crate::now() + self.registry.settings.chat_ttl_ms;
            self.room.chat_until = Some(until);
            self.destroy_at = Some(until);
        }
    }

    fn next_wake(&self) -> Option<Millis> {
        let grace = self.room.grace().map(|(_, at)| at);
        let inactivity = (self.room.phase == Phase::Playing && self.room.grace().is_none())
            .then(|| self.room.last_activity + self.registry.settings.inactivity_ms);
        [grace, inactivity, self.bot_due, self.destroy_at]
            .into_iter()
            .flatten()
            .min()
    }

    fn reject(&self, player: PlayerId, rejection: engine::Rejection) {
        if let Some(index) = self.room.index_of(player) {
            let mut notice = Notice::in_room(rejection.code, self.room.id);
            notice.remaining_ms = rejection.remaining_ms;
            self.send_to(index, ServerEvent::Error(notice));
        }
    }

    /// Lifecycle lines shown in PvP chat; bot rooms have no chat at all.
    fn system_chat(&mut self, body: String) {
        if self.room.vs_bot {
            return;
        }
        let message = ChatMessage::system(body);
        chat::append(&mut self.room.chat, message.clone());
        self.broadcast(ServerEvent::ChatMessage(ChatRelay {
            room_id: self.room.id,
            message,
        }));
    }

    fn send_to(&self, index: usize, event: ServerEvent) {
        if let Some(ref tx) = self.room.slots[index].outbox {
            let _ = tx.send(event);
        }
    }

    fn broadcast(&self, event: ServerEvent) {
        for index in 0..self.room.slots.len() {
            self.send_to(index, event.clone());
        }
    }

    fn broadcast_state(&self) {
        for index in 0..self.room.slots.len() {
            self.send_to(index, ServerEvent::State(engine::snapshot_for(&self.room, index)));
        }
    }

    fn broadcast_turn(&self) {
        for index in 0..self.room.slots.len() {
            self.send_to(index, ServerEvent::Turn(engine::turn_event_for(&self.room, index)));
        }
    }

    fn broadcast_over(&self) {
        for index in 0..self.room.slots.len() {
            self.send_to(index, ServerEvent::Over(engine::over_event_for(&self.room, index)));
        }
    }

    fn persist(&self) {
        if let Some(ref snapshots) = self.registry.snapshots {
            snapshots.save(self.room.snapshot());
        }
    }

    async fn teardown(mut self) {
        if self.room.phase != Phase::Over {
            engine::finish(&mut self.room, EndReason::General, None);
            self.broadcast_over();
        }
        let tokens: Vec<Token> = self
            .room
            .slots
            .iter()
            .filter_map(|s| s.token.clone())
            .collect();
        self.registry.remove(self.room.id, &tokens).await;
        crate::telemetry::record(
            &self.registry.sink,
            Telemetry::MatchEnded {
                room: self.room.id,
                winner: self.room.winner,
                reason: self.room.reason.unwrap_or(EndReason::General).as_str(),
                total_shots: self.room.total_shots(),
                duration_ms: crate::now().saturating_sub(self.room.created_at),
            },
        );
        log::info!("closed room {}", self.room.id);
    }
}

/// Sleeps until the given wall-clock instant, or forever when there is
/// no pending deadline.
async fn alarm(at: Option<Millis>) {
    match at {
        Some(at) => {
            let delay = at.saturating_sub(crate::now());
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await
        }
        None => std::future::pending().await,
    }
}
