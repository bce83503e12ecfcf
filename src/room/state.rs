use crate::Millis;
use crate::PlayerId;
use crate::RoomId;
use crate::Token;
use crate::board::Board;
use crate::board::random_fleet;
use crate::chat::ChatMessage;
use crate::protocol::BoardState;
use crate::protocol::Outbox;
use crate::queue::QueueEntry;
use serde::Serialize;
use std::collections::VecDeque;

/// The bot occupies player id zero; real connections are minted from one
/// upwards.
pub const BOT_ID: PlayerId = 0;
pub const BOT_NICKNAME: &str = "Iron Admiral";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Setup,
    Playing,
    Over,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    FleetSunk,
    ManualCancel,
    Disconnect,
    InactivityTimeout,
    General,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::FleetSunk => "fleet_sunk",
            EndReason::ManualCancel => "manual_cancel",
            EndReason::Disconnect => "disconnect",
            EndReason::InactivityTimeout => "inactivity_timeout",
            EndReason::General => "general",
        }
    }
}

/// One side of the table. The socket is held only as an outbox handle;
/// `None` means disconnected (grace may be running) or the bot.
#[derive(Debug)]
pub struct Slot {
    pub player: PlayerId,
    pub nickname: String,
    pub outbox: Option<Outbox>,
    pub ready: bool,
    pub board: Board,
    pub shots_fired: u32,
    pub token: Option<Token>,
    pub grace_until: Option<Millis>,
}

impl Slot {
    pub fn human(entry: &QueueEntry, outbox: Option<Outbox>) -> Self {
        Self {
            player: entry.player,
            nickname: entry.nickname.clone(),
            outbox,
            ready: false,
            board: Board::standard(),
            shots_fired: 0,
            token: Some(entry.token.clone()),
            grace_until: None,
        }
    }

    /// The bot arrives with its fleet already placed.
    pub fn bot() -> Self {
        Self {
            player: BOT_ID,
            nickname: String::from(BOT_NICKNAME),
            outbox: None,
            ready: true,
            board: random_fleet(),
            shots_fired: 0,
            token: None,
            grace_until: None,
        }
    }

    pub fn connected(&self) -> bool {
        self.outbox.is_some()
    }

    pub fn is_bot(&self) -> bool {
        self.player == BOT_ID
    }
}

/// Authoritative state of one match. Owned by exactly one actor task;
/// nothing outside that task ever mutates it.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub slots: [Slot; 2],
    pub phase: Phase,
    pub turn: PlayerId,
    pub winner: Option<PlayerId>,
    pub reason: Option<EndReason>,
    pub vs_bot: bool,
    pub created_at: Millis,
    pub last_activity: Millis,
    pub last_mover: Option<PlayerId>,
    pub chat: VecDeque<ChatMessage>,
    pub chat_until: Option<Millis>,
}

impl Room {
    pub fn pvp(
        id: RoomId,
        first: (&QueueEntry, Option<Outbox>),
        second: (&QueueEntry, Option<Outbox>),
    ) -> Self {
        let now = crate::now();
        Self {
            id,
            slots: [Slot::human(first.0, first.1), Slot::human(second.0, second.1)],
            phase: Phase::Setup,
            turn: first.0.player,
            winner: None,
            reason: None,
            vs_bot: false,
            created_at: now,
            last_activity: now,
            last_mover: None,
            chat: VecDeque::new(),
            chat_until: None,
        }
    }

    pub fn solo(id: RoomId, entry: &QueueEntry, outbox: Option<Outbox>) -> Self {
        let now = crate::now();
        Self {
            id,
            slots: [Slot::human(entry, outbox), Slot::bot()],
            phase: Phase::Setup,
            turn: entry.player,
            winner: None,
            reason: None,
            vs_bot: true,
            created_at: now,
            last_activity: now,
            last_mover: None,
            chat: VecDeque::new(),
            chat_until: None,
        }
    }

    pub fn index_of(&self, player: PlayerId) -> Option<usize> {
        self.slots.iter().position(|s| s.player == player)
    }

    pub fn slot(&self, player: PlayerId) -> Option<&Slot> {
        self.index_of(player).map(|i| &self.slots[i])
    }

    pub fn opponent_of(&self, index: usize) -> usize {
        1 - index
    }

    pub fn total_shots(&self) -> u32 {
        self.slots.iter().map(|s| s.shots_fired).sum()
    }

    /// The grace deadline currently pausing the game, if any.
    pub fn grace(&self) -> Option<(PlayerId, Millis)> {
        self.slots
            .iter()
            .filter_map(|s| s.grace_until.map(|at| (s.player, at)))
            .min_by_key(|&(_, at)| at)
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id,
            phase: self.phase,
            turn: self.turn,
            winner: self.winner,
            reason: self.reason.map(|r| r.as_str()),
            vs_bot: self.vs_bot,
            created_at: self.created_at,
            last_activity: self.last_activity,
            slots: self
                .slots
                .iter()
                .map(|s| SlotSnapshot {
                    player: s.player,
                    nickname: s.nickname.clone(),
                    ready: s.ready,
                    connected: s.connected(),
                    shots_fired: s.shots_fired,
                    grace_until: s.grace_until,
                    board: BoardState::from(&s.board),
                })
                .collect(),
        }
    }
}

/// Cross-instance persisted form, written under `<prefix>room:<id>`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub phase: Phase,
    pub turn: PlayerId,
    pub winner: Option<PlayerId>,
    pub reason: Option<&'static str>,
    pub vs_bot: bool,
    pub created_at: Millis,
    pub last_activity: Millis,
    pub slots: Vec<SlotSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSnapshot {
    pub player: PlayerId,
    pub nickname: String,
    pub ready: bool,
    pub connected: bool,
    pub shots_fired: u32,
    pub grace_until: Option<Millis>,
    pub board: BoardState,
}
