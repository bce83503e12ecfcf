use super::Counters;
use super::ErrorCode;
use super::OpponentSlotView;
use super::OwnSlotView;
use crate::Millis;
use crate::PlayerId;
use crate::RoomId;
use crate::ShipId;
use crate::Token;
use crate::board::Coord;
use crate::chat::ChatMessage;
use crate::room::Phase;
use serde::Serialize;

/// Outbound frames, tagged by event name.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "queue:queued")]
    Queued(Queued),
    #[serde(rename = "queue:matched")]
    Matched(Matched),
    #[serde(rename = "game:state")]
    State(GameSnapshot),
    #[serde(rename = "game:turn")]
    Turn(TurnUpdate),
    #[serde(rename = "game:shot_result")]
    ShotResult(ShotResult),
    #[serde(rename = "game:over")]
    Over(GameOver),
    #[serde(rename = "game:cancelled")]
    Cancelled(Cancelled),
    #[serde(rename = "game:error")]
    Error(Notice),
    #[serde(rename = "chat:history")]
    ChatHistory(ChatHistory),
    #[serde(rename = "chat:message")]
    ChatMessage(ChatRelay),
    #[serde(rename = "chat:error")]
    ChatError(Notice),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Queued {
    pub player_id: PlayerId,
    pub joined_at: Millis,
    pub timeout_ms: Millis,
    pub reconnect_token: Token,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Matched {
    pub room_id: RoomId,
    pub opponent: String,
    pub vs_bot: bool,
    pub reconnect_token: Token,
    pub you_ready: bool,
    pub opponent_ready: bool,
    pub message: String,
}

/// Full per-recipient snapshot. The opponent board inside is masked; the
/// serializer never sees an afloat ship of theirs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub room_id: RoomId,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<PlayerId>,
    pub your_turn: bool,
    pub vs_bot: bool,
    pub you: OwnSlotView,
    pub opponent: OpponentSlotView,
    pub counters: Counters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnUpdate {
    pub room_id: RoomId,
    pub turn: PlayerId,
    pub your_turn: bool,
    pub phase: Phase,
    pub counters: Counters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_over: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotResult {
    pub room_id: RoomId,
    pub shooter: PlayerId,
    pub coord: Coord,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ship_id: Option<ShipId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_over: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOver {
    pub room_id: RoomId,
    pub winner: Option<PlayerId>,
    pub phase: Phase,
    pub counters: Counters,
    pub total_shots: u32,
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancelled {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    pub reason: &'static str,
    pub message: String,
}

/// Error and lifecycle notice payload shared by `game:error` and
/// `chat:error`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<Millis>,
}

impl Notice {
    pub fn of(code: ErrorCode) -> Self {
        Self {
            room_id: None,
            code,
            message: code.message().to_string(),
            remaining_ms: None,
        }
    }

    pub fn in_room(code: ErrorCode, room_id: RoomId) -> Self {
        Self {
            room_id: Some(room_id),
            ..Self::of(code)
        }
    }

    pub fn with_remaining(mut self, remaining_ms: Millis) -> Self {
        self.remaining_ms = Some(remaining_ms);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistory {
    pub room_id: RoomId,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRelay {
    pub room_id: RoomId,
    pub message: ChatMessage,
}
