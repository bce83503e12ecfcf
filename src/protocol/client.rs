use super::BoardState;
use crate::RoomId;
use crate::board::Coord;
use serde::Deserialize;

/// Inbound frames, tagged by event name. Anything that fails to parse
/// into one of these shapes is rejected at the gateway before any domain
/// code runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "search:join")]
    SearchJoin(SearchJoin),
    #[serde(rename = "search:cancel")]
    SearchCancel(Blank),
    #[serde(rename = "game:place_ships")]
    PlaceShips(PlaceShips),
    #[serde(rename = "game:shot")]
    Shot(Shot),
    #[serde(rename = "game:cancel")]
    Cancel(Cancel),
    #[serde(rename = "chat:send")]
    ChatSend(ChatSend),
}

/// Empty `data: {}` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Blank {}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchJoin {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub reconnect_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceShips {
    pub room_id: RoomId,
    pub board: BoardState,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shot {
    pub room_id: RoomId,
    pub coord: Coord,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancel {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSend {
    pub room_id: RoomId,
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub gif_id: Option<String>,
}
