use serde::Serialize;
use serde::Serializer;

/// Stable error codes surfaced to clients. The wire string never changes
/// once shipped; clients key their UI off these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ReconnectGrace,
    ReconnectRestored,
    ReconnectTokenExpired,
    ReconnectTokenInUse,
    InvalidPayload,
    InvalidShipPlacement,
    NotYourTurn,
    InvalidCoord,
    AlreadyShot,
    AlreadyReady,
    NotInPlaying,
    NotInSetup,
    RoomMismatch,
    RateLimited,
    ChatInvalidPayload,
    ChatRateLimited,
    ChatNotAllowed,
    ChatRoomMismatch,
    SoftBan,
    General,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ReconnectGrace => "reconnect_grace",
            ErrorCode::ReconnectRestored => "reconnect_restored",
            ErrorCode::ReconnectTokenExpired => "reconnect_token_expired",
            ErrorCode::ReconnectTokenInUse => "reconnect_token_in_use",
            ErrorCode::InvalidPayload => "invalid_payload",
            ErrorCode::InvalidShipPlacement => "invalid_ship_placement",
            ErrorCode::NotYourTurn => "not_your_turn",
            ErrorCode::InvalidCoord => "invalid_coord",
            ErrorCode::AlreadyShot => "already_shot",
            ErrorCode::AlreadyReady => "already_ready",
            ErrorCode::NotInPlaying => "not_in_playing",
            ErrorCode::NotInSetup => "not_in_setup",
            ErrorCode::RoomMismatch => "room_mismatch",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::ChatInvalidPayload => "chat_invalid_payload",
            ErrorCode::ChatRateLimited => "chat_rate_limited",
            ErrorCode::ChatNotAllowed => "chat_not_allowed",
            ErrorCode::ChatRoomMismatch => "chat_room_mismatch",
            ErrorCode::SoftBan => "soft_ban",
            ErrorCode::General => "general",
        }
    }

    /// Codes the client provoked with a bad request; these count toward
    /// the soft-ban budget.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidPayload
                | ErrorCode::InvalidShipPlacement
                | ErrorCode::NotYourTurn
                | ErrorCode::InvalidCoord
                | ErrorCode::AlreadyShot
                | ErrorCode::AlreadyReady
                | ErrorCode::NotInPlaying
                | ErrorCode::NotInSetup
        )
    }

    /// Human-readable companion text; never a substitute for the code.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::ReconnectGrace => "opponent disconnected, waiting for them to return",
            ErrorCode::ReconnectRestored => "opponent reconnected, game resumes",
            ErrorCode::ReconnectTokenExpired => "reconnect token expired, joining fresh",
            ErrorCode::ReconnectTokenInUse => "this token is already bound to a live session",
            ErrorCode::InvalidPayload => "malformed request",
            ErrorCode::InvalidShipPlacement => "fleet placement violates the rules",
            ErrorCode::NotYourTurn => "it is not your turn",
            ErrorCode::InvalidCoord => "coordinate is off the board",
            ErrorCode::AlreadyShot => "that cell was already fired upon",
            ErrorCode::AlreadyReady => "fleet already placed",
            ErrorCode::NotInPlaying => "game is not in the playing phase",
            ErrorCode::NotInSetup => "game is not in the setup phase",
            ErrorCode::RoomMismatch => "message addressed to a room you are not in",
            ErrorCode::RateLimited => "slow down",
            ErrorCode::ChatInvalidPayload => "chat message rejected",
            ErrorCode::ChatRateLimited => "chat slow mode",
            ErrorCode::ChatNotAllowed => "chat is not available here",
            ErrorCode::ChatRoomMismatch => "chat addressed to a room you are not in",
            ErrorCode::SoftBan => "connection closed after repeated invalid requests",
            ErrorCode::General => "something went wrong",
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
