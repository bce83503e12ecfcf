use crate::Millis;
use crate::PlayerId;
use crate::RoomId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityKind {
    RateLimit,
    SoftBan,
    InvalidFlood,
}

impl SecurityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityKind::RateLimit => "rate_limit",
            SecurityKind::SoftBan => "soft_ban",
            SecurityKind::InvalidFlood => "invalid_flood",
        }
    }
}

/// One appended record. Match events land in `match_events`, security
/// events in `security_events`; retention on both is enforced externally.
#[derive(Debug, Clone)]
pub enum Telemetry {
    MatchStarted {
        room: RoomId,
        vs_bot: bool,
        players: [PlayerId; 2],
    },
    MatchEnded {
        room: RoomId,
        winner: Option<PlayerId>,
        reason: &'static str,
        total_shots: u32,
        duration_ms: Millis,
    },
    Security {
        player: PlayerId,
        kind: SecurityKind,
        detail: String,
    },
}
