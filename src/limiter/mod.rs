mod shared;
mod window;

pub use shared::*;
pub use window::*;

use crate::Millis;
use crate::PlayerId;

/// The throttled request classes and their fixed-window budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    SearchJoin,
    PlaceShips,
    Shot,
    Cancel,
    ChatSend,
    ReconnectAttempt,
    InvalidRequests,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::SearchJoin => "search_join",
            ActionKind::PlaceShips => "game_place_ships",
            ActionKind::Shot => "game_shot",
            ActionKind::Cancel => "game_cancel",
            ActionKind::ChatSend => "chat_send",
            ActionKind::ReconnectAttempt => "reconnect_attempt",
            ActionKind::InvalidRequests => "invalid_requests",
        }
    }

    /// (max requests, window length).
    pub fn bound(&self) -> (u32, Millis) {
        match self {
            ActionKind::SearchJoin => (3, 10_000),
            ActionKind::PlaceShips => (5, 10_000),
            ActionKind::Shot => (10, 5_000),
            ActionKind::Cancel => (5, 30_000),
            ActionKind::ChatSend => (6, 10_000),
            ActionKind::ReconnectAttempt => (6, 30_000),
            ActionKind::InvalidRequests => (20, 60_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Limited,
    /// Only the invalid-request budget escalates to a ban.
    Banned,
}

/// Per-connection request throttling. The local backend is authoritative
/// for a single process; the shared backend rides the key-value store so
/// several instances see one budget.
#[async_trait::async_trait]
pub trait Limiter: Send + Sync {
    async fn check(&self, player: PlayerId, kind: ActionKind) -> Verdict;
    async fn forget(&self, player: PlayerId);
}

fn verdict(kind: ActionKind, count: u32) -> Verdict {
    let (max, _) = kind.bound();
    match (count <= max, kind) {
        (true, _) => Verdict::Allowed,
        (false, ActionKind::InvalidRequests) => Verdict::Banned,
        (false, _) => Verdict::Limited,
    }
}
