mod memory;
mod redis;

pub use memory::*;
pub use redis::*;

use crate::Millis;
use crate::PlayerId;
use crate::Token;
use serde::Deserialize;
use serde::Serialize;

/// One waiting or parked player. Serialized as-is into the key-value
/// store, so the field names here are the persisted layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub player: PlayerId,
    pub nickname: String,
    pub joined_at: Millis,
    pub token: Token,
}

/// The matchmaking waiting list plus the parked (disconnected) side
/// table. `take_match` and `take_timed_out` are the only multi-step
/// operations and must be atomic with respect to concurrent callers;
/// the key-value backend enforces that with server-side scripts.
#[async_trait::async_trait]
pub trait QueueStore: Send + Sync {
    async fn upsert(&self, entry: QueueEntry) -> anyhow::Result<()>;
    async fn remove_by_player(&self, player: PlayerId) -> anyhow::Result<Option<QueueEntry>>;
    async fn remove_by_token(&self, token: &str) -> anyhow::Result<Option<QueueEntry>>;
    async fn get_by_player(&self, player: PlayerId) -> anyhow::Result<Option<QueueEntry>>;
    async fn get_by_token(&self, token: &str) -> anyhow::Result<Option<QueueEntry>>;
    /// Moves a waiting entry to the parked table for the grace window.
    async fn park(&self, player: PlayerId, ttl_ms: Millis) -> anyhow::Result<Option<QueueEntry>>;
    /// Claims a parked entry back, if its TTL has not lapsed.
    async fn take_parked(&self, token: &str) -> anyhow::Result<Option<QueueEntry>>;
    /// Atomically removes and returns the two oldest waiting entries.
    async fn take_match(&self) -> anyhow::Result<Option<(QueueEntry, QueueEntry)>>;
    /// Atomically removes waiting entries with `joined_at <= cutoff`.
    async fn take_timed_out(&self, cutoff: Millis, limit: usize)
    -> anyhow::Result<Vec<QueueEntry>>;
}
