use super::ActionKind;
use super::Limiter;
use super::Verdict;
use super::verdict;
use crate::PlayerId;

/// Fixed-window counters backed by the key-value store: one atomic
/// increment per check, expiry set when a window opens. Store trouble
/// fails open, the game path never stalls on throttling.
pub struct SharedLimiter {
    client: redis::Client,
    prefix: String,
}

impl SharedLimiter {
    pub fn new(client: redis::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    async fn bump(&self, player: PlayerId, kind: ActionKind) -> anyhow::Result<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{}rl:{}:{}", self.prefix, player, kind.as_str());
        let (_, window_ms) = kind.bound();
        let (count,): (u32,) = redis::pipe()
            .atomic()
            .incr(&key, 1u32)
            .cmd("PEXPIRE")
            .arg(&key)
            .arg(window_ms)
            .arg("NX")
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl Limiter for SharedLimiter {
    async fn check(&self, player: PlayerId, kind: ActionKind) -> Verdict {
        match self.bump(player, kind).await {
            Ok(count) => verdict(kind, count),
            Err(e) => {
                log::warn!("shared limiter unavailable, failing open: {}", e);
                Verdict::Allowed
            }
        }
    }

    async fn forget(&self, player: PlayerId) {
        let keys: Vec<String> = [
            ActionKind::SearchJoin,
            ActionKind::PlaceShips,
            ActionKind::Shot,
            ActionKind::Cancel,
            ActionKind::ChatSend,
            ActionKind::ReconnectAttempt,
            ActionKind::InvalidRequests,
        ]
        .iter()
        .map(|kind| format!("{}rl:{}:{}", self.prefix, player, kind.as_str()))
        .collect();
        if let Ok(mut conn) = self.client.get_multiplexed_async_connection().await {
            let _: Result<(), _> = redis::cmd("DEL")
                .arg(&keys)
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| log::warn!("shared limiter cleanup failed: {}", e));
        }
    }
}
