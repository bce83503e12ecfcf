use super::QueueEntry;
use super::QueueStore;
use crate::Millis;
use crate::PlayerId;
use crate::Token;
use std::collections::BTreeMap;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-process queue store: the authoritative backend when no shared store
/// is configured, and the test double everywhere.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    waiting: BTreeMap<(Millis, PlayerId), QueueEntry>,
    by_player: HashMap<PlayerId, (Millis, PlayerId)>,
    by_token: HashMap<Token, PlayerId>,
    parked: HashMap<Token, (QueueEntry, Millis)>,
}

impl Inner {
    fn purge_parked(&mut self, now: Millis) {
        self.parked.retain(|_, (_, expires)| *expires > now);
    }

    fn detach(&mut self, key: (Millis, PlayerId)) -> Option<QueueEntry> {
        self.waiting.remove(&key).inspect(|entry| {
            self.by_player.remove(&entry.player);
            self.by_token.remove(&entry.token);
        })
    }

    fn detach_player(&mut self, player: PlayerId) -> Option<QueueEntry> {
        self.by_player
            .remove(&player)
            .and_then(|key| self.waiting.remove(&key))
            .inspect(|entry| {
                self.by_token.remove(&entry.token);
            })
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl QueueStore for MemoryQueue {
    async fn upsert(&self, entry: QueueEntry) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        inner.detach_player(entry.player);
        let key = (entry.joined_at, entry.player);
        inner.by_player.insert(entry.player, key);
        inner.by_token.insert(entry.token.clone(), entry.player);
        inner.waiting.insert(key, entry);
        Ok(())
    }

    async fn remove_by_player(&self, player: PlayerId) -> anyhow::Result<Option<QueueEntry>> {
        Ok(self.inner.lock().await.detach_player(player))
    }

    async fn remove_by_token(&self, token: &str) -> anyhow::Result<Option<QueueEntry>> {
        let mut inner = self.inner.lock().await;
        match inner.by_token.get(token).copied() {
            Some(player) => Ok(inner.detach_player(player)),
            None => Ok(inner.parked.remove(token).map(|(entry, _)| entry)),
        }
    }

    async fn get_by_player(&self, player: PlayerId) -> anyhow::Result<Option<QueueEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .by_player
            .get(&player)
            .and_then(|key| inner.waiting.get(key))
            .cloned())
    }

    async fn get_by_token(&self, token: &str) -> anyhow::Result<Option<QueueEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .by_token
            .get(token)
            .and_then(|player| inner.by_player.get(player))
            .and_then(|key| inner.waiting.get(key))
            .cloned())
    }

    async fn park(&self, player: PlayerId, ttl_ms: Millis) -> anyhow::Result<Option<QueueEntry>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.detach_player(player).inspect(|entry| {
            inner
                .parked
                .insert(entry.token.clone(), (entry.clone(), crate::now() + ttl_ms));
        }))
    }

    async fn take_parked(&self, token: &str) -> anyhow::Result<Option<QueueEntry>> {
        let mut inner = self.inner.lock().await;
        inner.purge_parked(crate::now());
        Ok(inner.parked.remove(token).map(|(entry, _)| entry))
    }

    async fn take_match(&self) -> anyhow::Result<Option<(QueueEntry, QueueEntry)>> {
        let mut inner = self.inner.lock().await;
        if inner.waiting.len() < 2 {
            return Ok(None);
        }
        let oldest: Vec<_> = inner.waiting.keys().take(2).copied().collect();
        let first = inner.detach(oldest[0]).expect("key just read");
        let second = inner.detach(oldest[1]).expect("key just read");
        Ok(Some((first, second)))
    }

    async fn take_timed_out(
        &self,
        cutoff: Millis,
        limit: usize,
    ) -> anyhow::Result<Vec<QueueEntry>> {
        let mut inner = self.inner.lock().await;
        let expired: Vec<_> = inner
            .waiting
            .keys()
            .take_while(|(joined_at, _)| *joined_at <= cutoff)
            .take(limit)
            .copied()
            .collect();
        Ok(expired
            .into_iter()
            .filter_map(|key| inner.detach(key))
            .collect())
    }
}
